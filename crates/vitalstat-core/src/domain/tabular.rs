use serde::{Deserialize, Serialize};

/// A normalized delimited table: one header row plus zero or more data
/// rows, every row the same width.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Index of a named column, if present.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Parse a delimited body. Ragged records are an error; an empty
    /// body yields an empty table.
    pub fn from_delimited(body: &[u8], delimiter: u8) -> Result<Self, csv::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(false)
            .from_reader(body);

        let headers = reader
            .headers()?
            .iter()
            .map(str::to_owned)
            .collect::<Vec<_>>();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_owned).collect());
        }

        Ok(Self { headers, rows })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tab_separated_body() {
        let body = b"State\tYear\tBirths\nAlabama\t2021\t57647\nAlaska\t2021\t9367\n";
        let table = Table::from_delimited(body, b'\t').expect("parses");

        assert_eq!(table.headers, vec!["State", "Year", "Births"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[1], vec!["Alaska", "2021", "9367"]);
        assert_eq!(table.column("Births"), Some(2));
    }

    #[test]
    fn ragged_rows_are_an_error() {
        let body = b"a\tb\n1\t2\t3\n";
        assert!(Table::from_delimited(body, b'\t').is_err());
    }

    #[test]
    fn empty_body_yields_empty_table() {
        let table = Table::from_delimited(b"", b'\t').expect("parses");
        assert!(table.is_empty());
    }
}
