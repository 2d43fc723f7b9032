//! Protocol clients, one per upstream provider.

pub mod ahr;
pub mod datafenix;
pub mod ipums;
pub mod wonder;

pub use ahr::AhrClient;
pub use datafenix::DataFenixClient;
pub use ipums::IpumsClient;
pub use wonder::{WonderClient, WonderRequestBuilder};
