//! Market data source implementations

pub mod nwmarketprices;

pub use nwmarketprices::NwMarketPricesSource;
