//! 업스트림 시세 provider.

pub mod composite;
pub mod yahoo;

pub use composite::{CompositeFetcher, COMPOSITE_PROVIDER};
pub use yahoo::{to_yahoo_symbol, YahooQuoteFetcher, YAHOO_PROVIDER};
