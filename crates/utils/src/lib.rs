mod logger;
pub mod units;

pub use logger::LoggerManager;
pub use units::{price_deviation_pct, u256_to_decimal};
