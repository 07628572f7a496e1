mod arbitrage_sizer;

pub use arbitrage_sizer::*;
