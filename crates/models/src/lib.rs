mod access;
mod arbitrage;
mod error;
mod event;
mod ledger;

pub use access::*;
pub use arbitrage::*;
pub use error::*;
pub use event::*;
pub use ledger::*;
