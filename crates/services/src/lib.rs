mod chain;
mod controller;

pub use chain::*;
pub use controller::*;
