pub mod uniswap;
pub mod common;

pub use uniswap::{ConstantProductPair, PairFactory, UniswapHelper, V2Router};
pub use common::{DexContext, SwapRouter};
