pub mod v2;
pub mod factory;
pub mod router;
pub mod helper;

pub use v2::ConstantProductPair;
pub use factory::PairFactory;
pub use router::V2Router;
pub use helper::UniswapHelper;
