use ethers::types::{Address, U256};
use models::{PegError, PegResult, ReserveSnapshot};

use super::factory::PairFactory;

/// 交易对储备查询辅助
pub struct UniswapHelper;

impl UniswapHelper {
    /// 按调用方给出的代币顺序返回储备
    pub fn get_reserves(factory: &PairFactory, token_a: Address, token_b: Address) -> PegResult<ReserveSnapshot> {
        let pair = factory
            .get_pair(token_a, token_b)
            .ok_or(PegError::PoolNotFound { token_a, token_b })?;
        let (reserve_a, reserve_b) = pair.reserves_for(token_a)?;

        Ok(ReserveSnapshot {
            token_a,
            token_b,
            reserve_a,
            reserve_b,
        })
    }

    /// `token_a` 以 `token_b` 计价的现货价格, 池子为空时返回 0
    pub fn spot_price(factory: &PairFactory, token_a: Address, token_b: Address) -> PegResult<U256> {
        Ok(Self::get_reserves(factory, token_a, token_b)?
            .spot_price()
            .unwrap_or_default())
    }
}
