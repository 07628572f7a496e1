use ethers::types::{Address, U256};
use models::{EventLog, Ledger, PegResult};

use crate::uniswap::PairFactory;

/// 路由调用时可变借用的宿主状态
pub struct DexContext<'a> {
    pub factory: &'a mut PairFactory,
    pub ledger: &'a mut Ledger,
    pub events: &'a mut EventLog,
}

/// DEX 路由的通用 trait
///
/// 所有方法都在宿主事务内同步执行, 没有挂起点; 失败时由宿主整体回滚。
pub trait SwapRouter: Send + Sync {
    /// 路由地址
    fn address(&self) -> Address;

    /// 按路径报价 (纯读取)
    fn get_amounts_out(&self, factory: &PairFactory, amount_in: U256, path: &[Address]) -> PegResult<Vec<U256>>;

    /// 精确输入兑换, 输出低于 `amount_out_min` 时失败
    fn swap_exact_tokens_for_tokens(
        &self,
        ctx: &mut DexContext<'_>,
        sender: Address,
        amount_in: U256,
        amount_out_min: U256,
        path: &[Address],
        to: Address,
    ) -> PegResult<Vec<U256>>;

    /// 添加流动性, 返回实际存入的 (amount_a, amount_b)
    fn add_liquidity(
        &self,
        ctx: &mut DexContext<'_>,
        provider: Address,
        token_a: Address,
        token_b: Address,
        amount_a_desired: U256,
        amount_b_desired: U256,
    ) -> PegResult<(U256, U256)>;
}
