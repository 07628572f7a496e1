use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

/// 价格定点精度 (小数位)
pub const PRICE_DECIMALS: usize = 18;

/// 价格定点缩放因子 10^18
pub fn price_scale() -> U256 {
    U256::exp10(PRICE_DECIMALS)
}

/// 池子储备快照, 顺序与请求的 (token_a, token_b) 一致
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveSnapshot {
    pub token_a: Address,
    pub token_b: Address,
    pub reserve_a: U256,
    pub reserve_b: U256,
}

impl ReserveSnapshot {
    /// 任一侧储备为零
    pub fn is_empty(&self) -> bool {
        self.reserve_a.is_zero() || self.reserve_b.is_zero()
    }

    /// 现货价格 reserve_b / reserve_a (10^18 定点, 向零截断)
    ///
    /// 储备为空或结果超出 U256 时返回 None。
    pub fn spot_price(&self) -> Option<U256> {
        if self.is_empty() {
            return None;
        }
        let scaled = self.reserve_b.full_mul(price_scale()) / self.reserve_a;
        U256::try_from(scaled).ok()
    }
}

/// 交易方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// 池子价格高于虚拟价格: 投入锚定代币, 压低价格
    SellBackedToken,
    /// 池子价格低于虚拟价格: 投入数值资产, 抬高价格
    BuyBackedToken,
}

impl Direction {
    /// 链上合约中的 aToB 标志 (true 表示锚定代币 -> 数值资产)
    pub fn a_to_b(&self) -> bool {
        matches!(self, Direction::SellBackedToken)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::SellBackedToken => "sell_backed_token",
            Direction::BuyBackedToken => "buy_backed_token",
        }
    }
}

/// 套利决策
///
/// `amount_in` 为零表示池子已对齐, 此时 `direction` 没有意义, 调用方必须当作空操作处理。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArbitrageDecision {
    pub direction: Direction,
    pub amount_in: U256,
}

impl ArbitrageDecision {
    /// 已对齐 (数量为零)
    pub fn aligned() -> Self {
        Self {
            direction: Direction::BuyBackedToken,
            amount_in: U256::zero(),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.amount_in.is_zero()
    }
}
