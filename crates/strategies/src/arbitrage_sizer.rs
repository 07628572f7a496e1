//! 套利规模计算
//!
//! 给定恒定乘积池的储备和目标虚拟价格, 求出一次 (含手续费) 兑换后
//! 池子价格恰好回到虚拟价格所需的输入数量。
//!
//! 记 x 为输入侧储备, y 为输出侧储备, d = 10000, g = 10000 - fee,
//! 目标比例 r = 输出侧/输入侧, 解二次方程得:
//!
//! ```text
//! Δ = (sqrt(x²(d-g)² + 4gd·x·y / r) - x(d+g)) / 2g
//! ```
//!
//! 卖出方向 r = vp, 买入方向输入/输出对调且 r = 1/vp。全部使用整数运算,
//! 除法与开方都向下截断, 因此结果不会越过目标价格。

use ethers::types::{U256, U512};
use models::{price_scale, ArbitrageDecision, Direction, PegError, PegResult, ReserveSnapshot};
use tracing::debug;

/// 手续费 (基点)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapFee {
    bps: u32,
}

impl SwapFee {
    pub const DENOMINATOR: u32 = 10_000;

    pub fn from_bps(bps: u32) -> PegResult<Self> {
        if bps >= Self::DENOMINATOR {
            return Err(PegError::InvalidArgument(format!(
                "swap fee must be below {} bps",
                Self::DENOMINATOR
            )));
        }
        Ok(Self { bps })
    }

    pub fn bps(&self) -> u32 {
        self.bps
    }

    /// 扣费后的输入比例分子 (10000 - fee)
    fn gamma(&self) -> u32 {
        Self::DENOMINATOR - self.bps
    }
}

impl Default for SwapFee {
    fn default() -> Self {
        Self { bps: 30 }
    }
}

/// 套利规模计算器 (纯函数, 无状态)
#[derive(Debug, Clone, Copy, Default)]
pub struct ArbitrageSizer {
    fee: SwapFee,
}

impl ArbitrageSizer {
    pub fn new(fee: SwapFee) -> Self {
        Self { fee }
    }

    pub fn fee(&self) -> SwapFee {
        self.fee
    }

    /// 计算方向和输入数量
    ///
    /// `reserves.token_a` 是锚定代币, `token_b` 是数值资产; `virtual_price` 为 10^18 定点。
    /// 价格已对齐、虚拟价格为零或池子为空时返回 `ArbitrageDecision::aligned()`。
    pub fn size(&self, reserves: &ReserveSnapshot, virtual_price: U256) -> PegResult<ArbitrageDecision> {
        if virtual_price.is_zero() || reserves.is_empty() {
            return Ok(ArbitrageDecision::aligned());
        }

        let x = reserves.reserve_a;
        let y = reserves.reserve_b;
        let scale = price_scale();

        // y/x 与 vp 比较: y * 10^18 对比 x * vp
        let pool_side = y.full_mul(scale);
        let target_side = x.full_mul(virtual_price);

        let decision = if pool_side > target_side {
            // 池子价格偏高: 卖出锚定代币
            let amount_in = self.solve(x, y, scale, virtual_price)?;
            ArbitrageDecision {
                direction: Direction::SellBackedToken,
                amount_in,
            }
        } else if pool_side < target_side {
            // 池子价格偏低: 投入数值资产买入锚定代币
            let amount_in = self.solve(y, x, virtual_price, scale)?;
            ArbitrageDecision {
                direction: Direction::BuyBackedToken,
                amount_in,
            }
        } else {
            ArbitrageDecision::aligned()
        };

        debug!(
            target: "arbitrage_execution",
            "定量: 储备 {}/{}, 虚拟价格 {}, 方向 {}, 输入 {}",
            x,
            y,
            virtual_price,
            decision.direction.as_str(),
            decision.amount_in
        );

        Ok(decision)
    }

    /// 输入侧储备 `reserve_in`, 输出侧储备 `reserve_out`, 目标比例 = ratio_num / ratio_den
    fn solve(&self, reserve_in: U256, reserve_out: U256, ratio_den: U256, ratio_num: U256) -> PegResult<U256> {
        let overflow = || PegError::ArithmeticOverflow("arbitrage sizer");

        let d = U512::from(SwapFee::DENOMINATOR);
        let g = U512::from(self.fee.gamma());
        let x = U512::from(reserve_in);
        let y = U512::from(reserve_out);

        // x²(d-g)²
        let fee_gap = d - g;
        let linear = x
            .checked_mul(x)
            .and_then(|v| v.checked_mul(fee_gap * fee_gap))
            .ok_or_else(overflow)?;

        // 4gd·x·y·ratio_den / ratio_num
        let cross = U512::from(4u8)
            .checked_mul(g)
            .and_then(|v| v.checked_mul(d))
            .and_then(|v| v.checked_mul(x))
            .and_then(|v| v.checked_mul(y))
            .and_then(|v| v.checked_mul(U512::from(ratio_den)))
            .ok_or_else(overflow)?
            / U512::from(ratio_num);

        let discriminant = linear.checked_add(cross).ok_or_else(overflow)?;
        let root = discriminant.integer_sqrt();
        let offset = x.checked_mul(d + g).ok_or_else(overflow)?;

        let numerator = root.saturating_sub(offset);
        let amount = numerator / (U512::from(2u8) * g);

        U256::try_from(amount).map_err(|_| overflow())
    }
}
