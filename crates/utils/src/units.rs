//! U256 定点数与 Decimal 之间的转换 (仅用于日志展示与偏差统计)

use ethers::types::U256;
use rust_decimal::Decimal;

/// Decimal 尾数上限 (96 位)
const MAX_MANTISSA: u128 = (1u128 << 96) - 1;

/// Decimal 最大小数位
const MAX_SCALE: u32 = 28;

/// U256 转 Decimal, `decimals` 为定点小数位
///
/// 超出 Decimal 精度 (尾数 96 位或 28 位小数) 的部分从低位截断, 绝对值过大时返回 None。
pub fn u256_to_decimal(value: U256, decimals: u32) -> Option<Decimal> {
    let mut mantissa = value;
    let mut scale = decimals;

    while (mantissa > U256::from(MAX_MANTISSA) || scale > MAX_SCALE) && scale > 0 {
        mantissa /= U256::from(10u8);
        scale -= 1;
    }
    if mantissa > U256::from(MAX_MANTISSA) {
        return None;
    }

    Decimal::try_from_i128_with_scale(mantissa.as_u128() as i128, scale).ok()
}

/// 实际价格相对目标价格的偏差百分比 (绝对值)
///
/// 目标为零时返回 None。
pub fn price_deviation_pct(actual: U256, target: U256) -> Option<Decimal> {
    if target.is_zero() {
        return None;
    }
    let actual = u256_to_decimal(actual, 18)?;
    let target = u256_to_decimal(target, 18)?;

    Some(((Decimal::ONE - actual / target) * Decimal::from(100)).abs())
}
