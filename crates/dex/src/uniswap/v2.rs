use ethers::types::{Address, U256};
use models::{Ledger, PegError, PegResult};
use serde::{Deserialize, Serialize};

/// 手续费基数
pub const FEE_DENOMINATOR: u32 = 10_000;

/// 恒定乘积交易对 (Uniswap V2 风格)
///
/// 储备始终等于交易对地址在账本中的余额, 每次变动后通过 `sync` 对齐。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstantProductPair {
    pub address: Address,
    pub token0: Address,
    pub token1: Address,
    pub reserve0: U256,
    pub reserve1: U256,
    /// 费率 (基点, 30 = 0.3%)
    pub fee_bps: u32,
}

impl ConstantProductPair {
    pub fn new(address: Address, token_a: Address, token_b: Address, fee_bps: u32) -> Self {
        let (token0, token1) = Self::sort_tokens(token_a, token_b);
        Self {
            address,
            token0,
            token1,
            reserve0: U256::zero(),
            reserve1: U256::zero(),
            fee_bps,
        }
    }

    /// 按地址排序
    pub fn sort_tokens(token_a: Address, token_b: Address) -> (Address, Address) {
        if token_a < token_b {
            (token_a, token_b)
        } else {
            (token_b, token_a)
        }
    }

    pub fn contains(&self, token: Address) -> bool {
        token == self.token0 || token == self.token1
    }

    /// 交易对中的另一个代币
    pub fn other(&self, token: Address) -> PegResult<Address> {
        if token == self.token0 {
            Ok(self.token1)
        } else if token == self.token1 {
            Ok(self.token0)
        } else {
            Err(PegError::InvalidArgument(format!(
                "token {:?} is not part of pair {:?}",
                token, self.address
            )))
        }
    }

    /// 返回 (reserve_in, reserve_out)
    pub fn reserves_for(&self, token_in: Address) -> PegResult<(U256, U256)> {
        if token_in == self.token0 {
            Ok((self.reserve0, self.reserve1))
        } else if token_in == self.token1 {
            Ok((self.reserve1, self.reserve0))
        } else {
            Err(PegError::InvalidArgument(format!(
                "token {:?} is not part of pair {:?}",
                token_in, self.address
            )))
        }
    }

    /// 计算输出数量 (纯计算)
    ///
    /// amountOut = (amountIn * (10000 - fee) * reserveOut) / (reserveIn * 10000 + amountIn * (10000 - fee))
    pub fn calculate_amount_out(
        amount_in: U256,
        reserve_in: U256,
        reserve_out: U256,
        fee_bps: u32,
    ) -> PegResult<U256> {
        if amount_in.is_zero() || reserve_in.is_zero() || reserve_out.is_zero() {
            return Ok(U256::zero());
        }

        let overflow = || PegError::ArithmeticOverflow("pair amount out");
        let amount_in_with_fee = amount_in
            .checked_mul(U256::from(FEE_DENOMINATOR - fee_bps))
            .ok_or_else(overflow)?;
        let numerator = amount_in_with_fee.checked_mul(reserve_out).ok_or_else(overflow)?;
        let denominator = reserve_in
            .checked_mul(U256::from(FEE_DENOMINATOR))
            .and_then(|v| v.checked_add(amount_in_with_fee))
            .ok_or_else(overflow)?;

        Ok(numerator / denominator)
    }

    pub fn get_amount_out(&self, token_in: Address, amount_in: U256) -> PegResult<U256> {
        let (reserve_in, reserve_out) = self.reserves_for(token_in)?;
        Self::calculate_amount_out(amount_in, reserve_in, reserve_out, self.fee_bps)
    }

    /// 储备对齐到账本余额
    pub fn sync(&mut self, ledger: &Ledger) {
        self.reserve0 = ledger.balance_of(self.token0, self.address);
        self.reserve1 = ledger.balance_of(self.token1, self.address);
    }

    /// 执行兑换
    ///
    /// 调用前输入代币必须已经转入交易对地址, 输出按转入前的储备计算。
    pub fn swap(&mut self, ledger: &mut Ledger, token_in: Address, to: Address) -> PegResult<(U256, U256)> {
        let (reserve_in, _) = self.reserves_for(token_in)?;
        let token_out = self.other(token_in)?;

        let balance_in = ledger.balance_of(token_in, self.address);
        if balance_in <= reserve_in {
            return Err(PegError::InvalidArgument("insufficient input amount".to_string()));
        }
        let amount_in = balance_in - reserve_in;
        let amount_out = self.get_amount_out(token_in, amount_in)?;
        if amount_out.is_zero() {
            return Err(PegError::InvalidArgument("insufficient output amount".to_string()));
        }

        ledger.transfer(token_out, self.address, to, amount_out)?;
        self.sync(ledger);

        Ok((amount_in, amount_out))
    }

    /// 现货价格: 每单位 `base` 可换多少另一种代币 (10^18 定点)
    pub fn spot_price(&self, base: Address) -> PegResult<U256> {
        let (reserve_base, reserve_quote) = self.reserves_for(base)?;
        if reserve_base.is_zero() {
            return Ok(U256::zero());
        }
        let price = reserve_quote.full_mul(models::price_scale()) / reserve_base;
        U256::try_from(price).map_err(|_| PegError::ArithmeticOverflow("pair spot price"))
    }
}
