use ethers::types::{Address, U256};
use models::{price_scale, Ledger, PegError, PegResult};

/// 虚拟价格来源
pub trait VirtualPriceOracle: Send + Sync {
    fn address(&self) -> Address;

    /// 每单位锚定代币对应的数值资产 (10^18 定点)
    fn get_virtual_price(&self, ledger: &Ledger) -> PegResult<U256>;
}

/// UP 控制器: 持有原生币作为锚定代币的储备
///
/// 虚拟价格 = 控制器持有的原生币 * 10^18 / UP 总供应量, 供应量为零时为零。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpController {
    address: Address,
    up_token: Address,
    native_token: Address,
}

impl UpController {
    /// 绑定到指定地址的控制器
    pub fn at(address: Address, up_token: Address, native_token: Address) -> Self {
        Self {
            address,
            up_token,
            native_token,
        }
    }

    /// 控制器持有的储备
    pub fn backing(&self, ledger: &Ledger) -> U256 {
        ledger.balance_of(self.native_token, self.address)
    }
}

impl VirtualPriceOracle for UpController {
    fn address(&self) -> Address {
        self.address
    }

    fn get_virtual_price(&self, ledger: &Ledger) -> PegResult<U256> {
        let supply = ledger.total_supply(self.up_token);
        if supply.is_zero() {
            return Ok(U256::zero());
        }
        let price = self.backing(ledger).full_mul(price_scale()) / supply;
        U256::try_from(price).map_err(|_| PegError::ArithmeticOverflow("virtual price"))
    }
}
