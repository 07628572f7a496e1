//! 测试用的完整内存部署 (经 `PegSystem::bootstrap` 按默认配置部署)
//!
//! 控制器持有 5 ETH, 管理员持有 2 UP (全部供应), 执行器持有 5 ETH;
//! 两个铸币通道都持有 UP 的铸币权限, 执行器持有专用通道的 DarbiMinter 角色。

use config_crate::AppConfig;
use dex::{SwapRouter, V2Router};
use ethers::types::{Address, U256};
use models::{ReserveSnapshot, Role};
use services::{Chain, UpController, VirtualPriceOracle};
use std::sync::Arc;

use crate::{Darbi, PegAddresses, PegSystem, UpMintDarbi, UpMintPublic};

pub fn e18(n: u64) -> U256 {
    U256::from(n) * U256::exp10(18)
}

fn addr(n: u64) -> Address {
    Address::from_low_u64_be(n)
}

pub struct TestEnv {
    pub chain: Chain,
    pub admin: Address,
    pub stranger: Address,
    pub controller: Address,
    pub up_token: Address,
    pub native_token: Address,
    pub router: Arc<V2Router>,
    pub mint_darbi: Arc<UpMintDarbi>,
    pub mint_public: UpMintPublic,
    pub darbi: Darbi,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::build(true)
    }

    /// UP 供应为零, 虚拟价格为零
    pub fn empty_supply() -> Self {
        Self::build(false)
    }

    /// 管理员以 2 UP / 5 ETH 建池, 池子价格与虚拟价格 2.5 对齐
    pub fn with_pool() -> Self {
        let env = Self::new();
        env.add_liquidity(env.admin, e18(2), e18(5));
        env
    }

    fn build(with_supply: bool) -> Self {
        utils::LoggerManager::init_for_tests();

        let addresses = PegAddresses {
            admin: addr(0xA),
            up_token: addr(0x100),
            native_token: addr(0x200),
            controller: addr(0xC0),
            factory: addr(0xF1),
            router: addr(0xF0),
            mint_darbi: addr(0xD0),
            mint_public: addr(0xD1),
            darbi: addr(0xE0),
        };
        let stranger = addr(0xB);
        let system = PegSystem::bootstrap(AppConfig::default(), addresses).unwrap();

        system
            .chain
            .transact("genesis", |state| {
                state.ledger.credit(addresses.native_token, addresses.controller, e18(5))?;
                if with_supply {
                    state.ledger.credit(addresses.up_token, addresses.admin, e18(2))?;
                }
                state.ledger.credit(addresses.native_token, addresses.admin, e18(1_000))?;
                state.ledger.credit(addresses.native_token, stranger, e18(2_000))?;
                state.ledger.credit(addresses.native_token, addresses.darbi, e18(5))?;
                Ok(())
            })
            .unwrap();

        Self {
            chain: system.chain,
            admin: addresses.admin,
            stranger,
            controller: addresses.controller,
            up_token: addresses.up_token,
            native_token: addresses.native_token,
            router: system.router,
            mint_darbi: system.mint_darbi,
            mint_public: system.mint_public,
            darbi: system.darbi,
        }
    }

    pub fn add_liquidity(&self, provider: Address, up_amount: U256, native_amount: U256) {
        self.chain
            .transact("add_liquidity", |state| {
                self.router.add_liquidity(
                    &mut state.dex(),
                    provider,
                    self.up_token,
                    self.native_token,
                    up_amount,
                    native_amount,
                )
            })
            .unwrap();
    }

    /// 直接增发 UP (不经过铸币通道, 模拟供应增加)
    pub fn credit_up(&self, to: Address, amount: U256) {
        self.chain
            .transact("credit_up", |state| state.ledger.credit(self.up_token, to, amount))
            .unwrap();
    }

    pub fn transfer_native(&self, from: Address, to: Address, amount: U256) {
        self.chain
            .transact("transfer_native", |state| {
                state.ledger.transfer(self.native_token, from, to, amount)
            })
            .unwrap();
    }

    /// 管理员授予自己 Monitor 角色
    pub fn grant_monitor(&self, account: Address) {
        self.darbi
            .grant_role(&self.chain, self.admin, Role::Monitor, account)
            .unwrap();
    }

    /// 以任意调用者身份兑换
    pub fn swap(&self, sender: Address, amount_in: U256, path: &[Address]) -> Vec<U256> {
        self.chain
            .transact("swap", |state| {
                self.router
                    .swap_exact_tokens_for_tokens(&mut state.dex(), sender, amount_in, U256::zero(), path, sender)
            })
            .unwrap()
    }

    pub fn virtual_price(&self) -> U256 {
        self.chain.view(|state| {
            UpController::at(self.controller, self.up_token, self.native_token)
                .get_virtual_price(&state.ledger)
                .unwrap()
        })
    }

    pub fn reserves(&self) -> ReserveSnapshot {
        self.chain
            .view(|state| dex::UniswapHelper::get_reserves(&state.factory, self.up_token, self.native_token).unwrap())
    }

    pub fn up_balance(&self, owner: Address) -> U256 {
        self.chain.view(|state| state.ledger.balance_of(self.up_token, owner))
    }

    pub fn native_balance(&self, owner: Address) -> U256 {
        self.chain.view(|state| state.ledger.balance_of(self.native_token, owner))
    }
}
