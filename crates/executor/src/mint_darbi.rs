//! 按虚拟价格铸币的专用通道
//!
//! 只有持有 DarbiMinter 角色的调用者可以铸币, 铸币价格恰好等于当前虚拟价格,
//! 没有溢价也没有折扣。

use ethers::types::{Address, U256};
use models::{
    ensure_address, ensure_amount, price_scale, AccessControl, PegError, PegEvent, PegResult, Role,
};
use parking_lot::RwLock;
use services::{Chain, ChainState, UpController, VirtualPriceOracle};
use tracing::info;

/// 铸币通道
///
/// `mint_up_in` 在调用方已经持有的事务内执行, 供执行器在套利事务中调用。
pub trait MintChannel: Send + Sync {
    fn address(&self) -> Address;

    /// 支付 `payment` 原生币, 返回铸出的 UP 数量
    fn mint_up_in(&self, state: &mut ChainState, caller: Address, payment: U256) -> PegResult<U256>;
}

pub struct UpMintDarbi {
    address: Address,
    up_token: Address,
    native_token: Address,
    access: RwLock<AccessControl>,
    controller: RwLock<Address>,
}

impl UpMintDarbi {
    pub fn new(
        address: Address,
        admin: Address,
        up_token: Address,
        native_token: Address,
        controller: Address,
    ) -> PegResult<Self> {
        ensure_address(address, "mint channel address")?;
        ensure_address(admin, "admin")?;
        ensure_address(up_token, "up token")?;
        ensure_address(native_token, "native token")?;
        ensure_address(controller, "controller")?;

        Ok(Self {
            address,
            up_token,
            native_token,
            access: RwLock::new(AccessControl::with_admin(admin)),
            controller: RwLock::new(controller),
        })
    }

    pub fn controller(&self) -> Address {
        *self.controller.read()
    }

    pub fn has_role(&self, role: Role, account: Address) -> bool {
        self.access.read().has_role(role, account)
    }

    /// 独立事务中铸币
    pub fn mint_up(&self, chain: &Chain, caller: Address, payment: U256) -> PegResult<U256> {
        chain.transact("up_mint_darbi.mint_up", |state| self.mint_up_in(state, caller, payment))
    }

    pub fn grant_darbi_role(&self, chain: &Chain, caller: Address, account: Address) -> PegResult<bool> {
        chain.transact("up_mint_darbi.grant_darbi_role", |state| {
            self.access.read().check_role(Role::Admin, caller)?;
            let granted = self.access.write().grant_role(Role::DarbiMinter, account)?;
            if granted {
                state.emit(
                    self.address,
                    PegEvent::RoleGranted {
                        role: Role::DarbiMinter,
                        account,
                        sender: caller,
                    },
                );
            }
            Ok(granted)
        })
    }

    pub fn revoke_darbi_role(&self, chain: &Chain, caller: Address, account: Address) -> PegResult<bool> {
        chain.transact("up_mint_darbi.revoke_darbi_role", |state| {
            self.access.read().check_role(Role::Admin, caller)?;
            let revoked = self.access.write().revoke_role(Role::DarbiMinter, account)?;
            if revoked {
                state.emit(
                    self.address,
                    PegEvent::RoleRevoked {
                        role: Role::DarbiMinter,
                        account,
                        sender: caller,
                    },
                );
            }
            Ok(revoked)
        })
    }

    pub fn update_controller(&self, chain: &Chain, caller: Address, controller: Address) -> PegResult<()> {
        chain.transact("up_mint_darbi.update_controller", |state| {
            self.access.read().check_role(Role::Admin, caller)?;
            ensure_address(controller, "controller")?;
            *self.controller.write() = controller;
            state.emit(self.address, PegEvent::UpdateController { controller });
            info!(target: "darbi_mint", "控制器更新为 {:?}", controller);
            Ok(())
        })
    }

    fn oracle(&self) -> UpController {
        UpController::at(self.controller(), self.up_token, self.native_token)
    }
}

impl MintChannel for UpMintDarbi {
    fn address(&self) -> Address {
        self.address
    }

    fn mint_up_in(&self, state: &mut ChainState, caller: Address, payment: U256) -> PegResult<U256> {
        self.access.read().check_role(Role::DarbiMinter, caller)?;
        ensure_amount(payment, "payment")?;

        // 支付转入控制器之前读取价格
        let oracle = self.oracle();
        let virtual_price = oracle.get_virtual_price(&state.ledger)?;
        if virtual_price.is_zero() {
            return Err(PegError::InvalidArgument("virtual price is zero".to_string()));
        }

        let minted = U256::try_from(payment.full_mul(price_scale()) / virtual_price)
            .map_err(|_| PegError::ArithmeticOverflow("darbi mint amount"))?;

        state.ledger.transfer(self.native_token, caller, oracle.address(), payment)?;
        state.ledger.mint(self.up_token, self.address, caller, minted)?;
        state.emit(
            self.address,
            PegEvent::DarbiMint {
                recipient: caller,
                minted,
                virtual_price,
                payment,
            },
        );

        info!(
            target: "darbi_mint",
            "🪙 铸币: {:?} 支付 {} 获得 {} UP (虚拟价格 {})",
            caller, payment, minted, virtual_price
        );
        Ok(minted)
    }
}
