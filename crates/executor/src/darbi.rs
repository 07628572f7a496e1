//! 锚定套利执行器
//!
//! 读取虚拟价格和池子储备, 计算纠偏交易规模, 通过路由成交。
//! 卖出方向库存不足时先从铸币通道按虚拟价格铸币补足, 成交后向调用者退还 gas。
//! 整个调用在一个宿主事务内完成, 任何一步失败都不会留下部分效果。

use dex::{PairFactory, SwapRouter, UniswapHelper};
use ethers::types::{Address, U256, U512};
use models::{
    check_entry, ensure_address, ensure_amount, price_scale, AccessControl, ArbitrageDecision, Direction,
    PauseState, PegError, PegEvent, PegResult, Role,
};
use parking_lot::RwLock;
use services::{Chain, ChainState, UpController, VirtualPriceOracle};
use std::sync::Arc;
use strategies::{ArbitrageSizer, SwapFee};
use tracing::{debug, info, warn};
use utils::price_deviation_pct;

use crate::mint_darbi::MintChannel;
use crate::types::{ArbitrageOutcome, ArbitrageReport, DarbiDeployment, DarbiParameters, SkipReason};

pub struct Darbi {
    address: Address,
    up_token: Address,
    native_token: Address,
    router: Arc<dyn SwapRouter>,
    mint_channel: Arc<dyn MintChannel>,
    /// 部署时配置的手续费, 定量以池子实际手续费为准
    swap_fee: SwapFee,
    access: RwLock<AccessControl>,
    pause: RwLock<PauseState>,
    params: RwLock<DarbiParameters>,
}

impl Darbi {
    pub fn new(
        deployment: DarbiDeployment,
        router: Arc<dyn SwapRouter>,
        mint_channel: Arc<dyn MintChannel>,
    ) -> PegResult<Self> {
        deployment.validate()?;
        let swap_fee = SwapFee::from_bps(deployment.swap_fee_bps)?;

        let params = DarbiParameters {
            arbitrage_threshold: deployment.arbitrage_threshold,
            gas_refund: deployment.gas_refund,
            darbi_minter: deployment.darbi_minter.unwrap_or_else(|| mint_channel.address()),
            controller: deployment.controller,
        };

        info!(
            "Darbi 部署于 {:?}, 阈值 {}, gas 退款 {}, 手续费 {} bps",
            deployment.address, params.arbitrage_threshold, params.gas_refund, deployment.swap_fee_bps
        );

        Ok(Self {
            address: deployment.address,
            up_token: deployment.up_token,
            native_token: deployment.native_token,
            router,
            mint_channel,
            swap_fee,
            access: RwLock::new(AccessControl::with_admin(deployment.admin)),
            pause: RwLock::new(PauseState::default()),
            params: RwLock::new(params),
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    // ==================== 读取 ====================

    pub fn parameters(&self) -> DarbiParameters {
        *self.params.read()
    }

    pub fn arbitrage_threshold(&self) -> U256 {
        self.params.read().arbitrage_threshold
    }

    pub fn gas_refund(&self) -> U256 {
        self.params.read().gas_refund
    }

    pub fn darbi_minter(&self) -> Address {
        self.params.read().darbi_minter
    }

    pub fn controller(&self) -> Address {
        self.params.read().controller
    }

    pub fn has_role(&self, role: Role, account: Address) -> bool {
        self.access.read().has_role(role, account)
    }

    pub fn is_paused(&self) -> bool {
        self.pause.read().is_paused()
    }

    /// 当前虚拟价格 (每次按配置的控制器地址重新绑定)
    pub fn virtual_price(&self, chain: &Chain) -> PegResult<U256> {
        chain.view(|state| self.oracle().get_virtual_price(&state.ledger))
    }

    /// 只读计算当前需要的纠偏方向与规模, 不修改任何状态
    pub fn move_market_buy_amount(&self, chain: &Chain) -> PegResult<ArbitrageDecision> {
        chain.view(|state| self.decide(state))
    }

    // ==================== 管理 ====================

    pub fn set_arbitrage_threshold(&self, chain: &Chain, caller: Address, threshold: U256) -> PegResult<()> {
        chain.transact("darbi.set_arbitrage_threshold", |state| {
            self.only_admin(caller)?;
            ensure_amount(threshold, "arbitrage threshold")?;
            self.params.write().arbitrage_threshold = threshold;
            state.emit(self.address, PegEvent::ArbitrageThresholdUpdated { threshold });
            Ok(())
        })
    }

    pub fn set_gas_refund(&self, chain: &Chain, caller: Address, gas_refund: U256) -> PegResult<()> {
        chain.transact("darbi.set_gas_refund", |state| {
            self.only_admin(caller)?;
            ensure_amount(gas_refund, "gas refund")?;
            self.params.write().gas_refund = gas_refund;
            state.emit(self.address, PegEvent::GasRefundUpdated { gas_refund });
            Ok(())
        })
    }

    pub fn set_darbi_minter(&self, chain: &Chain, caller: Address, darbi_minter: Address) -> PegResult<()> {
        chain.transact("darbi.set_darbi_minter", |state| {
            self.only_admin(caller)?;
            ensure_address(darbi_minter, "darbi minter")?;
            self.params.write().darbi_minter = darbi_minter;
            state.emit(self.address, PegEvent::DarbiMinterUpdated { darbi_minter });
            Ok(())
        })
    }

    pub fn set_controller(&self, chain: &Chain, caller: Address, controller: Address) -> PegResult<()> {
        chain.transact("darbi.set_controller", |state| {
            self.only_admin(caller)?;
            ensure_address(controller, "controller")?;
            self.params.write().controller = controller;
            state.emit(self.address, PegEvent::ControllerUpdated { controller });
            Ok(())
        })
    }

    /// 授予角色, 重复授予不报错, 返回是否发生变化
    pub fn grant_role(&self, chain: &Chain, caller: Address, role: Role, account: Address) -> PegResult<bool> {
        chain.transact("darbi.grant_role", |state| {
            self.only_admin(caller)?;
            let granted = self.access.write().grant_role(role, account)?;
            if granted {
                state.emit(self.address, PegEvent::RoleGranted { role, account, sender: caller });
            }
            Ok(granted)
        })
    }

    pub fn revoke_role(&self, chain: &Chain, caller: Address, role: Role, account: Address) -> PegResult<bool> {
        chain.transact("darbi.revoke_role", |state| {
            self.only_admin(caller)?;
            let revoked = self.access.write().revoke_role(role, account)?;
            if revoked {
                state.emit(self.address, PegEvent::RoleRevoked { role, account, sender: caller });
            }
            Ok(revoked)
        })
    }

    /// 暂停, 已暂停时为空操作
    pub fn pause(&self, chain: &Chain, caller: Address) -> PegResult<()> {
        self.set_pause(chain, caller, PauseState::Paused)
    }

    /// 恢复, 未暂停时为空操作
    pub fn unpause(&self, chain: &Chain, caller: Address) -> PegResult<()> {
        self.set_pause(chain, caller, PauseState::Active)
    }

    fn set_pause(&self, chain: &Chain, caller: Address, target: PauseState) -> PegResult<()> {
        chain.transact("darbi.set_pause", |state| {
            self.only_admin(caller)?;
            let mut pause = self.pause.write();
            if *pause == target {
                return Ok(());
            }
            *pause = target;
            let event = match target {
                PauseState::Paused => PegEvent::Paused { account: caller },
                PauseState::Active => PegEvent::Unpaused { account: caller },
            };
            state.emit(self.address, event);
            Ok(())
        })
    }

    fn only_admin(&self, caller: Address) -> PegResult<()> {
        self.access.read().check_role(Role::Admin, caller)
    }

    // ==================== 套利 ====================

    /// 执行一次套利
    ///
    /// 先检查暂停状态再检查 Monitor 角色, 两项检查都在任何写操作之前完成。
    pub fn arbitrage(&self, chain: &Chain, caller: Address) -> PegResult<ArbitrageOutcome> {
        chain.transact("darbi.arbitrage", |state| {
            {
                let access = self.access.read();
                check_entry(&access, *self.pause.read(), Role::Monitor, caller)?;
            }
            self.execute(state, caller)
        })
    }

    fn oracle(&self) -> UpController {
        UpController::at(self.controller(), self.up_token, self.native_token)
    }

    /// 按池子自身的手续费构建定量器
    ///
    /// 配置与池子不一致时以池子为准, 否则定量会越过目标价格。
    fn pool_sizer(&self, factory: &PairFactory) -> PegResult<ArbitrageSizer> {
        let pair = factory
            .get_pair(self.up_token, self.native_token)
            .ok_or(PegError::PoolNotFound {
                token_a: self.up_token,
                token_b: self.native_token,
            })?;
        if pair.fee_bps != self.swap_fee.bps() {
            warn!(
                target: "arbitrage_execution",
                "⚠️ 池子手续费 {} bps 与配置 {} bps 不一致, 按池子手续费定量",
                pair.fee_bps,
                self.swap_fee.bps()
            );
        }
        Ok(ArbitrageSizer::new(SwapFee::from_bps(pair.fee_bps)?))
    }

    fn decide(&self, state: &ChainState) -> PegResult<ArbitrageDecision> {
        let virtual_price = self.oracle().get_virtual_price(&state.ledger)?;
        let reserves = UniswapHelper::get_reserves(&state.factory, self.up_token, self.native_token)?;
        self.pool_sizer(&state.factory)?.size(&reserves, virtual_price)
    }

    fn execute(&self, state: &mut ChainState, caller: Address) -> PegResult<ArbitrageOutcome> {
        let params = self.parameters();
        let virtual_price = self.oracle().get_virtual_price(&state.ledger)?;
        let reserves = UniswapHelper::get_reserves(&state.factory, self.up_token, self.native_token)?;
        let spot_price_before = reserves.spot_price().unwrap_or_default();
        let decision = self.pool_sizer(&state.factory)?.size(&reserves, virtual_price)?;

        if decision.is_noop() {
            debug!(target: "arbitrage_execution", "池子已对齐, 跳过");
            return Ok(ArbitrageOutcome::Skipped {
                decision,
                reason: SkipReason::Aligned,
            });
        }
        if decision.amount_in < params.arbitrage_threshold {
            info!(
                target: "arbitrage_execution",
                "规模 {} 低于阈值 {}, 跳过",
                decision.amount_in, params.arbitrage_threshold
            );
            return Ok(ArbitrageOutcome::Skipped {
                decision,
                reason: SkipReason::BelowThreshold {
                    threshold: params.arbitrage_threshold,
                },
            });
        }

        info!(
            target: "arbitrage_execution",
            "🔄 套利: 方向 {}, 输入 {}, 池子价格 {}, 虚拟价格 {}, 偏差 {:?}%",
            decision.direction.as_str(),
            decision.amount_in,
            spot_price_before,
            virtual_price,
            price_deviation_pct(spot_price_before, virtual_price)
        );

        let (path, minted, mint_payment) = match decision.direction {
            Direction::SellBackedToken => {
                let (minted, payment) =
                    self.ensure_backed_inventory(state, &params, decision.amount_in, virtual_price)?;
                (vec![self.up_token, self.native_token], minted, payment)
            }
            Direction::BuyBackedToken => {
                let available = state.ledger.balance_of(self.native_token, self.address);
                if available < decision.amount_in {
                    return Err(PegError::ExternalCallFailure(format!(
                        "insufficient native balance for buy: needed {}, available {}",
                        decision.amount_in, available
                    )));
                }
                (vec![self.native_token, self.up_token], U256::zero(), U256::zero())
            }
        };

        // 最小输出取路由自身的报价, 报价与成交不一致时整体回滚
        let quoted = self
            .router
            .get_amounts_out(&state.factory, decision.amount_in, &path)
            .map_err(|e| PegError::external("router.get_amounts_out", e))?;
        let amount_out_min = quoted.last().copied().unwrap_or_default();

        let amounts = self
            .router
            .swap_exact_tokens_for_tokens(
                &mut state.dex(),
                self.address,
                decision.amount_in,
                amount_out_min,
                &path,
                self.address,
            )
            .map_err(|e| PegError::external("router.swap_exact_tokens_for_tokens", e))?;
        let amount_out = amounts.last().copied().unwrap_or_default();

        let spot_price_after = UniswapHelper::spot_price(&state.factory, self.up_token, self.native_token)?;
        state.emit(
            self.address,
            PegEvent::Arbitrage {
                direction: decision.direction,
                amount_in: decision.amount_in,
                amount_out,
                minted,
            },
        );

        info!(
            target: "arbitrage_execution",
            "✅ 成交: 输入 {}, 输出 {}, 铸币 {}, 成交后价格 {}, 偏差 {:?}%",
            decision.amount_in,
            amount_out,
            minted,
            spot_price_after,
            price_deviation_pct(spot_price_after, virtual_price)
        );

        let gas_refund_paid = self.refund_gas(state, caller, params.gas_refund)?;

        Ok(ArbitrageOutcome::Executed(ArbitrageReport {
            direction: decision.direction,
            amount_in: decision.amount_in,
            amount_out,
            minted,
            mint_payment,
            gas_refund_paid,
            virtual_price,
            spot_price_before,
            spot_price_after,
        }))
    }

    /// 卖出前补足 UP 库存, 返回 (铸币数量, 支付金额)
    ///
    /// 缺口按虚拟价格向上取整计算支付, 铸出数量不小于缺口。
    fn ensure_backed_inventory(
        &self,
        state: &mut ChainState,
        params: &DarbiParameters,
        amount_in: U256,
        virtual_price: U256,
    ) -> PegResult<(U256, U256)> {
        let inventory = state.ledger.balance_of(self.up_token, self.address);
        if inventory >= amount_in {
            return Ok((U256::zero(), U256::zero()));
        }
        if self.mint_channel.address() != params.darbi_minter {
            return Err(PegError::ExternalCallFailure(format!(
                "mint channel {:?} does not match configured darbi minter {:?}",
                self.mint_channel.address(),
                params.darbi_minter
            )));
        }

        let shortfall = amount_in - inventory;
        let scale = U512::from(price_scale());
        let payment = (shortfall.full_mul(virtual_price) + scale - 1) / scale;
        let payment =
            U256::try_from(payment).map_err(|_| PegError::ArithmeticOverflow("darbi mint payment"))?;

        let minted = self
            .mint_channel
            .mint_up_in(state, self.address, payment)
            .map_err(|e| PegError::external("mint_channel.mint_up", e))?;
        if minted < shortfall {
            return Err(PegError::ExternalCallFailure(format!(
                "mint channel returned {} below shortfall {}",
                minted, shortfall
            )));
        }

        debug!(target: "arbitrage_execution", "库存缺口 {}, 支付 {} 铸币 {}", shortfall, payment, minted);
        Ok((minted, payment))
    }

    /// 退还 gas, 余额不足时跳过且不回滚成交
    fn refund_gas(&self, state: &mut ChainState, caller: Address, gas_refund: U256) -> PegResult<U256> {
        let available = state.ledger.balance_of(self.native_token, self.address);
        if available < gas_refund {
            warn!(
                target: "arbitrage_execution",
                "⚠️ gas 退款跳过: 需要 {}, 余额 {}",
                gas_refund, available
            );
            state.emit(
                self.address,
                PegEvent::GasRefundSkipped {
                    recipient: caller,
                    amount: gas_refund,
                    available,
                },
            );
            return Ok(U256::zero());
        }

        state.ledger.transfer(self.native_token, self.address, caller, gas_refund)?;
        state.emit(
            self.address,
            PegEvent::GasRefunded {
                recipient: caller,
                amount: gas_refund,
            },
        );
        Ok(gas_refund)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{e18, TestEnv};
    use config_crate::PegConfig;
    use rust_decimal_macros::dec;

    fn meaningless_address() -> Address {
        "0xA38395b264f232ffF4bb294b5947092E359dDE88".parse().unwrap()
    }

    fn within_one_percent(actual: U256, target: U256) -> bool {
        price_deviation_pct(actual, target).map(|d| d < dec!(1)).unwrap_or(false)
    }

    // ==================== setter ====================

    #[test]
    fn test_setters_require_admin() {
        let env = TestEnv::new();
        let (darbi, chain, stranger) = (&env.darbi, &env.chain, env.stranger);

        let denied = |r: PegResult<()>| matches!(r, Err(PegError::PermissionDenied { role: "DEFAULT_ADMIN_ROLE", .. }));
        assert!(denied(darbi.set_darbi_minter(chain, stranger, meaningless_address())));
        assert!(denied(darbi.set_controller(chain, stranger, meaningless_address())));
        assert!(denied(darbi.set_arbitrage_threshold(chain, stranger, U256::from(10_000u64))));
        assert!(denied(darbi.set_gas_refund(chain, stranger, U256::from(10_000u64))));
        assert!(denied(darbi.pause(chain, stranger)));
    }

    #[test]
    fn test_setters_reject_zero_values() {
        let env = TestEnv::new();
        let (darbi, chain, admin) = (&env.darbi, &env.chain, env.admin);
        let before = darbi.parameters();

        let invalid = |r: PegResult<()>| matches!(r, Err(PegError::InvalidArgument(_)));
        assert!(invalid(darbi.set_darbi_minter(chain, admin, Address::zero())));
        assert!(invalid(darbi.set_controller(chain, admin, Address::zero())));
        assert!(invalid(darbi.set_arbitrage_threshold(chain, admin, U256::zero())));
        assert!(invalid(darbi.set_gas_refund(chain, admin, U256::zero())));
        assert_eq!(darbi.parameters(), before);
    }

    #[test]
    fn test_setters_persist_values() {
        let env = TestEnv::new();
        let (darbi, chain, admin) = (&env.darbi, &env.chain, env.admin);

        darbi.set_darbi_minter(chain, admin, meaningless_address()).unwrap();
        assert_eq!(darbi.darbi_minter(), meaningless_address());

        darbi.set_controller(chain, admin, meaningless_address()).unwrap();
        assert_eq!(darbi.controller(), meaningless_address());

        darbi.set_arbitrage_threshold(chain, admin, U256::from(20_000u64)).unwrap();
        assert_eq!(darbi.arbitrage_threshold(), U256::from(20_000u64));

        darbi.set_gas_refund(chain, admin, U256::from(10_000u64)).unwrap();
        assert_eq!(darbi.gas_refund(), U256::from(10_000u64));

        assert_eq!(
            chain.events().last().unwrap().event,
            PegEvent::GasRefundUpdated {
                gas_refund: U256::from(10_000u64)
            }
        );
    }

    #[test]
    fn test_role_grant_is_idempotent() {
        let env = TestEnv::new();
        let (darbi, chain, admin, stranger) = (&env.darbi, &env.chain, env.admin, env.stranger);

        assert!(darbi.grant_role(chain, admin, Role::Monitor, stranger).unwrap());
        assert!(!darbi.grant_role(chain, admin, Role::Monitor, stranger).unwrap());
        assert!(darbi.has_role(Role::Monitor, stranger));
        // Monitor 不蕴含其他角色
        assert!(!darbi.has_role(Role::Admin, stranger));

        assert!(darbi.revoke_role(chain, admin, Role::Monitor, stranger).unwrap());
        assert!(!darbi.revoke_role(chain, admin, Role::Monitor, stranger).unwrap());
        assert!(!darbi.has_role(Role::Monitor, stranger));
    }

    // ==================== move_market_buy_amount ====================

    #[test]
    fn test_aligned_pool_returns_zero() {
        let env = TestEnv::with_pool();
        let decision = env.darbi.move_market_buy_amount(&env.chain).unwrap();

        assert!(!decision.direction.a_to_b());
        assert!(decision.amount_in.is_zero());
    }

    #[test]
    fn test_increasing_supply_aligns_by_selling() {
        let env = TestEnv::with_pool();
        env.credit_up(env.admin, e18(1));
        let virtual_price = env.virtual_price();
        let block = env.chain.block_number();

        let decision = env.darbi.move_market_buy_amount(&env.chain).unwrap();
        // 只读调用不推进区块
        assert_eq!(env.chain.block_number(), block);
        assert!(decision.direction.a_to_b());

        env.swap(env.admin, decision.amount_in, &[env.up_token, env.native_token]);
        let price = env.reserves().spot_price().unwrap();
        assert!(within_one_percent(price, virtual_price));
    }

    #[test]
    fn test_increasing_backing_aligns_by_buying() {
        let env = TestEnv::with_pool();
        // 控制器余额 11 ETH / 2 UP
        env.transfer_native(env.admin, env.controller, e18(6));
        let virtual_price = env.virtual_price();
        assert_eq!(virtual_price, U256::from(55) * U256::exp10(17));

        let decision = env.darbi.move_market_buy_amount(&env.chain).unwrap();
        assert!(!decision.direction.a_to_b());

        env.swap(env.admin, decision.amount_in, &[env.native_token, env.up_token]);
        let price = env.reserves().spot_price().unwrap();
        assert!(within_one_percent(price, virtual_price));
    }

    #[test]
    fn test_sizing_follows_pool_fee() {
        let env = TestEnv::with_pool();
        env.credit_up(env.admin, e18(1));
        let virtual_price = env.virtual_price();

        // 配置 10% 手续费, 池子实际为 0.3%
        let mut deployment = DarbiDeployment::from_config(
            env.admin,
            meaningless_address(),
            env.up_token,
            env.native_token,
            env.controller,
            &PegConfig::default(),
        );
        deployment.swap_fee_bps = 1_000;
        let mismatched = Darbi::new(
            deployment,
            env.router.clone() as Arc<dyn SwapRouter>,
            env.mint_darbi.clone() as Arc<dyn MintChannel>,
        )
        .unwrap();

        let decision = mismatched.move_market_buy_amount(&env.chain).unwrap();
        assert_eq!(decision, env.darbi.move_market_buy_amount(&env.chain).unwrap());

        env.swap(env.admin, decision.amount_in, &[env.up_token, env.native_token]);
        let price = env.reserves().spot_price().unwrap();
        // 卖出后价格不低于目标
        assert!(price >= virtual_price);
        assert!(within_one_percent(price, virtual_price));
    }

    #[test]
    fn test_missing_pool_is_reported() {
        let env = TestEnv::new();
        let err = env.darbi.move_market_buy_amount(&env.chain).unwrap_err();
        assert!(matches!(err, PegError::PoolNotFound { .. }));
    }

    // ==================== arbitrage 守卫 ====================

    #[test]
    fn test_arbitrage_requires_monitor() {
        let env = TestEnv::with_pool();
        let err = env.darbi.arbitrage(&env.chain, env.stranger).unwrap_err();
        assert_eq!(
            err,
            PegError::PermissionDenied {
                role: "MONITOR_ROLE",
                account: env.stranger
            }
        );

        env.grant_monitor(env.stranger);
        assert!(env.darbi.arbitrage(&env.chain, env.stranger).is_ok());
    }

    #[test]
    fn test_arbitrage_rejected_while_paused() {
        let env = TestEnv::with_pool();
        env.grant_monitor(env.admin);

        env.darbi.pause(&env.chain, env.admin).unwrap();
        assert!(env.darbi.is_paused());
        assert_eq!(env.darbi.arbitrage(&env.chain, env.admin).unwrap_err(), PegError::PausedState);
        // 暂停检查先于角色检查
        assert_eq!(env.darbi.arbitrage(&env.chain, env.stranger).unwrap_err(), PegError::PausedState);

        // 重复暂停为空操作
        let events = env.chain.events().len();
        env.darbi.pause(&env.chain, env.admin).unwrap();
        assert_eq!(env.chain.events().len(), events);

        env.darbi.unpause(&env.chain, env.admin).unwrap();
        assert!(env.darbi.arbitrage(&env.chain, env.admin).is_ok());
    }

    // ==================== arbitrage 执行 ====================

    #[test]
    fn test_aligned_pool_is_skipped() {
        let env = TestEnv::with_pool();
        env.grant_monitor(env.admin);

        let outcome = env.darbi.arbitrage(&env.chain, env.admin).unwrap();
        assert!(matches!(
            outcome,
            ArbitrageOutcome::Skipped {
                reason: SkipReason::Aligned,
                ..
            }
        ));
    }

    #[test]
    fn test_below_threshold_is_skipped() {
        let env = TestEnv::with_pool();
        env.grant_monitor(env.admin);
        env.credit_up(env.admin, e18(1));
        env.darbi
            .set_arbitrage_threshold(&env.chain, env.admin, e18(1_000))
            .unwrap();
        let native_before = env.native_balance(env.darbi.address());

        let outcome = env.darbi.arbitrage(&env.chain, env.admin).unwrap();
        assert!(matches!(
            outcome,
            ArbitrageOutcome::Skipped {
                reason: SkipReason::BelowThreshold { .. },
                ..
            }
        ));
        assert_eq!(env.native_balance(env.darbi.address()), native_before);
    }

    #[test]
    fn test_sell_mints_shortfall_and_aligns() {
        let env = TestEnv::with_pool();
        env.grant_monitor(env.stranger);
        env.credit_up(env.admin, e18(1));
        let virtual_price = env.virtual_price();
        let refund = env.darbi.gas_refund();
        let caller_before = env.native_balance(env.stranger);

        let outcome = env.darbi.arbitrage(&env.chain, env.stranger).unwrap();
        let report = outcome.report().cloned().unwrap();

        assert_eq!(report.direction, Direction::SellBackedToken);
        assert_eq!(report.amount_in, U256::from(450_165_083_480_711_071u64));
        assert!(report.minted >= report.amount_in);
        // 支付 = ceil(缺口 * vp)
        assert_eq!(report.mint_payment, U256::from(750_275_139_134_518_452u64));
        assert_eq!(report.gas_refund_paid, refund);
        assert_eq!(env.native_balance(env.stranger) - caller_before, refund);

        assert!(within_one_percent(report.spot_price_after, virtual_price));
        // 按虚拟价格铸币不会稀释储备
        assert!(env.virtual_price() >= virtual_price);

        let names: Vec<&str> = env.chain.events().iter().rev().take(4).map(|r| r.event.name()).collect();
        assert_eq!(names, vec!["GasRefunded", "Arbitrage", "Swap", "DarbiMint"]);
    }

    #[test]
    fn test_sell_from_inventory_skips_mint() {
        let env = TestEnv::with_pool();
        env.grant_monitor(env.admin);
        // 执行器自持 1 UP, 供应 3 UP, 虚拟价格 5/3
        env.credit_up(env.darbi.address(), e18(1));
        let virtual_price = env.virtual_price();
        let events_before = env.chain.events().len();

        let report = env.darbi.arbitrage(&env.chain, env.admin).unwrap().report().cloned().unwrap();

        assert_eq!(report.direction, Direction::SellBackedToken);
        assert_eq!(report.amount_in, U256::from(450_165_083_480_711_071u64));
        assert!(report.minted.is_zero());
        assert!(report.mint_payment.is_zero());
        assert_eq!(env.up_balance(env.darbi.address()), e18(1) - report.amount_in);
        assert_eq!(env.chain.view(|s| s.ledger.total_supply(env.up_token)), e18(3));
        assert!(env.chain.events()[events_before..]
            .iter()
            .all(|r| r.event.name() != "DarbiMint"));
        assert!(within_one_percent(report.spot_price_after, virtual_price));
    }

    #[test]
    fn test_partial_inventory_mints_only_shortfall() {
        let env = TestEnv::with_pool();
        env.grant_monitor(env.admin);
        let inventory = U256::from(2) * U256::exp10(17);
        env.credit_up(env.darbi.address(), inventory);
        env.credit_up(env.admin, e18(1) - inventory);
        let virtual_price = env.virtual_price();

        let report = env.darbi.arbitrage(&env.chain, env.admin).unwrap().report().cloned().unwrap();

        assert_eq!(report.direction, Direction::SellBackedToken);
        assert_eq!(report.amount_in, U256::from(450_165_083_480_711_071u64));
        let shortfall = report.amount_in - inventory;
        let expected_payment = (shortfall * virtual_price + e18(1) - 1) / e18(1);
        assert_eq!(report.mint_payment, expected_payment);
        assert_eq!(report.minted, expected_payment * e18(1) / virtual_price);
        assert!(report.minted >= shortfall);
        assert!(report.minted < report.amount_in);
        // 成交后只剩铸币取整的零头
        assert_eq!(
            env.up_balance(env.darbi.address()),
            inventory + report.minted - report.amount_in
        );
        assert!(within_one_percent(report.spot_price_after, virtual_price));
    }

    #[test]
    fn test_buy_pays_from_native_balance() {
        let env = TestEnv::with_pool();
        env.grant_monitor(env.admin);
        env.transfer_native(env.admin, env.controller, e18(6));
        let virtual_price = env.virtual_price();
        let darbi_native = env.native_balance(env.darbi.address());

        let report = env.darbi.arbitrage(&env.chain, env.admin).unwrap().report().cloned().unwrap();

        assert_eq!(report.direction, Direction::BuyBackedToken);
        assert_eq!(report.amount_in, U256::from(2_419_829_119_035_122_207u64));
        assert!(report.minted.is_zero());
        assert_eq!(env.up_balance(env.darbi.address()), report.amount_out);
        assert_eq!(
            env.native_balance(env.darbi.address()),
            darbi_native - report.amount_in - report.gas_refund_paid
        );
        assert!(within_one_percent(report.spot_price_after, virtual_price));
    }

    #[test]
    fn test_insufficient_native_rolls_back() {
        let env = TestEnv::with_pool();
        env.grant_monitor(env.admin);
        env.transfer_native(env.admin, env.controller, e18(6));
        // 执行器只留 1 ETH, 不够买入
        env.transfer_native(env.darbi.address(), env.admin, e18(4));

        let reserves = env.reserves();
        let events = env.chain.events().len();
        let err = env.darbi.arbitrage(&env.chain, env.admin).unwrap_err();

        assert!(err.is_external());
        assert_eq!(env.reserves(), reserves);
        assert_eq!(env.native_balance(env.darbi.address()), e18(1));
        assert_eq!(env.chain.events().len(), events);
    }

    #[test]
    fn test_mint_channel_mismatch_rolls_back() {
        let env = TestEnv::with_pool();
        env.grant_monitor(env.admin);
        env.credit_up(env.admin, e18(1));
        env.darbi
            .set_darbi_minter(&env.chain, env.admin, meaningless_address())
            .unwrap();
        let supply_before = env.chain.view(|s| s.ledger.total_supply(env.up_token));

        let err = env.darbi.arbitrage(&env.chain, env.admin).unwrap_err();
        assert!(err.is_external());
        assert_eq!(env.chain.view(|s| s.ledger.total_supply(env.up_token)), supply_before);
    }

    #[test]
    fn test_mint_failure_rolls_back_trade() {
        let env = TestEnv::with_pool();
        env.grant_monitor(env.admin);
        env.credit_up(env.admin, e18(1));
        env.mint_darbi
            .revoke_darbi_role(&env.chain, env.admin, env.darbi.address())
            .unwrap();
        let reserves = env.reserves();
        let darbi_native = env.native_balance(env.darbi.address());

        let err = env.darbi.arbitrage(&env.chain, env.admin).unwrap_err();
        assert!(err.is_external());
        assert_eq!(env.reserves(), reserves);
        assert_eq!(env.native_balance(env.darbi.address()), darbi_native);
    }

    #[test]
    fn test_gas_refund_skipped_keeps_trade() {
        let env = TestEnv::with_pool();
        env.grant_monitor(env.admin);
        env.transfer_native(env.admin, env.controller, e18(6));
        env.darbi.set_gas_refund(&env.chain, env.admin, e18(100)).unwrap();
        let reserves = env.reserves();

        let report = env.darbi.arbitrage(&env.chain, env.admin).unwrap().report().cloned().unwrap();

        assert!(report.gas_refund_paid.is_zero());
        assert_ne!(env.reserves(), reserves);
        assert_eq!(env.chain.events().last().unwrap().event.name(), "GasRefundSkipped");
    }

    #[test]
    fn test_controller_rebinding_changes_target() {
        let env = TestEnv::with_pool();
        let other_controller = meaningless_address();
        env.transfer_native(env.admin, other_controller, e18(11));

        env.darbi.set_controller(&env.chain, env.admin, other_controller).unwrap();
        assert_eq!(env.darbi.virtual_price(&env.chain).unwrap(), U256::from(55) * U256::exp10(17));
        let decision = env.darbi.move_market_buy_amount(&env.chain).unwrap();
        assert_eq!(decision.direction, Direction::BuyBackedToken);
        assert!(!decision.is_noop());
    }
}
