//! 公开铸币通道: 任何人支付原生币按溢价铸币, 所得进入控制器作为储备

use config_crate::PegConfig;
use ethers::types::{Address, U256, U512};
use models::{
    ensure_address, ensure_amount, price_scale, AccessControl, PauseState, PegError, PegEvent, PegResult, Role,
};
use parking_lot::RwLock;
use services::{Chain, UpController, VirtualPriceOracle};
use tracing::info;

/// 溢价基数
pub const MINT_RATE_DENOMINATOR: u32 = 10_000;

/// 公开铸币的定价曲线
pub trait PremiumCurve: Send + Sync {
    /// 给定支付、虚拟价格和溢价费率, 返回铸出数量
    fn minted_for(&self, payment: U256, virtual_price: U256, mint_rate_bps: u32) -> PegResult<U256>;
}

/// 在虚拟价格上加收固定基点溢价
///
/// minted = payment * 10^18 * 10000 / (vp * (10000 + rate))
#[derive(Debug, Clone, Copy, Default)]
pub struct RatePremiumCurve;

impl PremiumCurve for RatePremiumCurve {
    fn minted_for(&self, payment: U256, virtual_price: U256, mint_rate_bps: u32) -> PegResult<U256> {
        if virtual_price.is_zero() {
            return Ok(U256::zero());
        }
        let overflow = || PegError::ArithmeticOverflow("public mint amount");

        let numerator = payment
            .full_mul(price_scale())
            .checked_mul(U512::from(MINT_RATE_DENOMINATOR))
            .ok_or_else(overflow)?;
        let denominator = U512::from(virtual_price) * U512::from(MINT_RATE_DENOMINATOR + mint_rate_bps);

        U256::try_from(numerator / denominator).map_err(|_| overflow())
    }
}

/// 按虚拟价格的固定倍数铸币, 与溢价费率无关
///
/// minted = payment * vp * multiplier / (10^18 * 10000)
///
/// 默认倍数 9500 复现已部署版本的实测输出: vp 2.5 时每支付 1 得 2.375。
#[derive(Debug, Clone, Copy)]
pub struct BackingMultipleCurve {
    multiplier_bps: u32,
}

impl BackingMultipleCurve {
    pub const DEPLOYED_MULTIPLIER_BPS: u32 = 9_500;

    pub fn new(multiplier_bps: u32) -> PegResult<Self> {
        if multiplier_bps == 0 {
            return Err(PegError::InvalidArgument("curve multiplier must not be zero".to_string()));
        }
        Ok(Self { multiplier_bps })
    }

    pub fn multiplier_bps(&self) -> u32 {
        self.multiplier_bps
    }
}

impl Default for BackingMultipleCurve {
    fn default() -> Self {
        Self {
            multiplier_bps: Self::DEPLOYED_MULTIPLIER_BPS,
        }
    }
}

impl PremiumCurve for BackingMultipleCurve {
    fn minted_for(&self, payment: U256, virtual_price: U256, _mint_rate_bps: u32) -> PegResult<U256> {
        if virtual_price.is_zero() {
            return Ok(U256::zero());
        }
        let overflow = || PegError::ArithmeticOverflow("public mint amount");

        let numerator = payment
            .full_mul(virtual_price)
            .checked_mul(U512::from(self.multiplier_bps))
            .ok_or_else(overflow)?;
        let denominator = U512::from(price_scale()) * U512::from(MINT_RATE_DENOMINATOR);

        U256::try_from(numerator / denominator).map_err(|_| overflow())
    }
}

pub struct UpMintPublic {
    address: Address,
    up_token: Address,
    native_token: Address,
    controller: Address,
    curve: Box<dyn PremiumCurve>,
    access: RwLock<AccessControl>,
    pause: RwLock<PauseState>,
    mint_rate: RwLock<u32>,
}

impl UpMintPublic {
    pub fn new(
        address: Address,
        owner: Address,
        up_token: Address,
        native_token: Address,
        controller: Address,
        mint_rate: u32,
    ) -> PegResult<Self> {
        Self::with_curve(address, owner, up_token, native_token, controller, mint_rate, Box::new(RatePremiumCurve))
    }

    /// 溢价取配置中的 `public_mint_rate_bps`, 配置的控制器地址优先
    pub fn from_config(
        address: Address,
        owner: Address,
        up_token: Address,
        native_token: Address,
        controller: Address,
        config: &PegConfig,
    ) -> PegResult<Self> {
        Self::new(
            address,
            owner,
            up_token,
            native_token,
            config.controller.unwrap_or(controller),
            config.public_mint_rate_bps,
        )
    }

    pub fn with_curve(
        address: Address,
        owner: Address,
        up_token: Address,
        native_token: Address,
        controller: Address,
        mint_rate: u32,
        curve: Box<dyn PremiumCurve>,
    ) -> PegResult<Self> {
        ensure_address(address, "public mint address")?;
        ensure_address(owner, "owner")?;
        ensure_address(up_token, "up token")?;
        ensure_address(native_token, "native token")?;
        ensure_address(controller, "controller")?;
        validate_rate(mint_rate)?;

        Ok(Self {
            address,
            up_token,
            native_token,
            controller,
            curve,
            access: RwLock::new(AccessControl::with_admin(owner)),
            pause: RwLock::new(PauseState::default()),
            mint_rate: RwLock::new(mint_rate),
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn mint_rate(&self) -> u32 {
        *self.mint_rate.read()
    }

    pub fn is_paused(&self) -> bool {
        self.pause.read().is_paused()
    }

    pub fn set_mint_rate(&self, chain: &Chain, caller: Address, mint_rate: u32) -> PegResult<()> {
        chain.transact("up_mint_public.set_mint_rate", |state| {
            self.access.read().check_role(Role::Admin, caller)?;
            validate_rate(mint_rate)?;
            *self.mint_rate.write() = mint_rate;
            state.emit(self.address, PegEvent::MintRateUpdated { mint_rate });
            Ok(())
        })
    }

    pub fn pause(&self, chain: &Chain, caller: Address) -> PegResult<()> {
        self.set_pause(chain, caller, PauseState::Paused)
    }

    pub fn unpause(&self, chain: &Chain, caller: Address) -> PegResult<()> {
        self.set_pause(chain, caller, PauseState::Active)
    }

    fn set_pause(&self, chain: &Chain, caller: Address, target: PauseState) -> PegResult<()> {
        chain.transact("up_mint_public.set_pause", |state| {
            self.access.read().check_role(Role::Admin, caller)?;
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

    /// 支付原生币铸币, 虚拟价格为零时铸出零但支付照常转入控制器
    pub fn mint_up(&self, chain: &Chain, caller: Address, payment: U256) -> PegResult<U256> {
        chain.transact("up_mint_public.mint_up", |state| {
            self.pause.read().ensure_active()?;
            ensure_amount(payment, "payment")?;

            let oracle = UpController::at(self.controller, self.up_token, self.native_token);
            let virtual_price = oracle.get_virtual_price(&state.ledger)?;
            let minted = self.curve.minted_for(payment, virtual_price, self.mint_rate())?;

            state.ledger.transfer(self.native_token, caller, self.controller, payment)?;
            if !minted.is_zero() {
                state.ledger.mint(self.up_token, self.address, caller, minted)?;
            }
            state.emit(
                self.address,
                PegEvent::PublicMint {
                    recipient: caller,
                    minted,
                    virtual_price,
                    payment,
                },
            );

            info!(
                target: "darbi_mint",
                "公开铸币: {:?} 支付 {} 获得 {} UP (虚拟价格 {}, 溢价 {} bps)",
                caller,
                payment,
                minted,
                virtual_price,
                self.mint_rate()
            );
            Ok(minted)
        })
    }
}

fn validate_rate(mint_rate: u32) -> PegResult<()> {
    if mint_rate == 0 || mint_rate > MINT_RATE_DENOMINATOR {
        return Err(PegError::InvalidArgument(format!(
            "mint rate must be within 1..={} bps",
            MINT_RATE_DENOMINATOR
        )));
    }
    Ok(())
}
