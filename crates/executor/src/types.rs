//! 执行器类型定义

use config_crate::PegConfig;
use ethers::types::{Address, U256};
use models::{ensure_address, ensure_amount, ArbitrageDecision, Direction, PegResult};
use serde::{Deserialize, Serialize};

/// 套利执行器部署参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DarbiDeployment {
    /// 初始管理员
    pub admin: Address,
    /// 执行器自身地址 (持有库存和原生币)
    pub address: Address,
    /// 锚定代币 (UP)
    pub up_token: Address,
    /// 数值资产 (包装原生币)
    pub native_token: Address,
    /// 控制器地址, 虚拟价格来源
    pub controller: Address,
    /// 铸币通道地址, 为空时使用部署时传入通道的地址
    pub darbi_minter: Option<Address>,
    /// 最小套利规模 (wei)
    pub arbitrage_threshold: U256,
    /// 每次成功套利退还给调用者的金额 (wei)
    pub gas_refund: U256,
    /// 池子手续费 (基点)
    pub swap_fee_bps: u32,
}

impl DarbiDeployment {
    /// 从配置构建, 配置中的控制器与铸币通道地址优先
    pub fn from_config(
        admin: Address,
        address: Address,
        up_token: Address,
        native_token: Address,
        controller: Address,
        config: &PegConfig,
    ) -> Self {
        Self {
            admin,
            address,
            up_token,
            native_token,
            controller: config.controller.unwrap_or(controller),
            darbi_minter: config.darbi_minter,
            arbitrage_threshold: config.arbitrage_threshold,
            gas_refund: config.gas_refund,
            swap_fee_bps: config.swap_fee_bps,
        }
    }

    /// 与 setter 相同的非零校验
    pub fn validate(&self) -> PegResult<()> {
        ensure_address(self.admin, "admin")?;
        ensure_address(self.address, "executor address")?;
        ensure_address(self.up_token, "up token")?;
        ensure_address(self.native_token, "native token")?;
        ensure_address(self.controller, "controller")?;
        if let Some(minter) = self.darbi_minter {
            ensure_address(minter, "darbi minter")?;
        }
        ensure_amount(self.arbitrage_threshold, "arbitrage threshold")?;
        ensure_amount(self.gas_refund, "gas refund")?;
        Ok(())
    }
}

/// 管理员可修改的运行参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DarbiParameters {
    pub arbitrage_threshold: U256,
    pub gas_refund: U256,
    pub darbi_minter: Address,
    pub controller: Address,
}

/// 跳过原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// 池子价格已与虚拟价格对齐
    Aligned,
    /// 计算出的规模低于阈值
    BelowThreshold { threshold: U256 },
}

/// 一次成功套利的明细
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArbitrageReport {
    pub direction: Direction,
    pub amount_in: U256,
    pub amount_out: U256,
    /// 为补足库存从铸币通道铸出的数量
    pub minted: U256,
    /// 支付给铸币通道的原生币
    pub mint_payment: U256,
    /// 实际退还给调用者的金额, 余额不足时为零
    pub gas_refund_paid: U256,
    pub virtual_price: U256,
    pub spot_price_before: U256,
    pub spot_price_after: U256,
}

/// 套利调用结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArbitrageOutcome {
    Skipped {
        decision: ArbitrageDecision,
        reason: SkipReason,
    },
    Executed(ArbitrageReport),
}

impl ArbitrageOutcome {
    pub fn is_executed(&self) -> bool {
        matches!(self, ArbitrageOutcome::Executed(_))
    }

    pub fn report(&self) -> Option<&ArbitrageReport> {
        match self {
            ArbitrageOutcome::Executed(report) => Some(report),
            ArbitrageOutcome::Skipped { .. } => None,
        }
    }
}
