use chrono::{DateTime, Utc};
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::{Direction, Role};

/// 供链下观测工具消费的事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum PegEvent {
    RoleGranted { role: Role, account: Address, sender: Address },
    RoleRevoked { role: Role, account: Address, sender: Address },
    Paused { account: Address },
    Unpaused { account: Address },
    DarbiMinterUpdated { darbi_minter: Address },
    ControllerUpdated { controller: Address },
    /// 铸币通道的控制器更新
    UpdateController { controller: Address },
    ArbitrageThresholdUpdated { threshold: U256 },
    GasRefundUpdated { gas_refund: U256 },
    MintRateUpdated { mint_rate: u32 },
    DarbiMint {
        recipient: Address,
        minted: U256,
        virtual_price: U256,
        payment: U256,
    },
    PublicMint {
        recipient: Address,
        minted: U256,
        virtual_price: U256,
        payment: U256,
    },
    Arbitrage {
        direction: Direction,
        amount_in: U256,
        amount_out: U256,
        minted: U256,
    },
    GasRefunded { recipient: Address, amount: U256 },
    GasRefundSkipped { recipient: Address, amount: U256, available: U256 },
    Swap {
        pair: Address,
        sender: Address,
        token_in: Address,
        amount_in: U256,
        token_out: Address,
        amount_out: U256,
        to: Address,
    },
    LiquidityAdded {
        pair: Address,
        provider: Address,
        amount0: U256,
        amount1: U256,
    },
}

impl PegEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PegEvent::RoleGranted { .. } => "RoleGranted",
            PegEvent::RoleRevoked { .. } => "RoleRevoked",
            PegEvent::Paused { .. } => "Paused",
            PegEvent::Unpaused { .. } => "Unpaused",
            PegEvent::DarbiMinterUpdated { .. } => "DarbiMinterUpdated",
            PegEvent::ControllerUpdated { .. } => "ControllerUpdated",
            PegEvent::UpdateController { .. } => "UpdateController",
            PegEvent::ArbitrageThresholdUpdated { .. } => "ArbitrageThresholdUpdated",
            PegEvent::GasRefundUpdated { .. } => "GasRefundUpdated",
            PegEvent::MintRateUpdated { .. } => "MintRateUpdated",
            PegEvent::DarbiMint { .. } => "DarbiMint",
            PegEvent::PublicMint { .. } => "PublicMint",
            PegEvent::Arbitrage { .. } => "Arbitrage",
            PegEvent::GasRefunded { .. } => "GasRefunded",
            PegEvent::GasRefundSkipped { .. } => "GasRefundSkipped",
            PegEvent::Swap { .. } => "Swap",
            PegEvent::LiquidityAdded { .. } => "LiquidityAdded",
        }
    }
}

/// 已记录的事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub block: u64,
    pub emitter: Address,
    pub event: PegEvent,
    pub recorded_at: DateTime<Utc>,
}

/// 事件日志
///
/// 由宿主状态持有, 事务失败时随状态一起回滚。
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    records: Vec<EventRecord>,
    current_block: u64,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, emitter: Address, event: PegEvent) {
        self.records.push(EventRecord {
            block: self.current_block,
            emitter,
            event,
            recorded_at: Utc::now(),
        });
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// 从下标 `from` 开始的记录
    pub fn since(&self, from: usize) -> &[EventRecord] {
        self.records.get(from..).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn current_block(&self) -> u64 {
        self.current_block
    }

    pub fn advance_block(&mut self) {
        self.current_block += 1;
    }
}
