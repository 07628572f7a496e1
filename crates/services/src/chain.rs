//! 宿主链模拟
//!
//! 所有会修改状态的入口都在 `Chain::transact` 内执行: 先快照, 失败时整体恢复,
//! 成功时提交本次事务产生的事件并推进区块。

use dex::{DexContext, PairFactory};
use ethers::types::Address;
use models::{EventLog, EventRecord, Ledger, PegEvent, PegResult};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

/// 链上全局状态: 代币账本、交易对、事件日志
#[derive(Debug, Clone)]
pub struct ChainState {
    pub ledger: Ledger,
    pub factory: PairFactory,
    pub events: EventLog,
}

impl ChainState {
    pub fn new(factory: PairFactory) -> Self {
        Self {
            ledger: Ledger::new(),
            factory,
            events: EventLog::new(),
        }
    }

    /// 借出路由调用需要的上下文
    pub fn dex(&mut self) -> DexContext<'_> {
        DexContext {
            factory: &mut self.factory,
            ledger: &mut self.ledger,
            events: &mut self.events,
        }
    }

    pub fn emit(&mut self, emitter: Address, event: PegEvent) {
        self.events.emit(emitter, event);
    }
}

/// 单锁宿主, 串行化所有事务
pub struct Chain {
    state: Mutex<ChainState>,
}

impl Chain {
    pub fn new(factory: PairFactory) -> Self {
        Self {
            state: Mutex::new(ChainState::new(factory)),
        }
    }

    /// 原子执行一次事务
    ///
    /// 闭包返回 Err 时恢复到调用前的快照, 账本、储备和事件都不会部分生效。
    pub fn transact<T, F>(&self, label: &str, f: F) -> PegResult<T>
    where
        F: FnOnce(&mut ChainState) -> PegResult<T>,
    {
        let mut state = self.state.lock();
        let snapshot = state.clone();
        let first_event = state.events.len();

        match f(&mut state) {
            Ok(value) => {
                let block = state.events.current_block();
                for record in state.events.since(first_event) {
                    let payload = serde_json::to_string(record).unwrap_or_else(|_| record.event.name().to_string());
                    info!(target: "peg_events", "block={} emitter={:?} {}", record.block, record.emitter, payload);
                }
                state.events.advance_block();
                debug!("事务 {} 已提交, 区块 {}", label, block);
                Ok(value)
            }
            Err(e) => {
                *state = snapshot;
                warn!("事务 {} 回滚: {}", label, e);
                Err(e)
            }
        }
    }

    /// 只读访问, 与事务共用同一把锁, 读到的储备和余额总是一致的
    pub fn view<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&ChainState) -> T,
    {
        let state = self.state.lock();
        f(&state)
    }

    /// 已提交的全部事件
    pub fn events(&self) -> Vec<EventRecord> {
        self.view(|state| state.events.records().to_vec())
    }

    pub fn block_number(&self) -> u64 {
        self.view(|state| state.events.current_block())
    }
}
