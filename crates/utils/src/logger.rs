use std::fs;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, fmt, Layer};
use tracing_subscriber::filter::{LevelFilter, FilterFn};
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_appender::{non_blocking, rolling};
use time::macros::offset;

/// 单独落盘的日志 target
const EXECUTION_TARGET: &str = "arbitrage_execution";
const MINT_TARGET: &str = "darbi_mint";
const EVENT_TARGET: &str = "peg_events";

/// 日志管理器 - 基于target分类的日志系统
pub struct LoggerManager {
    _guards: Vec<non_blocking::WorkerGuard>,
}

impl LoggerManager {
    /// 初始化日志系统
    ///
    /// 日志分类：
    /// - app.log: 通用应用日志
    /// - arbitrage.log: 套利定量与执行日志
    /// - mint.log: 铸币通道日志
    /// - events.log: 已提交的链上事件
    pub fn init(dir: &str, level: &str) -> Self {
        let mut guards = Vec::new();

        // 创建日志目录
        fs::create_dir_all(dir).ok();

        let level: LevelFilter = level.parse().unwrap_or(LevelFilter::INFO);

        // 配置时区为东八区 (UTC+8 上海时间)
        let timer = OffsetTime::new(
            offset!(+8),
            time::format_description::well_known::Rfc3339,
        );

        // 1. 控制台输出
        let console_layer = fmt::layer()
            .compact()
            .with_target(true)
            .with_timer(timer.clone())
            .with_filter(level);

        // 2. 通用应用日志 (app.log), 排除单独落盘的 target
        let (app_writer, app_guard) = non_blocking(rolling::daily(dir, "app.log"));
        guards.push(app_guard);

        let app_layer = fmt::layer()
            .compact()
            .with_writer(app_writer)
            .with_ansi(false)
            .with_target(true)
            .with_timer(timer.clone())
            .with_filter(level)
            .with_filter(FilterFn::new(|metadata| {
                !matches!(metadata.target(), EXECUTION_TARGET | MINT_TARGET | EVENT_TARGET)
            }));

        // 3. 套利执行日志 (arbitrage.log)
        let (execution_writer, execution_guard) = non_blocking(rolling::daily(dir, "arbitrage.log"));
        guards.push(execution_guard);

        let execution_layer = fmt::layer()
            .compact()
            .with_writer(execution_writer)
            .with_ansi(false)
            .with_target(true)
            .with_timer(timer.clone())
            .with_filter(FilterFn::new(|metadata| metadata.target() == EXECUTION_TARGET));

        // 4. 铸币日志 (mint.log)
        let (mint_writer, mint_guard) = non_blocking(rolling::daily(dir, "mint.log"));
        guards.push(mint_guard);

        let mint_layer = fmt::layer()
            .compact()
            .with_writer(mint_writer)
            .with_ansi(false)
            .with_target(true)
            .with_timer(timer.clone())
            .with_filter(FilterFn::new(|metadata| metadata.target() == MINT_TARGET));

        // 5. 事件日志 (events.log)
        let (event_writer, event_guard) = non_blocking(rolling::daily(dir, "events.log"));
        guards.push(event_guard);

        let event_layer = fmt::layer()
            .compact()
            .with_writer(event_writer)
            .with_ansi(false)
            .with_target(true)
            .with_timer(timer)
            .with_filter(FilterFn::new(|metadata| metadata.target() == EVENT_TARGET));

        // 初始化tracing订阅器
        tracing_subscriber::registry()
            .with(console_layer)
            .with(app_layer)
            .with(execution_layer)
            .with(mint_layer)
            .with(event_layer)
            .init();

        Self { _guards: guards }
    }

    /// 测试用: 输出到测试捕获的 stdout, 重复调用无副作用
    pub fn init_for_tests() {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    }
}
