//! 锚定套利执行模块
//!
//! ## 模块结构
//!
//! - `bootstrap`: 按配置部署整套合约
//! - `darbi`: 套利执行器, 角色与暂停守卫, 参数管理
//! - `mint_darbi`: 按虚拟价格铸币的专用通道
//! - `mint_public`: 带溢价的公开铸币通道
//! - `types`: 部署参数与执行结果

mod bootstrap;
mod darbi;
mod mint_darbi;
mod mint_public;
mod types;

#[cfg(test)]
mod fixtures;

pub use bootstrap::{PegAddresses, PegSystem};
pub use darbi::Darbi;
pub use mint_darbi::{MintChannel, UpMintDarbi};
pub use mint_public::{BackingMultipleCurve, PremiumCurve, RatePremiumCurve, UpMintPublic, MINT_RATE_DENOMINATOR};
pub use types::{ArbitrageOutcome, ArbitrageReport, DarbiDeployment, DarbiParameters, SkipReason};
