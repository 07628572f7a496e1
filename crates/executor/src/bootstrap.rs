//! 部署引导
//!
//! 由宿主进程调用: 加载配置, 初始化日志, 建立链状态并部署套利执行器与两个铸币通道。

use anyhow::{Context, Result};
use config_crate::AppConfig;
use dex::{PairFactory, SwapRouter, V2Router};
use ethers::types::Address;
use models::PegResult;
use services::Chain;
use std::sync::Arc;
use tracing::info;
use utils::LoggerManager;

use crate::{Darbi, DarbiDeployment, MintChannel, UpMintDarbi, UpMintPublic};

/// 部署所需的合约地址
#[derive(Debug, Clone, Copy)]
pub struct PegAddresses {
    pub admin: Address,
    pub up_token: Address,
    pub native_token: Address,
    pub controller: Address,
    pub factory: Address,
    pub router: Address,
    pub mint_darbi: Address,
    pub mint_public: Address,
    pub darbi: Address,
}

/// 一套完整部署
pub struct PegSystem {
    pub config: AppConfig,
    pub chain: Chain,
    pub router: Arc<V2Router>,
    pub mint_darbi: Arc<UpMintDarbi>,
    pub mint_public: UpMintPublic,
    pub darbi: Darbi,
}

impl PegSystem {
    /// 从环境加载配置并初始化日志后部署
    ///
    /// 返回的 `LoggerManager` 持有日志写入线程, 需要在进程生命周期内保留。
    pub fn start(addresses: PegAddresses) -> Result<(Self, LoggerManager)> {
        let config = AppConfig::load()?;
        let logger = LoggerManager::init(&config.log.dir, &config.log.level);
        info!("加载配置完成: {:?}", config.peg);

        let system = Self::bootstrap(config, addresses).context("部署失败")?;
        Ok((system, logger))
    }

    /// 按配置部署
    ///
    /// 池子手续费、执行器参数和公开铸币费率都取自配置; 两个铸币通道获得 UP 的铸币权限,
    /// 执行器获得专用通道的 DarbiMinter 角色。
    pub fn bootstrap(config: AppConfig, addresses: PegAddresses) -> PegResult<Self> {
        let factory = PairFactory::new(addresses.factory, config.peg.swap_fee_bps)?;
        let chain = Chain::new(factory);
        let router = Arc::new(V2Router::new(addresses.router));

        let mint_darbi = Arc::new(UpMintDarbi::new(
            addresses.mint_darbi,
            addresses.admin,
            addresses.up_token,
            addresses.native_token,
            config.peg.controller.unwrap_or(addresses.controller),
        )?);
        let mint_public = UpMintPublic::from_config(
            addresses.mint_public,
            addresses.admin,
            addresses.up_token,
            addresses.native_token,
            addresses.controller,
            &config.peg,
        )?;

        let deployment = DarbiDeployment::from_config(
            addresses.admin,
            addresses.darbi,
            addresses.up_token,
            addresses.native_token,
            addresses.controller,
            &config.peg,
        );
        let darbi = Darbi::new(
            deployment,
            router.clone() as Arc<dyn SwapRouter>,
            mint_darbi.clone() as Arc<dyn MintChannel>,
        )?;

        chain.transact("bootstrap", |state| {
            state.ledger.grant_minter(addresses.up_token, addresses.mint_darbi);
            state.ledger.grant_minter(addresses.up_token, addresses.mint_public);
            Ok(())
        })?;
        mint_darbi.grant_darbi_role(&chain, addresses.admin, addresses.darbi)?;

        info!(
            "🚀 部署完成: 执行器 {:?}, 专用铸币 {:?}, 公开铸币 {:?}",
            addresses.darbi, addresses.mint_darbi, addresses.mint_public
        );

        Ok(Self {
            config,
            chain,
            router,
            mint_darbi,
            mint_public,
            darbi,
        })
    }
}
