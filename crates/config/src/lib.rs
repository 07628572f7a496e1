use anyhow::{bail, Context, Result};
use ethers::types::{Address, U256};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    pub peg: PegConfig,
    pub log: LogConfig,
}

/// 锚定套利参数
#[derive(Debug, Clone, Deserialize)]
pub struct PegConfig {
    /// 最小套利规模 (wei), 低于该值跳过
    pub arbitrage_threshold: U256,
    /// 每次成功套利退还给调用者的金额 (wei)
    pub gas_refund: U256,
    /// 池子手续费 (基点, 30 = 0.3%)
    pub swap_fee_bps: u32,
    /// 铸币通道地址 (可选, 默认使用部署时绑定的通道)
    pub darbi_minter: Option<Address>,
    /// 控制器地址 (可选, 默认使用部署时绑定的控制器)
    pub controller: Option<Address>,
    /// 公开铸币溢价 (基点)
    pub public_mint_rate_bps: u32,
}

impl Default for PegConfig {
    fn default() -> Self {
        Self {
            arbitrage_threshold: U256::from(10_000u64),
            gas_refund: U256::exp10(15), // 0.001 原生币
            swap_fee_bps: 30,
            darbi_minter: None,
            controller: None,
            public_mint_rate_bps: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub dir: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: "logs".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        // 加载 .env 文件
        dotenv::dotenv().ok();
        Self::from_source(|key| env::var(key).ok())
    }

    /// 从任意键值来源构建配置 (环境变量、测试用的 map 等)
    pub fn from_source<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = PegConfig::default();

        let arbitrage_threshold = match get("ARBITRAGE_THRESHOLD") {
            Some(raw) => parse_amount(&raw).context("Invalid ARBITRAGE_THRESHOLD")?,
            None => defaults.arbitrage_threshold,
        };
        if arbitrage_threshold.is_zero() {
            bail!("ARBITRAGE_THRESHOLD must not be zero");
        }

        let gas_refund = match get("GAS_REFUND") {
            Some(raw) => parse_amount(&raw).context("Invalid GAS_REFUND")?,
            None => defaults.gas_refund,
        };
        if gas_refund.is_zero() {
            bail!("GAS_REFUND must not be zero");
        }

        let swap_fee_bps: u32 = match get("SWAP_FEE_BPS") {
            Some(raw) => raw.parse().context("Invalid SWAP_FEE_BPS")?,
            None => defaults.swap_fee_bps,
        };
        if swap_fee_bps >= 10_000 {
            bail!("SWAP_FEE_BPS must be below 10000, got {}", swap_fee_bps);
        }

        let darbi_minter = get("DARBI_MINTER_ADDRESS")
            .map(|raw| parse_address(&raw).context("Invalid DARBI_MINTER_ADDRESS"))
            .transpose()?;
        let controller = get("CONTROLLER_ADDRESS")
            .map(|raw| parse_address(&raw).context("Invalid CONTROLLER_ADDRESS"))
            .transpose()?;

        let public_mint_rate_bps: u32 = match get("PUBLIC_MINT_RATE_BPS") {
            Some(raw) => raw.parse().context("Invalid PUBLIC_MINT_RATE_BPS")?,
            None => defaults.public_mint_rate_bps,
        };
        if public_mint_rate_bps == 0 || public_mint_rate_bps > 10_000 {
            bail!("PUBLIC_MINT_RATE_BPS must be within 1..=10000, got {}", public_mint_rate_bps);
        }

        // 日志配置
        let log = LogConfig {
            level: get("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            dir: get("LOG_DIR").unwrap_or_else(|| "logs".to_string()),
        };

        Ok(Self {
            peg: PegConfig {
                arbitrage_threshold,
                gas_refund,
                swap_fee_bps,
                darbi_minter,
                controller,
                public_mint_rate_bps,
            },
            log,
        })
    }
}

/// 解析十进制 wei 数量
fn parse_amount(raw: &str) -> Result<U256> {
    U256::from_dec_str(raw).map_err(|e| anyhow::anyhow!("{:?}", e))
}

/// 解析非零地址
fn parse_address(raw: &str) -> Result<Address> {
    let address: Address = raw.parse().map_err(|e| anyhow::anyhow!("{:?}", e))?;
    if address.is_zero() {
        bail!("zero address is not allowed");
    }
    Ok(address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_source(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.peg.arbitrage_threshold, U256::from(10_000u64));
        assert_eq!(config.peg.gas_refund, U256::exp10(15));
        assert_eq!(config.peg.swap_fee_bps, 30);
        assert!(config.peg.controller.is_none());
        assert_eq!(config.log.level, "info");
        assert_eq!(config.log.dir, "logs");
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("ARBITRAGE_THRESHOLD", "5000"),
            ("GAS_REFUND", "42"),
            ("SWAP_FEE_BPS", "25"),
            ("CONTROLLER_ADDRESS", "0xA38395b264f232ffF4bb294b5947092E359dDE88"),
            ("RUST_LOG", "debug"),
        ])
        .unwrap();

        assert_eq!(config.peg.arbitrage_threshold, U256::from(5000u64));
        assert_eq!(config.peg.gas_refund, U256::from(42u64));
        assert_eq!(config.peg.swap_fee_bps, 25);
        assert_eq!(
            config.peg.controller,
            Some("0xA38395b264f232ffF4bb294b5947092E359dDE88".parse().unwrap())
        );
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn test_zero_values_rejected() {
        assert!(load(&[("ARBITRAGE_THRESHOLD", "0")]).is_err());
        assert!(load(&[("GAS_REFUND", "0")]).is_err());
        assert!(load(&[("DARBI_MINTER_ADDRESS", "0x0000000000000000000000000000000000000000")]).is_err());
    }

    #[test]
    fn test_malformed_values_rejected() {
        assert!(load(&[("SWAP_FEE_BPS", "10000")]).is_err());
        assert!(load(&[("SWAP_FEE_BPS", "abc")]).is_err());
        assert!(load(&[("GAS_REFUND", "-1")]).is_err());
        assert!(load(&[("CONTROLLER_ADDRESS", "not-an-address")]).is_err());
        assert!(load(&[("PUBLIC_MINT_RATE_BPS", "0")]).is_err());
    }
}
