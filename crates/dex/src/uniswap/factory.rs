use ethers::types::Address;
use ethers::utils::keccak256;
use models::{PegError, PegResult};
use std::collections::HashMap;
use tracing::debug;

use super::v2::{ConstantProductPair, FEE_DENOMINATOR};

/// 交易对工厂
#[derive(Debug, Clone)]
pub struct PairFactory {
    address: Address,
    fee_bps: u32,
    pairs: HashMap<(Address, Address), ConstantProductPair>,
}

impl PairFactory {
    pub fn new(address: Address, fee_bps: u32) -> PegResult<Self> {
        if fee_bps >= FEE_DENOMINATOR {
            return Err(PegError::InvalidArgument(format!("fee_bps must be below {}", FEE_DENOMINATOR)));
        }
        Ok(Self {
            address,
            fee_bps,
            pairs: HashMap::new(),
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn fee_bps(&self) -> u32 {
        self.fee_bps
    }

    /// 确定性的交易对地址 = keccak256(factory, token0, token1) 的后 20 字节
    pub fn pair_address_for(&self, token_a: Address, token_b: Address) -> Address {
        let (token0, token1) = ConstantProductPair::sort_tokens(token_a, token_b);
        let mut preimage = Vec::with_capacity(60);
        preimage.extend_from_slice(self.address.as_bytes());
        preimage.extend_from_slice(token0.as_bytes());
        preimage.extend_from_slice(token1.as_bytes());
        Address::from_slice(&keccak256(preimage)[12..])
    }

    /// 创建交易对
    pub fn create_pair(&mut self, token_a: Address, token_b: Address) -> PegResult<Address> {
        if token_a == token_b {
            return Err(PegError::InvalidArgument("identical tokens".to_string()));
        }
        if token_a.is_zero() || token_b.is_zero() {
            return Err(PegError::InvalidArgument("zero token address".to_string()));
        }
        let key = ConstantProductPair::sort_tokens(token_a, token_b);
        if self.pairs.contains_key(&key) {
            return Err(PegError::InvalidArgument("pair exists".to_string()));
        }

        let address = self.pair_address_for(token_a, token_b);
        self.pairs
            .insert(key, ConstantProductPair::new(address, token_a, token_b, self.fee_bps));
        debug!("创建交易对 {:?}: {:?}/{:?}", address, key.0, key.1);
        Ok(address)
    }

    pub fn get_pair(&self, token_a: Address, token_b: Address) -> Option<&ConstantProductPair> {
        self.pairs.get(&ConstantProductPair::sort_tokens(token_a, token_b))
    }

    pub fn get_pair_mut(&mut self, token_a: Address, token_b: Address) -> Option<&mut ConstantProductPair> {
        self.pairs.get_mut(&ConstantProductPair::sort_tokens(token_a, token_b))
    }

    pub fn all_pairs_length(&self) -> usize {
        self.pairs.len()
    }
}
