use ethers::types::{Address, U256};
use std::collections::{HashMap, HashSet};

use crate::error::{PegError, PegResult};

/// 代币 MINT 角色名 (代币自身的铸币权限, 与合约角色无关)
pub const MINT_ROLE: &str = "MINT_ROLE";

#[derive(Debug, Clone, Default)]
struct TokenBook {
    balances: HashMap<Address, U256>,
    total_supply: U256,
    minters: HashSet<Address>,
}

/// 代币账本
///
/// 按代币地址记录余额、总供应量和铸币权限。数值资产 (原生币) 以包装代币地址记账,
/// 这样储备、支付、退款都是统一的余额操作。
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    books: HashMap<Address, TokenBook>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, token: Address, owner: Address) -> U256 {
        self.books
            .get(&token)
            .and_then(|book| book.balances.get(&owner).copied())
            .unwrap_or_default()
    }

    pub fn total_supply(&self, token: Address) -> U256 {
        self.books.get(&token).map(|book| book.total_supply).unwrap_or_default()
    }

    pub fn is_minter(&self, token: Address, account: Address) -> bool {
        self.books
            .get(&token)
            .map(|book| book.minters.contains(&account))
            .unwrap_or(false)
    }

    pub fn grant_minter(&mut self, token: Address, account: Address) {
        self.books.entry(token).or_default().minters.insert(account);
    }

    pub fn revoke_minter(&mut self, token: Address, account: Address) {
        if let Some(book) = self.books.get_mut(&token) {
            book.minters.remove(&account);
        }
    }

    /// 转账, 余额不足返回 `InsufficientBalance`
    pub fn transfer(&mut self, token: Address, from: Address, to: Address, amount: U256) -> PegResult<()> {
        let available = self.balance_of(token, from);
        if available < amount {
            return Err(PegError::InsufficientBalance {
                token,
                account: from,
                needed: amount,
                available,
            });
        }
        if amount.is_zero() || from == to {
            return Ok(());
        }

        let to_balance = self
            .balance_of(token, to)
            .checked_add(amount)
            .ok_or(PegError::ArithmeticOverflow("ledger balance"))?;

        let book = self.books.entry(token).or_default();
        book.balances.insert(from, available - amount);
        book.balances.insert(to, to_balance);
        Ok(())
    }

    /// 铸币, 调用方必须持有该代币的铸币权限
    pub fn mint(&mut self, token: Address, minter: Address, to: Address, amount: U256) -> PegResult<()> {
        if !self.is_minter(token, minter) {
            return Err(PegError::PermissionDenied {
                role: MINT_ROLE,
                account: minter,
            });
        }
        self.credit(token, to, amount)
    }

    /// 直接记账增发 (创世分配/部署引导)
    pub fn credit(&mut self, token: Address, to: Address, amount: U256) -> PegResult<()> {
        let total_supply = self
            .total_supply(token)
            .checked_add(amount)
            .ok_or(PegError::ArithmeticOverflow("token supply"))?;
        let balance = self
            .balance_of(token, to)
            .checked_add(amount)
            .ok_or(PegError::ArithmeticOverflow("ledger balance"))?;

        let book = self.books.entry(token).or_default();
        book.total_supply = total_supply;
        book.balances.insert(to, balance);
        Ok(())
    }
}
