//! 角色权限与暂停开关
//!
//! 每个会修改状态的入口都先调用这里的检查函数, 检查通过之后才允许写状态或发起外部调用。

use ethers::types::{Address, H256};
use ethers::utils::keccak256;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::error::{ensure_address, PegError, PegResult};

lazy_static::lazy_static! {
    static ref MONITOR_ROLE_ID: H256 = H256::from(keccak256("MONITOR_ROLE"));
    static ref DARBI_ROLE_ID: H256 = H256::from(keccak256("DARBI_ROLE"));
}

/// 能力角色, 互不蕴含
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    /// 可以授予/撤销任意角色, 修改参数, 暂停/恢复
    Admin,
    /// 可以触发套利
    Monitor,
    /// 可以按虚拟价格铸币
    DarbiMinter,
}

impl Role {
    pub fn name(&self) -> &'static str {
        match self {
            Role::Admin => "DEFAULT_ADMIN_ROLE",
            Role::Monitor => "MONITOR_ROLE",
            Role::DarbiMinter => "DARBI_ROLE",
        }
    }

    /// 角色标识 (与链上合约一致: 管理员为全零, 其余为名称的 keccak256)
    pub fn id(&self) -> H256 {
        match self {
            Role::Admin => H256::zero(),
            Role::Monitor => *MONITOR_ROLE_ID,
            Role::DarbiMinter => *DARBI_ROLE_ID,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 身份 -> 角色集合
#[derive(Debug, Clone, Default)]
pub struct AccessControl {
    grants: HashMap<Address, BTreeSet<Role>>,
}

impl AccessControl {
    /// 以部署者作为初始管理员
    pub fn with_admin(admin: Address) -> Self {
        let mut access = Self::default();
        access.grants.entry(admin).or_default().insert(Role::Admin);
        access
    }

    pub fn has_role(&self, role: Role, account: Address) -> bool {
        self.grants
            .get(&account)
            .map(|roles| roles.contains(&role))
            .unwrap_or(false)
    }

    /// 能力检查, 失败返回 `PermissionDenied`
    pub fn check_role(&self, role: Role, account: Address) -> PegResult<()> {
        if self.has_role(role, account) {
            Ok(())
        } else {
            Err(PegError::PermissionDenied {
                role: role.name(),
                account,
            })
        }
    }

    /// 授予角色, 返回是否发生了变化 (重复授予不报错)
    pub fn grant_role(&mut self, role: Role, account: Address) -> PegResult<bool> {
        ensure_address(account, "account")?;
        Ok(self.grants.entry(account).or_default().insert(role))
    }

    /// 撤销角色, 返回是否发生了变化 (撤销未持有的角色不报错)
    pub fn revoke_role(&mut self, role: Role, account: Address) -> PegResult<bool> {
        ensure_address(account, "account")?;
        let changed = match self.grants.get_mut(&account) {
            Some(roles) => roles.remove(&role),
            None => false,
        };
        if self.grants.get(&account).map(|r| r.is_empty()).unwrap_or(false) {
            self.grants.remove(&account);
        }
        Ok(changed)
    }

    /// 持有某角色的全部身份 (按地址排序)
    pub fn members(&self, role: Role) -> Vec<Address> {
        let mut members: Vec<Address> = self
            .grants
            .iter()
            .filter(|(_, roles)| roles.contains(&role))
            .map(|(account, _)| *account)
            .collect();
        members.sort();
        members
    }
}

/// 暂停状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PauseState {
    #[default]
    Active,
    Paused,
}

impl PauseState {
    pub fn is_paused(&self) -> bool {
        matches!(self, PauseState::Paused)
    }

    pub fn ensure_active(&self) -> PegResult<()> {
        if self.is_paused() {
            Err(PegError::PausedState)
        } else {
            Ok(())
        }
    }
}

/// 入口守卫: 先检查暂停状态, 再检查角色
///
/// 两项检查都不写任何状态, 必须在所有写操作和外部调用之前执行。
pub fn check_entry(access: &AccessControl, pause: PauseState, role: Role, caller: Address) -> PegResult<()> {
    pause.ensure_active()?;
    access.check_role(role, caller)
}
