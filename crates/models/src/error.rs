use ethers::types::{Address, U256};
use thiserror::Error;

/// 锚定系统的统一错误类型
///
/// 所有错误都在任何状态变更之前返回, 或者由宿主事务整体回滚,
/// 调用方看到错误时不会观察到任何部分生效的副作用。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PegError {
    #[error("Permission denied: {account:?} does not hold {role}")]
    PermissionDenied { role: &'static str, account: Address },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Pausable: paused")]
    PausedState,

    #[error("Pool not found for pair {token_a:?}/{token_b:?}")]
    PoolNotFound { token_a: Address, token_b: Address },

    #[error("Arithmetic overflow in {0}")]
    ArithmeticOverflow(&'static str),

    #[error("External call failed: {0}")]
    ExternalCallFailure(String),

    #[error("Insufficient balance of {token:?} for {account:?}: needed {needed}, available {available}")]
    InsufficientBalance {
        token: Address,
        account: Address,
        needed: U256,
        available: U256,
    },
}

impl PegError {
    /// 是否属于外部协作方 (路由/铸币通道) 的失败
    pub fn is_external(&self) -> bool {
        matches!(self, PegError::ExternalCallFailure(_))
    }

    /// 将协作方返回的错误包装为 `ExternalCallFailure`, 保留原始原因
    pub fn external(call: &str, source: PegError) -> PegError {
        match source {
            PegError::ExternalCallFailure(msg) => PegError::ExternalCallFailure(format!("{}: {}", call, msg)),
            other => PegError::ExternalCallFailure(format!("{}: {}", call, other)),
        }
    }
}

pub type PegResult<T> = std::result::Result<T, PegError>;

/// 校验地址非零
pub fn ensure_address(value: Address, field: &str) -> PegResult<Address> {
    if value.is_zero() {
        return Err(PegError::InvalidArgument(format!("{} must not be the zero address", field)));
    }
    Ok(value)
}

/// 校验数量非零
pub fn ensure_amount(value: U256, field: &str) -> PegResult<U256> {
    if value.is_zero() {
        return Err(PegError::InvalidArgument(format!("{} must not be zero", field)));
    }
    Ok(value)
}
