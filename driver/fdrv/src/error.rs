use axerrno::AxError;
use bsp::CmdError;

use crate::manager::WifiState;

/// 控制面操作错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WlanError {
    /// 当前连接状态不允许该操作
    #[error("not allowed in state {0:?}")]
    BadState(WifiState),
    #[error("invalid parameter")]
    InvalidParm,
    /// 固件响应长度不足或内容无法解析
    #[error("bad firmware response ({0} bytes)")]
    BadRsp(usize),
    #[error(transparent)]
    Cmd(#[from] CmdError),
}

impl WlanError {
    pub fn errno(&self) -> i32 {
        match self {
            WlanError::BadState(_) => -16, // -EBUSY
            WlanError::InvalidParm => -22, // -EINVAL
            WlanError::BadRsp(_) => -74,   // -EBADMSG
            WlanError::Cmd(e) => e.errno(),
        }
    }
}

impl From<WlanError> for AxError {
    fn from(e: WlanError) -> Self {
        match e {
            WlanError::BadState(_) => AxError::ResourceBusy,
            WlanError::InvalidParm => AxError::InvalidInput,
            WlanError::BadRsp(_) => AxError::InvalidData,
            WlanError::Cmd(e) => e.into(),
        }
    }
}
