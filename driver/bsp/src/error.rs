//! 命令/事件分发层的错误分类
//!
//! 所有错误都在分发层本地恢复，以结果码形式交给回调或调用方；只有池所有权违规
//! （重复释放、使用已释放句柄）属于编程错误，由 debug_assert 捕获。

use axerrno::AxError;

/// 命令/事件路径上的错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CmdError {
    /// 命令对象池已空，调用方可重试或向上返回 busy
    #[error("command pool exhausted")]
    ResourceExhausted,
    /// transport 发送失败（errno），本层不自动重试
    #[error("h2c transmit failed (errno {0})")]
    TransportFailure(i32),
    /// 同步命令在超时时间内未收到响应
    #[error("timed out waiting for h2c response")]
    Timeout,
    /// C2H 帧声明的 payload 长度超出实际收到的长度
    #[error("malformed c2h event: declared {declared} bytes, {available} available")]
    MalformedEvent { declared: usize, available: usize },
    /// 事件 payload 长度与表中登记的 parmsize 不一致
    #[error("c2h event 0x{code:02x}: expected {expected} bytes, got {got}")]
    ParmSizeMismatch { code: u16, expected: usize, got: usize },
    /// 码值不在表内
    #[error("unrecognized code 0x{0:04x}")]
    UnrecognizedCode(u16),
    /// 适配器正在拆除，命令未执行或被中止
    #[error("adapter teardown in progress")]
    TeardownInProgress,
    /// 参数缓冲超过 MAX_CMDSZ
    #[error("parameter buffer too large ({0} bytes)")]
    ParmTooLarge(usize),
}

impl CmdError {
    /// 与驱动其它路径一致的负 errno
    pub fn errno(&self) -> i32 {
        match self {
            CmdError::ResourceExhausted => -12, // -ENOMEM
            CmdError::TransportFailure(e) if *e < 0 => *e,
            CmdError::TransportFailure(_) => -5, // -EIO
            CmdError::Timeout => -62,            // -ETIME
            CmdError::MalformedEvent { .. } | CmdError::ParmSizeMismatch { .. } => -74, // -EBADMSG
            CmdError::UnrecognizedCode(_) | CmdError::ParmTooLarge(_) => -22, // -EINVAL
            CmdError::TeardownInProgress => -19,                             // -ENODEV
        }
    }
}

impl From<CmdError> for AxError {
    fn from(e: CmdError) -> Self {
        match e {
            CmdError::ResourceExhausted => AxError::NoMemory,
            CmdError::TransportFailure(_) => AxError::Io,
            CmdError::Timeout => AxError::WouldBlock,
            CmdError::MalformedEvent { .. } | CmdError::ParmSizeMismatch { .. } => {
                AxError::InvalidData
            }
            CmdError::UnrecognizedCode(_) | CmdError::ParmTooLarge(_) => AxError::InvalidInput,
            CmdError::TeardownInProgress => AxError::BadState,
        }
    }
}

/// 命令完成结果，写入 `CmdObj::res` 后交给回调
pub type CmdResult = Result<(), CmdError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_mapping() {
        assert_eq!(CmdError::ResourceExhausted.errno(), -12);
        assert_eq!(CmdError::TransportFailure(-110).errno(), -110);
        assert_eq!(CmdError::TransportFailure(3).errno(), -5);
        assert_eq!(CmdError::Timeout.errno(), -62);
        assert_eq!(CmdError::TeardownInProgress.errno(), -19);
        assert_eq!(AxError::from(CmdError::TeardownInProgress), AxError::BadState);
    }
}
