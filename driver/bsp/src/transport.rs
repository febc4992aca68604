//! 固件 transport 接口
//!
//! 平台实现此 trait 把 H2C 命令写到总线（SDIO/USB/GSPI 等）；收到的 C2H 帧由平台调用
//! `Adapter::deliver_event` 送回本层。

/// H2C 发送
pub trait H2cTransport: Send + Sync {
    /// 同步发送一条命令；成功返回 Ok(())，失败返回负 errno（如 -5 EIO、-110 flow control 超时）。
    /// 在 cmd_thread 上调用，同一时刻最多一条。
    ///
    /// `cmd_seq` 写入 H2C 头；固件的 H2C 响应须原样回显，用于把响应对应到命令。
    fn transmit(&self, code: u16, cmd_seq: u8, parm: &[u8]) -> Result<(), i32>;
}

impl<T: H2cTransport + ?Sized> H2cTransport for std::sync::Arc<T> {
    fn transmit(&self, code: u16, cmd_seq: u8, parm: &[u8]) -> Result<(), i32> {
        (**self).transmit(code, cmd_seq, parm)
    }
}

/// 占位实现：所有命令发送即成功，不产生响应（无硬件时联调用）
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTransport;

impl H2cTransport for NullTransport {
    fn transmit(&self, code: u16, cmd_seq: u8, parm: &[u8]) -> Result<(), i32> {
        log::trace!(target: "wireless::bsp", "null transport: drop h2c code={} seq={} len={}", code, cmd_seq, parm.len());
        Ok(())
    }
}
