//! 无线 H2C 命令 / C2H 事件分发层
//!
//! 主机到固件（H2C）的命令与固件到主机（C2H）的事件在这里汇合：
//! - 命令对象池（固定容量 slab，整数句柄）
//! - 命令队列（FIFO，单消费者）与 `rtw_cmd_thread`（发送、等待响应、超时、回调、回收）
//! - 事件解码与分发（直连 / 延迟两种策略，延迟路径由 `rtw_evt_thread` 处理）
//! - 码表：命令码 → (模式, 回调)，事件码 → (parmsize, 处理方式)
//!
//! 具体码值与参数布局由上层（fdrv）定义；本层只认 [`Code`] 与不透明字节。
//! 总线由实现 [`H2cTransport`] 的平台层提供。

mod adapter;
mod c2h;
mod cmd;
mod cmd_thread;
mod config;
mod error;
mod event;
mod pool;
mod queue;
mod registry;
mod sync;
mod transport;

pub use adapter::{Adapter, C2hSink, CmdStats};
pub use c2h::{
    build_c2h_frame, build_h2c_rsp, parse_c2h_frame, parse_h2c_rsp, C2hEvent, C2hHeader, C2H_HDR_LEN,
    C2H_SEQ_MASK, H2C_RSP_HDR_LEN,
};
pub use cmd::{
    CmdHandle, CmdId, CmdMode, CmdObj, CmdOutcome, Code, CMD_TIMEOUT_MS, FREE_CMDOBJ_SZ, MAX_CMDSZ,
    MAX_EVTSZ, MAX_RSPSZ,
};
pub use cmd_thread::CmdPriv;
pub use config::{parse_configfile, AdapterConfig, EvtPath};
pub use error::{CmdError, CmdResult};
pub use event::{DeferredDelivery, DirectDelivery, EvtDelivery, EvtObj, EvtPriv};
pub use pool::CmdPool;
pub use queue::CmdQueue;
pub use registry::{CmdCallback, CmdEntry, CmdRegistry, EvtEntry, EvtHandler, EvtKind, EvtRegistry};
pub use sync::{deadline_after, Completion, MAX_WAIT};
pub use transport::{H2cTransport, NullTransport};
