//! rtw 无线驱动控制面 (FDRV)
//!
//! 在 bsp 分发层之上定义具体协议：
//! - H2C 命令码 / C2H 事件码 (codes)
//! - 参数构建与事件解析 (parm)
//! - 命令回调与事件处理表 (dispatch)
//! - 连接状态机 (manager)
//! - 控制面命令 (wlan)

mod codes;
mod dispatch;
mod error;
mod manager;
pub mod parm;
mod wlan;

pub use codes::{C2hEvt, H2cCmd};
pub use dispatch::{build_cmd_registry, build_evt_registry};
pub use error::WlanError;
pub use manager::{WifiManager, WifiState, WlanEvent, WlanEventCb, SCAN_RESULT_MAX};
pub use parm::{AuthMode, DotAlgorithm, SetStaKeyRsp, WlanBssid};
pub use wlan::{RtwAdapter, WlanCmd};
