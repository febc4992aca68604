//! wireless crate
//!
//! rtw 无线驱动的命令/事件通路：BSP + FDRV
//! - BSP: 命令对象池、命令队列与 `rtw_cmd_thread`、C2H 事件解码与分发
//! - FDRV: 码表、参数构建、命令回调 / 事件处理、连接状态机、控制面命令

use std::sync::Arc;

pub use bsp;
pub use fdrv;

use axerrno::AxResult;
use bsp::{AdapterConfig, C2hSink, CmdStats, H2cTransport};
use fdrv::{build_cmd_registry, build_evt_registry, C2hEvt, H2cCmd, RtwAdapter, WifiManager, WifiState};

/// 默认接口名
pub const DEFAULT_IFNAME: &str = "wlan0";

/// 无线驱动上下文：适配器 + 管理器
/// 平台初始化时创建，可交给 api/syscall 或上层使用
pub struct WirelessDriver {
    pub adapter: RtwAdapter,
    pub manager: Arc<WifiManager>,
}

impl WirelessDriver {
    pub fn new<T>(ifname: &str, transport: T, config: AdapterConfig) -> AxResult<Self>
    where
        T: H2cTransport + 'static,
    {
        let manager = Arc::new(WifiManager::new(ifname));
        let adapter = RtwAdapter::new(
            config,
            build_cmd_registry(&manager),
            build_evt_registry(&manager),
            transport,
        )?;
        manager.up()?;
        Ok(Self { adapter, manager })
    }

    pub fn adapter(&self) -> &RtwAdapter {
        &self.adapter
    }

    pub fn manager(&self) -> &WifiManager {
        &self.manager
    }

    /// 交给总线收包路径的 C2H 投递口
    pub fn c2h_sink(&self) -> C2hSink<H2cCmd, C2hEvt> {
        self.adapter.c2h_sink()
    }

    pub fn stats(&self) -> CmdStats {
        self.adapter.stats()
    }

    /// 关闭接口并拆除适配器：排空命令与事件、回收线程。可重复调用。
    pub fn shutdown(&self) {
        if self.manager.state() != WifiState::Down {
            self.manager.down();
        }
        self.adapter.teardown();
        log::info!(target: "wireless", "{} shutdown: {:?}", self.manager.interface_name(), self.adapter.stats());
    }
}

impl Drop for WirelessDriver {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// 创建驱动上下文
///
/// 建立适配器（启动 `rtw_cmd_thread`，延迟事件路径下另起 `rtw_evt_thread`），装入 rtw 命令回调与事件处理表，
/// 接口置为 Up。transport 由平台提供；收到的 C2H 帧交给 [`WirelessDriver::c2h_sink`]。
pub fn wireless_driver_init<T>(transport: T, config: AdapterConfig) -> AxResult<WirelessDriver>
where
    T: H2cTransport + 'static,
{
    log::info!(target: "wireless", "wireless: init driver ({:?} event path)", config.evt_path);
    WirelessDriver::new(DEFAULT_IFNAME, transport, config)
}
