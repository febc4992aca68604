//! WiFi 管理器
//!
//! 连接状态机与扫描结果。状态由控制面操作（`WlanCmd`）发起迁移，由命令回调（cmd 线程）与
//! C2H 事件（evt 线程或投递方上下文）完成迁移，因此内部加锁，按 `Arc` 共享。
//!
//! ```text
//! Down ──up──▶ Up ──sitesurvey──▶ Scanning ──SurveyDone──▶ (扫描前状态)
//!               │ ▲
//!        joinbss│ │JoinBss 失败 / 命令失败
//!               ▼ │
//!           Connecting ──JoinBss(res>0)──▶ Connected ──disassoc──▶ Disconnecting ──▶ Up
//!                                            │
//!                                            └──DelSta(当前 BSSID)──▶ Up
//! ```

use spin::Mutex;

use crate::error::WlanError;
use crate::parm::{JoinBssEvt, ReportPwrState, SetStaKeyRsp, WlanBssid, ETH_ALEN};

/// 扫描结果上限（sitesurvey_parm.bsslimit 最大值）
pub const SCAN_RESULT_MAX: usize = 48;

/// WiFi 接口状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum WifiState {
    Down = 0,
    Up = 1,
    Scanning = 2,
    Connecting = 3,
    Connected = 4,
    Disconnecting = 5,
}

/// 上报给上层的连接事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WlanEvent {
    ScanDone { bss_cnt: u32 },
    Connected { bssid: [u8; ETH_ALEN], aid: u16 },
    ConnectFailed { join_res: i32 },
    Disconnected { bssid: [u8; ETH_ALEN], reason: u16 },
}

pub type WlanEventCb = Box<dyn Fn(&WlanEvent) + Send + Sync>;

struct MgrInner {
    state: WifiState,
    /// 扫描结束后回到的状态
    pre_scan: WifiState,
    scan_results: Vec<WlanBssid>,
    /// Connecting 时为目标网络，Connected 时为当前网络
    cur_network: Option<WlanBssid>,
    aid: u16,
    channel_plan: Option<u8>,
    sta_keys: Vec<SetStaKeyRsp>,
    pwr_state: Option<ReportPwrState>,
}

/// WiFi 管理器
pub struct WifiManager {
    interface_name: String,
    inner: Mutex<MgrInner>,
    listener: spin::RwLock<Option<WlanEventCb>>,
}

impl WifiManager {
    pub fn new(interface: &str) -> Self {
        Self {
            interface_name: String::from(interface),
            inner: Mutex::new(MgrInner {
                state: WifiState::Down,
                pre_scan: WifiState::Up,
                scan_results: Vec::new(),
                cur_network: None,
                aid: 0,
                channel_plan: None,
                sta_keys: Vec::new(),
                pwr_state: None,
            }),
            listener: spin::RwLock::new(None),
        }
    }

    pub fn state(&self) -> WifiState {
        self.inner.lock().state
    }

    pub fn set_state(&self, state: WifiState) {
        let mut inner = self.inner.lock();
        log::debug!(target: "wireless::fdrv", "{}: {:?} -> {:?}", self.interface_name, inner.state, state);
        inner.state = state;
    }

    pub fn interface_name(&self) -> &str {
        &self.interface_name
    }

    /// 注册连接事件监听（扫描完成、连接结果、断开）
    pub fn set_listener(&self, cb: Option<WlanEventCb>) {
        *self.listener.write() = cb;
    }

    fn notify(&self, evt: WlanEvent) {
        if let Some(cb) = self.listener.read().as_ref() {
            cb(&evt);
        }
    }

    pub fn up(&self) -> Result<(), WlanError> {
        let mut inner = self.inner.lock();
        if inner.state != WifiState::Down {
            return Err(WlanError::BadState(inner.state));
        }
        inner.state = WifiState::Up;
        log::info!(target: "wireless::fdrv", "{} up", self.interface_name);
        Ok(())
    }

    pub fn down(&self) {
        let mut inner = self.inner.lock();
        inner.state = WifiState::Down;
        inner.scan_results.clear();
        inner.cur_network = None;
        inner.aid = 0;
        inner.sta_keys.clear();
        log::info!(target: "wireless::fdrv", "{} down", self.interface_name);
    }

    /// 若当前状态在 `from` 内则迁移到 `to`，返回原状态
    pub(crate) fn transition(&self, from: &[WifiState], to: WifiState) -> Result<WifiState, WlanError> {
        let mut inner = self.inner.lock();
        let prev = inner.state;
        if !from.contains(&prev) {
            log::warn!(target: "wireless::fdrv", "{}: {:?} -> {:?} rejected", self.interface_name, prev, to);
            return Err(WlanError::BadState(prev));
        }
        if to == WifiState::Scanning {
            inner.pre_scan = prev;
            inner.scan_results.clear();
        }
        inner.state = to;
        log::debug!(target: "wireless::fdrv", "{}: {:?} -> {:?}", self.interface_name, prev, to);
        Ok(prev)
    }

    /// 状态仍为 `expect` 时迁移到 `to`（回调 / 事件与控制面并发时以先到者为准）
    fn transition_if(inner: &mut MgrInner, expect: WifiState, to: WifiState) -> bool {
        if inner.state != expect {
            return false;
        }
        inner.state = to;
        true
    }

    pub fn scan_results(&self) -> Vec<WlanBssid> {
        self.inner.lock().scan_results.clone()
    }

    pub fn cur_network(&self) -> Option<WlanBssid> {
        self.inner.lock().cur_network.clone()
    }

    pub fn aid(&self) -> u16 {
        self.inner.lock().aid
    }

    pub fn channel_plan(&self) -> Option<u8> {
        self.inner.lock().channel_plan
    }

    pub fn sta_key(&self, addr: &[u8; ETH_ALEN]) -> Option<u8> {
        self.inner
            .lock()
            .sta_keys
            .iter()
            .find(|k| &k.addr == addr)
            .map(|k| k.keyid)
    }

    pub fn pwr_state(&self) -> Option<ReportPwrState> {
        self.inner.lock().pwr_state
    }

    // ========== 命令回调 / 事件处理调用 ==========

    pub(crate) fn set_target(&self, network: WlanBssid) {
        self.inner.lock().cur_network = Some(network);
    }

    /// Survey 事件：仅扫描中收录，按 BSSID 去重，超出上限丢弃
    pub(crate) fn on_survey(&self, bss: WlanBssid) {
        let mut inner = self.inner.lock();
        if inner.state != WifiState::Scanning {
            log::debug!(target: "wireless::fdrv", "survey result outside scan, dropped");
            return;
        }
        if let Some(old) = inner.scan_results.iter_mut().find(|b| b.bssid == bss.bssid) {
            *old = bss;
        } else if inner.scan_results.len() < SCAN_RESULT_MAX {
            inner.scan_results.push(bss);
        }
    }

    pub(crate) fn on_survey_done(&self, bss_cnt: u32) {
        {
            let mut inner = self.inner.lock();
            let back = inner.pre_scan;
            if !Self::transition_if(&mut inner, WifiState::Scanning, back) {
                return;
            }
            log::info!(
                target: "wireless::fdrv",
                "{} survey done: fw {} bss, {} kept",
                self.interface_name,
                bss_cnt,
                inner.scan_results.len()
            );
        }
        self.notify(WlanEvent::ScanDone { bss_cnt });
    }

    /// SiteSurvey 命令失败：退出扫描
    pub(crate) fn on_survey_failed(&self) {
        let mut inner = self.inner.lock();
        let back = inner.pre_scan;
        Self::transition_if(&mut inner, WifiState::Scanning, back);
    }

    /// JoinBss 命令失败：固件不会再发 JoinBss 事件
    pub(crate) fn on_join_failed(&self) {
        let mut inner = self.inner.lock();
        if Self::transition_if(&mut inner, WifiState::Connecting, WifiState::Up) {
            inner.cur_network = None;
        }
    }

    pub(crate) fn on_join_evt(&self, evt: JoinBssEvt) {
        let out = {
            let mut inner = self.inner.lock();
            if inner.state != WifiState::Connecting {
                log::debug!(target: "wireless::fdrv", "joinbss event in {:?}, ignored", inner.state);
                return;
            }
            if evt.join_res > 0 {
                inner.state = WifiState::Connected;
                inner.aid = evt.join_res as u16;
                let bssid = evt.network.bssid;
                inner.cur_network = Some(evt.network);
                WlanEvent::Connected {
                    bssid,
                    aid: inner.aid,
                }
            } else {
                inner.state = WifiState::Up;
                inner.cur_network = None;
                WlanEvent::ConnectFailed {
                    join_res: evt.join_res,
                }
            }
        };
        log::info!(target: "wireless::fdrv", "{} {:?}", self.interface_name, out);
        self.notify(out);
    }

    /// DisConnect 命令完成：成功回到 Up，失败恢复 Connected
    pub(crate) fn on_disconnect_done(&self, ok: bool) {
        let bssid = {
            let mut inner = self.inner.lock();
            let to = if ok { WifiState::Up } else { WifiState::Connected };
            if !Self::transition_if(&mut inner, WifiState::Disconnecting, to) || !ok {
                return;
            }
            inner.aid = 0;
            inner.cur_network.take().map(|n| n.bssid).unwrap_or_default()
        };
        self.notify(WlanEvent::Disconnected { bssid, reason: 0 });
    }

    /// DelSta 事件：被当前 AP 踢出时回到 Up
    pub(crate) fn on_sta_del(&self, macaddr: [u8; ETH_ALEN], reason: u16) {
        {
            let mut inner = self.inner.lock();
            let ours = inner.cur_network.as_ref().is_some_and(|n| n.bssid == macaddr);
            if !ours || !Self::transition_if(&mut inner, WifiState::Connected, WifiState::Up) {
                return;
            }
            inner.aid = 0;
            inner.cur_network = None;
        }
        log::info!(target: "wireless::fdrv", "{} deauth by {:02x?} reason {}", self.interface_name, macaddr, reason);
        self.notify(WlanEvent::Disconnected { bssid: macaddr, reason });
    }

    pub(crate) fn on_sta_key(&self, rsp: SetStaKeyRsp) {
        let mut inner = self.inner.lock();
        match inner.sta_keys.iter_mut().find(|k| k.addr == rsp.addr) {
            Some(k) => *k = rsp,
            None => inner.sta_keys.push(rsp),
        }
    }

    pub(crate) fn on_channel_plan(&self, plan: u8) {
        self.inner.lock().channel_plan = Some(plan);
    }

    pub(crate) fn on_pwr_state(&self, pwr: ReportPwrState) {
        self.inner.lock().pwr_state = Some(pwr);
    }
}
