//! 控制面命令
//!
//! 每个操作：校验连接状态 → 构建参数 → 提交命令 → 按需迁移状态。提交失败时状态回滚。
//! 除 `set_sta_key` / `set_assoc_sta` 外均为异步提交，结果由命令回调与 C2H 事件写回 [`WifiManager`]。

use bsp::{Adapter, CmdHandle};

use crate::codes::{C2hEvt, H2cCmd};
use crate::error::WlanError;
use crate::manager::{WifiManager, WifiState, SCAN_RESULT_MAX};
use crate::parm::{
    build_disconnect_parm, build_joinbss_parm, build_set_assocsta_parm, build_set_channel_plan_parm,
    build_set_channel_switch_parm, build_set_stakey_parm, build_setauth_parm, build_setkey_parm,
    build_setstapwrstate_parm, build_sitesurvey_parm, parse_set_assocsta_rsp, parse_set_stakey_rsp,
    AuthMode, DotAlgorithm, SetStaKeyRsp, WlanBssid, ETH_ALEN,
};

/// rtw 命令驱动的适配器
pub type RtwAdapter = Adapter<H2cCmd, C2hEvt>;

pub trait WlanCmd {
    /// 加入指定 BSS（Up → Connecting）；结果由 JoinBss 事件给出
    fn joinbss(&self, mgr: &WifiManager, network: &WlanBssid) -> Result<CmdHandle, WlanError>;
    /// 断开当前连接（Connected / Connecting → Disconnecting）
    fn disassoc(&self, mgr: &WifiManager) -> Result<CmdHandle, WlanError>;
    /// 站点扫描（Up / Connected → Scanning），指定 SSID 时做定向探测
    fn sitesurvey(&self, mgr: &WifiManager, ssid: Option<&[u8]>, active: bool) -> Result<CmdHandle, WlanError>;
    fn set_auth(&self, mode: AuthMode, tls: bool) -> Result<CmdHandle, WlanError>;
    fn set_key(
        &self,
        algorithm: DotAlgorithm,
        keyid: u8,
        grpkey: bool,
        set_tx: bool,
        key: &[u8],
    ) -> Result<CmdHandle, WlanError>;
    /// 安装站点密钥，阻塞到固件返回分配的 key id
    fn set_sta_key(
        &self,
        addr: &[u8; ETH_ALEN],
        algorithm: DotAlgorithm,
        id: u8,
        key: &[u8],
    ) -> Result<SetStaKeyRsp, WlanError>;
    /// 为新关联站点申请固件条目，阻塞到返回 CAM id
    fn set_assoc_sta(&self, addr: &[u8; ETH_ALEN]) -> Result<u8, WlanError>;
    fn set_sta_pwr_state(&self, staid: u8, status: u8, hwaddr: &[u8; ETH_ALEN]) -> Result<CmdHandle, WlanError>;
    fn set_chplan(&self, channel_plan: u8) -> Result<CmdHandle, WlanError>;
    fn set_csa(&self, new_ch_no: u8) -> Result<CmdHandle, WlanError>;
}

fn check_key(algorithm: DotAlgorithm, key: &[u8]) -> Result<(), WlanError> {
    // NoPrivacy 时 key 为空，用于清除条目
    if key.len() != algorithm.key_len() {
        log::warn!(
            target: "wireless::fdrv",
            "key len {} does not match {:?} ({})",
            key.len(),
            algorithm,
            algorithm.key_len()
        );
        return Err(WlanError::InvalidParm);
    }
    Ok(())
}

/// 先迁移状态再提交，提交失败回滚
fn submit_in_state(
    adapter: &RtwAdapter,
    mgr: &WifiManager,
    from: &[WifiState],
    to: WifiState,
    code: H2cCmd,
    parm: &[u8],
) -> Result<CmdHandle, WlanError> {
    let prev = mgr.transition(from, to)?;
    adapter.submit(code, parm).map_err(|e| {
        mgr.set_state(prev);
        WlanError::from(e)
    })
}

impl WlanCmd for RtwAdapter {
    fn joinbss(&self, mgr: &WifiManager, network: &WlanBssid) -> Result<CmdHandle, WlanError> {
        if network.ssid.is_empty() {
            return Err(WlanError::InvalidParm);
        }
        mgr.transition(&[WifiState::Up], WifiState::Connecting)?;
        mgr.set_target(network.clone());
        log::info!(
            target: "wireless::fdrv",
            "joinbss {:?} bssid {:02x?} ch {}",
            String::from_utf8_lossy(&network.ssid),
            network.bssid,
            network.channel
        );
        self.submit(H2cCmd::JoinBss, &build_joinbss_parm(network)).map_err(|e| {
            mgr.on_join_failed();
            WlanError::from(e)
        })
    }

    fn disassoc(&self, mgr: &WifiManager) -> Result<CmdHandle, WlanError> {
        submit_in_state(
            self,
            mgr,
            &[WifiState::Connected, WifiState::Connecting],
            WifiState::Disconnecting,
            H2cCmd::DisConnect,
            &build_disconnect_parm(),
        )
    }

    fn sitesurvey(&self, mgr: &WifiManager, ssid: Option<&[u8]>, active: bool) -> Result<CmdHandle, WlanError> {
        let parm = build_sitesurvey_parm(active, SCAN_RESULT_MAX as u32, ssid);
        submit_in_state(
            self,
            mgr,
            &[WifiState::Up, WifiState::Connected],
            WifiState::Scanning,
            H2cCmd::SiteSurvey,
            &parm,
        )
    }

    fn set_auth(&self, mode: AuthMode, tls: bool) -> Result<CmdHandle, WlanError> {
        Ok(self.submit(H2cCmd::SetAuth, &build_setauth_parm(mode, tls))?)
    }

    fn set_key(
        &self,
        algorithm: DotAlgorithm,
        keyid: u8,
        grpkey: bool,
        set_tx: bool,
        key: &[u8],
    ) -> Result<CmdHandle, WlanError> {
        check_key(algorithm, key)?;
        if keyid > 3 {
            return Err(WlanError::InvalidParm);
        }
        let parm = build_setkey_parm(algorithm, keyid, grpkey, set_tx, key).ok_or(WlanError::InvalidParm)?;
        Ok(self.submit(H2cCmd::SetKey, &parm)?)
    }

    fn set_sta_key(
        &self,
        addr: &[u8; ETH_ALEN],
        algorithm: DotAlgorithm,
        id: u8,
        key: &[u8],
    ) -> Result<SetStaKeyRsp, WlanError> {
        check_key(algorithm, key)?;
        let parm = build_set_stakey_parm(addr, algorithm, id, key).ok_or(WlanError::InvalidParm)?;
        let rsp = self
            .submit_and_wait(H2cCmd::SetStaKey, &parm, self.config().cmd_timeout())?
            .into_rsp()?;
        parse_set_stakey_rsp(&rsp).ok_or(WlanError::BadRsp(rsp.len()))
    }

    fn set_assoc_sta(&self, addr: &[u8; ETH_ALEN]) -> Result<u8, WlanError> {
        let rsp = self
            .submit_and_wait(H2cCmd::SetAssocSta, &build_set_assocsta_parm(addr), self.config().cmd_timeout())?
            .into_rsp()?;
        parse_set_assocsta_rsp(&rsp).ok_or(WlanError::BadRsp(rsp.len()))
    }

    fn set_sta_pwr_state(&self, staid: u8, status: u8, hwaddr: &[u8; ETH_ALEN]) -> Result<CmdHandle, WlanError> {
        Ok(self.submit(H2cCmd::SetStaPwrState, &build_setstapwrstate_parm(staid, status, hwaddr))?)
    }

    fn set_chplan(&self, channel_plan: u8) -> Result<CmdHandle, WlanError> {
        Ok(self.submit(H2cCmd::SetChannelPlan, &build_set_channel_plan_parm(channel_plan))?)
    }

    fn set_csa(&self, new_ch_no: u8) -> Result<CmdHandle, WlanError> {
        if new_ch_no == 0 {
            return Err(WlanError::InvalidParm);
        }
        Ok(self.submit(H2cCmd::SetChannelSwitch, &build_set_channel_switch_parm(new_ch_no, 0))?)
    }
}
