//! 命令回调与 C2H 事件处理表
//!
//! 命令码 → 完成回调：JoinBss / DisConnect / SiteSurvey / SetStaKey / SetChannelPlan，其余码无回调。
//! 事件码 → 处理函数：Survey / SurveyDone / JoinBss / AddSta / DelSta / ReportPwrState / FwDbg；
//! H2cRsp 为命令响应通道。处理结果写入 [`WifiManager`]。

use std::sync::Arc;

use bsp::{C2hEvent, CmdMode, CmdObj, CmdRegistry, EvtRegistry};

use crate::codes::{C2hEvt, H2cCmd};
use crate::manager::WifiManager;
use crate::parm::{
    parse_joinbss_evt, parse_reportpwrstate_evt, parse_set_stakey_rsp, parse_stadel_evt,
    parse_stassoc_evt, parse_surveydone_evt, WlanBssid, JOINBSS_EVT_LEN, REPORTPWRSTATE_EVT_LEN,
    STADEL_EVT_LEN, STASSOC_EVT_LEN, SURVEYDONE_EVT_LEN, WLAN_BSSID_LEN,
};

fn joinbss_cmd_callback(mgr: &WifiManager, obj: &CmdObj<H2cCmd>) {
    if let Err(e) = &obj.res {
        log::warn!(target: "wireless::fdrv", "joinbss cmd seq={} failed: {}", obj.seq, e);
        mgr.on_join_failed();
    }
}

fn disassoc_cmd_callback(mgr: &WifiManager, obj: &CmdObj<H2cCmd>) {
    if let Err(e) = &obj.res {
        log::warn!(target: "wireless::fdrv", "disconnect cmd seq={} failed: {}", obj.seq, e);
    }
    mgr.on_disconnect_done(obj.is_ok());
}

fn survey_cmd_callback(mgr: &WifiManager, obj: &CmdObj<H2cCmd>) {
    if let Err(e) = &obj.res {
        log::warn!(target: "wireless::fdrv", "sitesurvey cmd seq={} failed: {}", obj.seq, e);
        mgr.on_survey_failed();
    }
}

fn setstakey_cmdrsp_callback(mgr: &WifiManager, obj: &CmdObj<H2cCmd>) {
    if !obj.is_ok() {
        return;
    }
    match parse_set_stakey_rsp(&obj.rsp) {
        Some(rsp) => mgr.on_sta_key(rsp),
        None => log::warn!(target: "wireless::fdrv", "set_stakey rsp too short ({} bytes)", obj.rspsz()),
    }
}

fn set_channel_plan_cmd_callback(mgr: &WifiManager, obj: &CmdObj<H2cCmd>) {
    if let (Ok(()), Some(&plan)) = (&obj.res, obj.parmbuf.first()) {
        mgr.on_channel_plan(plan);
    }
}

/// 命令码表：请求/响应类命令设为 RequestResponse，五个带回调的命令登记回调
pub fn build_cmd_registry(mgr: &Arc<WifiManager>) -> CmdRegistry<H2cCmd> {
    let mut reg = CmdRegistry::new();
    for &code in H2cCmd::ALL {
        if code.expects_rsp() {
            reg = reg.mode(code, CmdMode::RequestResponse);
        }
    }
    let callbacks: [(H2cCmd, fn(&WifiManager, &CmdObj<H2cCmd>)); 5] = [
        (H2cCmd::JoinBss, joinbss_cmd_callback),
        (H2cCmd::DisConnect, disassoc_cmd_callback),
        (H2cCmd::SiteSurvey, survey_cmd_callback),
        (H2cCmd::SetStaKey, setstakey_cmdrsp_callback),
        (H2cCmd::SetChannelPlan, set_channel_plan_cmd_callback),
    ];
    for (code, cb) in callbacks {
        let mgr = mgr.clone();
        reg = reg.on(code, move |obj: &CmdObj<H2cCmd>| cb(&mgr, obj));
    }
    reg
}

fn survey_event_callback(mgr: &WifiManager, evt: &C2hEvent<'_, C2hEvt>) {
    if let Some(bss) = WlanBssid::parse(evt.payload) {
        mgr.on_survey(bss);
    }
}

fn surveydone_event_callback(mgr: &WifiManager, evt: &C2hEvent<'_, C2hEvt>) {
    if let Some(cnt) = parse_surveydone_evt(evt.payload) {
        mgr.on_survey_done(cnt);
    }
}

fn joinbss_event_callback(mgr: &WifiManager, evt: &C2hEvent<'_, C2hEvt>) {
    if let Some(join) = parse_joinbss_evt(evt.payload) {
        mgr.on_join_evt(join);
    }
}

fn stassoc_event_callback(_mgr: &WifiManager, evt: &C2hEvent<'_, C2hEvt>) {
    if let Some(sta) = parse_stassoc_evt(evt.payload) {
        log::info!(target: "wireless::fdrv", "sta {:02x?} assoc, cam_id {}", sta.macaddr, sta.cam_id);
    }
}

fn stadel_event_callback(mgr: &WifiManager, evt: &C2hEvent<'_, C2hEvt>) {
    if let Some(del) = parse_stadel_evt(evt.payload) {
        mgr.on_sta_del(del.macaddr, del.reason);
    }
}

fn reportpwrstate_event_callback(mgr: &WifiManager, evt: &C2hEvent<'_, C2hEvt>) {
    if let Some(pwr) = parse_reportpwrstate_evt(evt.payload) {
        mgr.on_pwr_state(pwr);
    }
}

fn fwdbg_event_callback(_mgr: &WifiManager, evt: &C2hEvent<'_, C2hEvt>) {
    log::debug!(target: "wireless::fdrv", "fw: {}", String::from_utf8_lossy(evt.payload).trim_end());
}

/// 事件码表：定长事件登记 parmsize，H2cRsp 作为命令响应通道
pub fn build_evt_registry(mgr: &Arc<WifiManager>) -> EvtRegistry<C2hEvt> {
    let mut reg = EvtRegistry::new()
        .cmd_rsp(C2hEvt::H2cRsp)
        .parmsize(C2hEvt::Survey, WLAN_BSSID_LEN)
        .parmsize(C2hEvt::SurveyDone, SURVEYDONE_EVT_LEN)
        .parmsize(C2hEvt::JoinBss, JOINBSS_EVT_LEN)
        .parmsize(C2hEvt::AddSta, STASSOC_EVT_LEN)
        .parmsize(C2hEvt::DelSta, STADEL_EVT_LEN)
        .parmsize(C2hEvt::ReportPwrState, REPORTPWRSTATE_EVT_LEN);
    let handlers: [(C2hEvt, fn(&WifiManager, &C2hEvent<'_, C2hEvt>)); 7] = [
        (C2hEvt::Survey, survey_event_callback),
        (C2hEvt::SurveyDone, surveydone_event_callback),
        (C2hEvt::JoinBss, joinbss_event_callback),
        (C2hEvt::AddSta, stassoc_event_callback),
        (C2hEvt::DelSta, stadel_event_callback),
        (C2hEvt::ReportPwrState, reportpwrstate_event_callback),
        (C2hEvt::FwDbg, fwdbg_event_callback),
    ];
    for (code, handler) in handlers {
        let mgr = mgr.clone();
        reg = reg.on(code, move |evt: &C2hEvent<'_, C2hEvt>| handler(&mgr, evt));
    }
    reg
}
