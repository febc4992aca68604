//! H2C 参数构建与 C2H payload 解析
//!
//! 所有布局均为小端、紧凑排列（无填充）。构建函数返回定长数组或 Vec，直接作为 `parmbuf` 提交；
//! 解析函数长度不足时返回 None。

/// 网络描述（BSS）定长编码长度
pub const WLAN_BSSID_LEN: usize = 64;
/// SSID 最大长度
pub const SSID_MAX_LEN: usize = 32;
pub const ETH_ALEN: usize = 6;
/// 密钥材料最大长度（WEP104 / TKIP / CCMP 的 TK）
pub const KEY_MAX_LEN: usize = 16;
/// sitesurvey_parm.bsslimit 取值范围
pub const BSSLIMIT_MAX: u32 = 48;

pub const DISCONNECT_PARM_LEN: usize = 4;
pub const SITESURVEY_PARM_LEN: usize = 8 + 4 + SSID_MAX_LEN;
pub const SETAUTH_PARM_LEN: usize = 4;
pub const SETKEY_PARM_LEN: usize = 4 + KEY_MAX_LEN;
pub const SET_STAKEY_PARM_LEN: usize = ETH_ALEN + 2 + KEY_MAX_LEN;
pub const SET_STAKEY_RSP_LEN: usize = ETH_ALEN + 2;
pub const SET_ASSOCSTA_RSP_LEN: usize = 4;
pub const SETSTAPWRSTATE_PARM_LEN: usize = 2 + ETH_ALEN;
pub const SURVEYDONE_EVT_LEN: usize = 4;
pub const JOINBSS_EVT_LEN: usize = 4 + WLAN_BSSID_LEN;
pub const STADEL_EVT_LEN: usize = ETH_ALEN + 2;
pub const STASSOC_EVT_LEN: usize = ETH_ALEN + 2 + 4;
pub const REPORTPWRSTATE_EVT_LEN: usize = 4;

/// 加密算法（setkey / set_stakey 的 algorithm 字段）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DotAlgorithm {
    NoPrivacy = 0,
    Wep40 = 1,
    Tkip = 2,
    TkipWtmic = 3,
    Aes = 4,
    Wep104 = 5,
}

impl DotAlgorithm {
    /// 该算法的密钥长度
    pub fn key_len(self) -> usize {
        match self {
            DotAlgorithm::NoPrivacy => 0,
            DotAlgorithm::Wep40 => 5,
            DotAlgorithm::Wep104 => 13,
            DotAlgorithm::Tkip | DotAlgorithm::TkipWtmic | DotAlgorithm::Aes => 16,
        }
    }
}

/// 认证模式（setauth_parm.mode）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AuthMode {
    Open = 0,
    Shared = 1,
    Ieee8021x = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NetworkType {
    Infra = 0,
    AdHoc = 1,
}

/// 网络描述：JoinBss 参数、Survey / JoinBss 事件共用
///
/// ```text
/// 0      6        7          39       40     41       42        44          46        47..64
/// bssid  ssid_len ssid[32]   channel  rssi   privacy  bcn_intv  capability  net_type  rsvd
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WlanBssid {
    pub bssid: [u8; ETH_ALEN],
    pub ssid: Vec<u8>,
    pub channel: u8,
    pub rssi: i8,
    pub privacy: bool,
    pub beacon_interval: u16,
    pub capability: u16,
    pub network_type: NetworkType,
}

impl WlanBssid {
    pub fn new(bssid: [u8; ETH_ALEN], ssid: &[u8], channel: u8) -> Self {
        Self {
            bssid,
            ssid: ssid[..ssid.len().min(SSID_MAX_LEN)].to_vec(),
            channel,
            rssi: 0,
            privacy: false,
            beacon_interval: 100,
            capability: 0x0001,
            network_type: NetworkType::Infra,
        }
    }

    pub fn to_bytes(&self) -> [u8; WLAN_BSSID_LEN] {
        let mut b = [0u8; WLAN_BSSID_LEN];
        let ssid_len = self.ssid.len().min(SSID_MAX_LEN);
        b[0..6].copy_from_slice(&self.bssid);
        b[6] = ssid_len as u8;
        b[7..7 + ssid_len].copy_from_slice(&self.ssid[..ssid_len]);
        b[39] = self.channel;
        b[40] = self.rssi as u8;
        b[41] = self.privacy as u8;
        b[42..44].copy_from_slice(&self.beacon_interval.to_le_bytes());
        b[44..46].copy_from_slice(&self.capability.to_le_bytes());
        b[46] = self.network_type as u8;
        b
    }

    pub fn parse(param: &[u8]) -> Option<Self> {
        if param.len() < WLAN_BSSID_LEN {
            return None;
        }
        let ssid_len = (param[6] as usize).min(SSID_MAX_LEN);
        Some(Self {
            bssid: param[0..6].try_into().ok()?,
            ssid: param[7..7 + ssid_len].to_vec(),
            channel: param[39],
            rssi: param[40] as i8,
            privacy: param[41] != 0,
            beacon_interval: u16::from_le_bytes([param[42], param[43]]),
            capability: u16::from_le_bytes([param[44], param[45]]),
            network_type: if param[46] == 1 { NetworkType::AdHoc } else { NetworkType::Infra },
        })
    }
}

/// joinbss_parm：网络描述本身
pub fn build_joinbss_parm(network: &WlanBssid) -> [u8; WLAN_BSSID_LEN] {
    network.to_bytes()
}

/// disconnect_parm：rsvd(u32)
pub fn build_disconnect_parm() -> [u8; DISCONNECT_PARM_LEN] {
    [0; DISCONNECT_PARM_LEN]
}

/// sitesurvey_parm：scan_mode(i32), bsslimit(i32), ssid{len(u32), ssid[32]}；
/// bsslimit 限制在 1..=48
pub fn build_sitesurvey_parm(active: bool, bsslimit: u32, ssid: Option<&[u8]>) -> [u8; SITESURVEY_PARM_LEN] {
    let mut p = [0u8; SITESURVEY_PARM_LEN];
    p[0..4].copy_from_slice(&(active as u32).to_le_bytes());
    p[4..8].copy_from_slice(&bsslimit.clamp(1, BSSLIMIT_MAX).to_le_bytes());
    if let Some(ssid) = ssid {
        let len = ssid.len().min(SSID_MAX_LEN);
        p[8..12].copy_from_slice(&(len as u32).to_le_bytes());
        p[12..12 + len].copy_from_slice(&ssid[..len]);
    }
    p
}

/// setauth_parm：mode, _1x (0: PSK, 1: TLS), rsvd[2]
pub fn build_setauth_parm(mode: AuthMode, tls: bool) -> [u8; SETAUTH_PARM_LEN] {
    [mode as u8, tls as u8, 0, 0]
}

fn copy_key(dst: &mut [u8], key: &[u8]) -> Option<()> {
    if key.len() > KEY_MAX_LEN {
        return None;
    }
    dst[..key.len()].copy_from_slice(key);
    Some(())
}

/// setkey_parm：algorithm, keyid, grpkey, set_tx, key[16]；key 超过 16 字节返回 None
pub fn build_setkey_parm(
    algorithm: DotAlgorithm,
    keyid: u8,
    grpkey: bool,
    set_tx: bool,
    key: &[u8],
) -> Option<[u8; SETKEY_PARM_LEN]> {
    let mut p = [0u8; SETKEY_PARM_LEN];
    p[0] = algorithm as u8;
    p[1] = keyid;
    p[2] = grpkey as u8;
    p[3] = set_tx as u8;
    copy_key(&mut p[4..], key)?;
    Some(p)
}

/// set_stakey_parm：addr[6], algorithm, id, key[16]
pub fn build_set_stakey_parm(
    addr: &[u8; ETH_ALEN],
    algorithm: DotAlgorithm,
    id: u8,
    key: &[u8],
) -> Option<[u8; SET_STAKEY_PARM_LEN]> {
    let mut p = [0u8; SET_STAKEY_PARM_LEN];
    p[0..6].copy_from_slice(addr);
    p[6] = algorithm as u8;
    p[7] = id;
    copy_key(&mut p[8..], key)?;
    Some(p)
}

/// set_stakey_rsp：addr[6], keyid, rsvd
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetStaKeyRsp {
    pub addr: [u8; ETH_ALEN],
    pub keyid: u8,
}

pub fn parse_set_stakey_rsp(param: &[u8]) -> Option<SetStaKeyRsp> {
    if param.len() < SET_STAKEY_RSP_LEN {
        return None;
    }
    Some(SetStaKeyRsp {
        addr: param[0..6].try_into().ok()?,
        keyid: param[6],
    })
}

/// set_assocsta_parm：addr[6]
pub fn build_set_assocsta_parm(addr: &[u8; ETH_ALEN]) -> [u8; ETH_ALEN] {
    *addr
}

/// set_assocsta_rsp：cam_id, rsvd[3]
pub fn parse_set_assocsta_rsp(param: &[u8]) -> Option<u8> {
    if param.len() < SET_ASSOCSTA_RSP_LEN {
        return None;
    }
    Some(param[0])
}

/// setstapwrstate_parm：staid, status, hwaddr[6]
pub fn build_setstapwrstate_parm(staid: u8, status: u8, hwaddr: &[u8; ETH_ALEN]) -> [u8; SETSTAPWRSTATE_PARM_LEN] {
    let mut p = [0u8; SETSTAPWRSTATE_PARM_LEN];
    p[0] = staid;
    p[1] = status;
    p[2..8].copy_from_slice(hwaddr);
    p
}

pub fn build_set_channel_plan_parm(channel_plan: u8) -> [u8; 1] {
    [channel_plan]
}

pub fn build_set_channel_switch_parm(new_ch_no: u8, count: u8) -> [u8; 2] {
    [new_ch_no, count]
}

// ========== C2H 事件 ==========

/// surveydone_event：bss_cnt(u32)
pub fn parse_surveydone_evt(param: &[u8]) -> Option<u32> {
    Some(u32::from_le_bytes(param.get(..4)?.try_into().ok()?))
}

/// joinbss_event：join_res(i32, >0 为 AID，<=0 失败) + 网络描述
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinBssEvt {
    pub join_res: i32,
    pub network: WlanBssid,
}

pub fn parse_joinbss_evt(param: &[u8]) -> Option<JoinBssEvt> {
    if param.len() < JOINBSS_EVT_LEN {
        return None;
    }
    Some(JoinBssEvt {
        join_res: i32::from_le_bytes(param[0..4].try_into().ok()?),
        network: WlanBssid::parse(&param[4..])?,
    })
}

pub fn build_joinbss_evt(join_res: i32, network: &WlanBssid) -> [u8; JOINBSS_EVT_LEN] {
    let mut p = [0u8; JOINBSS_EVT_LEN];
    p[0..4].copy_from_slice(&join_res.to_le_bytes());
    p[4..].copy_from_slice(&network.to_bytes());
    p
}

/// stassoc_event：macaddr[6], rsvd[2], cam_id(i32)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaAssocEvt {
    pub macaddr: [u8; ETH_ALEN],
    pub cam_id: i32,
}

pub fn parse_stassoc_evt(param: &[u8]) -> Option<StaAssocEvt> {
    if param.len() < STASSOC_EVT_LEN {
        return None;
    }
    Some(StaAssocEvt {
        macaddr: param[0..6].try_into().ok()?,
        cam_id: i32::from_le_bytes(param[8..12].try_into().ok()?),
    })
}

/// stadel_event：macaddr[6], reason(u16)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaDelEvt {
    pub macaddr: [u8; ETH_ALEN],
    pub reason: u16,
}

pub fn parse_stadel_evt(param: &[u8]) -> Option<StaDelEvt> {
    if param.len() < STADEL_EVT_LEN {
        return None;
    }
    Some(StaDelEvt {
        macaddr: param[0..6].try_into().ok()?,
        reason: u16::from_le_bytes([param[6], param[7]]),
    })
}

/// reportpwrstate：mode, state, rsvd(u16)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportPwrState {
    pub mode: u8,
    pub state: u8,
}

pub fn parse_reportpwrstate_evt(param: &[u8]) -> Option<ReportPwrState> {
    if param.len() < REPORTPWRSTATE_EVT_LEN {
        return None;
    }
    Some(ReportPwrState {
        mode: param[0],
        state: param[1],
    })
}
