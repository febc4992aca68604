//! 适配器配置
//!
//! 默认值取自驱动常量；也可从 ini 风格文本解析（每行 `TAG=value`），
//! 缺失或无法解析的项保持默认值。

use core::time::Duration;

use crate::cmd::{CMD_TIMEOUT_MS, FREE_CMDOBJ_SZ};

/// C2H 事件投递路径，适配器创建时选定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvtPath {
    /// 在投递方上下文（中断/收包线程）同步调用处理函数
    Direct,
    /// 复制 payload 入事件队列，由 evt_thread 处理
    #[default]
    Deferred,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterConfig {
    /// 命令对象池容量
    pub cmd_pool_size: usize,
    /// 同步命令默认响应超时 (ms)
    pub cmd_timeout_ms: u32,
    /// `submit_and_wait` 在响应超时之外为排队额外等待的时间 (ms)
    pub wait_slack_ms: u32,
    pub evt_path: EvtPath,
    /// 是否检查 C2H 事件序号（只做诊断）
    pub evt_seq_check: bool,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            cmd_pool_size: FREE_CMDOBJ_SZ,
            cmd_timeout_ms: CMD_TIMEOUT_MS,
            wait_slack_ms: CMD_TIMEOUT_MS,
            evt_path: EvtPath::Deferred,
            evt_seq_check: true,
        }
    }
}

impl AdapterConfig {
    #[inline]
    pub fn cmd_timeout(&self) -> Duration {
        Duration::from_millis(self.cmd_timeout_ms as u64)
    }

    #[inline]
    pub fn wait_slack(&self) -> Duration {
        Duration::from_millis(self.wait_slack_ms as u64)
    }
}

/// 在 file_data 中查找以 tag_name 开头的行，返回其后的值（不含换行，去掉行尾 '\r' 与空白）
fn find_tag<'a>(file_data: &'a [u8], tag_name: &str) -> Option<&'a [u8]> {
    let tag = tag_name.as_bytes();
    file_data
        .split(|&b| b == b'\n')
        .find_map(|line| line.strip_prefix(tag))
        .map(trim)
}

fn trim(mut s: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = s {
        if !first.is_ascii_whitespace() {
            break;
        }
        s = rest;
    }
    while let [rest @ .., last] = s {
        if !last.is_ascii_whitespace() {
            break;
        }
        s = rest;
    }
    s
}

fn parse_dec(s: &[u8]) -> Option<u32> {
    core::str::from_utf8(s).ok()?.parse().ok()
}

/// 解析配置文本：CMD_POOL_SIZE= / CMD_TIMEOUT_MS= / CMD_WAIT_SLACK_MS= / EVT_PATH= / EVT_SEQ_CHECK=
pub fn parse_configfile(file_data: &[u8]) -> AdapterConfig {
    let mut config = AdapterConfig::default();
    macro_rules! parse_tag {
        ($tag:expr, $field:ident, $conv:expr) => {
            if let Some(v) = find_tag(file_data, $tag) {
                match parse_dec(v).and_then($conv) {
                    Some(x) => config.$field = x,
                    None => log::warn!(target: "wireless::bsp", "config: bad value for {}, keep default", $tag),
                }
            }
        };
    }
    parse_tag!("CMD_POOL_SIZE=", cmd_pool_size, |n: u32| (n > 0).then_some(n as usize));
    parse_tag!("CMD_TIMEOUT_MS=", cmd_timeout_ms, |n: u32| (n > 0).then_some(n));
    parse_tag!("CMD_WAIT_SLACK_MS=", wait_slack_ms, Some);
    parse_tag!("EVT_SEQ_CHECK=", evt_seq_check, |n: u32| Some(n != 0));
    if let Some(v) = find_tag(file_data, "EVT_PATH=") {
        match v.to_ascii_lowercase().as_slice() {
            b"direct" => config.evt_path = EvtPath::Direct,
            b"deferred" => config.evt_path = EvtPath::Deferred,
            _ => log::warn!(target: "wireless::bsp", "config: unknown EVT_PATH, keep default"),
        }
    }
    config
}
