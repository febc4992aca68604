//! 命令处理线程
//!
//! 每个适配器一个 `rtw_cmd_thread`：
//!
//! ```text
//! Idle → WaitForCommand → Transmitting → (AwaitResponse | Done) → Idle
//! ```
//!
//! - 队空时在 CmdQueue 上阻塞，不轮询。
//! - RequestResponse 模式的命令在发送**前**挂起响应槽，响应即使在 transmit 返回前到达也不会丢。
//! - 响应等待有超时；超时、发送失败、拆除都以错误结果调用回调，命令对象照常释放。
//! - 拆除：队列关闭后剩余命令逐条以 `TeardownInProgress` 完成，然后线程退出。

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use core::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::adapter::AdapterShared;
use crate::c2h::parse_h2c_rsp;
use crate::cmd::{CmdId, CmdMode, CmdObj, CmdOutcome, Code, MAX_RSPSZ};
use crate::error::{CmdError, CmdResult};
use crate::queue::CmdQueue;
use crate::sync::deadline_after;

#[derive(Debug)]
enum RspState {
    Idle,
    /// 当前命令（cmd_seq）在等响应
    Armed(u8),
    Arrived(Vec<u8>),
    /// 拆除信号，粘滞
    Aborted,
}

/// 响应等待结果；拆除与响应是两种不同的唤醒原因
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum RspWait {
    Rsp(Vec<u8>),
    TimedOut,
    Aborted,
}

/// H2C 响应槽：同一时刻只有一条命令在执行，故只需一个槽。
/// 响应按回显的 cmd_seq 认领，迟到的旧响应不会交给后一条命令。
pub(crate) struct RspSlot {
    state: Mutex<RspState>,
    cond: Condvar,
}

impl RspSlot {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(RspState::Idle),
            cond: Condvar::new(),
        }
    }

    /// 为即将发送的命令挂起响应槽；已拆除时返回 false
    pub(crate) fn arm(&self, cmd_seq: u8) -> bool {
        let mut state = self.state.lock();
        match *state {
            RspState::Aborted => false,
            _ => {
                *state = RspState::Armed(cmd_seq);
                true
            }
        }
    }

    pub(crate) fn disarm(&self) {
        let mut state = self.state.lock();
        if !matches!(*state, RspState::Aborted) {
            *state = RspState::Idle;
        }
    }

    /// 投递响应 payload（含回显头）。没有命令在等，或 cmd_seq 与在等的命令不符
    /// （迟到或多余的响应）时返回 false
    pub(crate) fn deliver(&self, payload: &[u8]) -> bool {
        let Some((cmd_seq, data)) = parse_h2c_rsp(payload) else {
            log::warn!(target: "wireless::bsp::cmd", "h2c rsp too short ({} bytes)", payload.len());
            return false;
        };
        let mut state = self.state.lock();
        match *state {
            RspState::Armed(expected) if expected == cmd_seq => {
                *state = RspState::Arrived(data.to_vec());
                self.cond.notify_all();
                true
            }
            RspState::Armed(expected) => {
                log::warn!(
                    target: "wireless::bsp::cmd",
                    "h2c rsp for cmd_seq {} while waiting for {}, dropped",
                    cmd_seq,
                    expected
                );
                false
            }
            _ => false,
        }
    }

    pub(crate) fn abort(&self) {
        *self.state.lock() = RspState::Aborted;
        self.cond.notify_all();
    }

    pub(crate) fn wait(&self, timeout: Duration) -> RspWait {
        let deadline = deadline_after(timeout);
        let mut state = self.state.lock();
        loop {
            if let Some(r) = Self::take_ready(&mut state) {
                return r;
            }
            if self.cond.wait_until(&mut state, deadline).timed_out() {
                return Self::take_ready(&mut state).unwrap_or_else(|| {
                    *state = RspState::Idle;
                    RspWait::TimedOut
                });
            }
        }
    }

    fn take_ready(state: &mut RspState) -> Option<RspWait> {
        match core::mem::replace(state, RspState::Idle) {
            RspState::Arrived(rsp) => Some(RspWait::Rsp(rsp)),
            RspState::Aborted => {
                *state = RspState::Aborted;
                Some(RspWait::Aborted)
            }
            other => {
                *state = other;
                None
            }
        }
    }
}

/// 命令侧的适配器状态
pub struct CmdPriv<C: Code> {
    pub(crate) queue: CmdQueue<CmdId>,
    pub(crate) rsp: RspSlot,
    /// 正在执行的命令（code, seq）
    current: spin::Mutex<Option<(C, u32)>>,
    cmdthd_running: AtomicBool,
    cmd_issued_cnt: AtomicU32,
    cmd_done_cnt: AtomicU32,
}

impl<C: Code> CmdPriv<C> {
    pub(crate) fn new() -> Self {
        Self {
            queue: CmdQueue::new(),
            rsp: RspSlot::new(),
            current: spin::Mutex::new(None),
            cmdthd_running: AtomicBool::new(false),
            cmd_issued_cnt: AtomicU32::new(0),
            cmd_done_cnt: AtomicU32::new(0),
        }
    }

    /// 入队成功时调用（在队列锁内），返回本条命令的发出顺序号
    pub(crate) fn next_seq(&self) -> u32 {
        self.cmd_issued_cnt.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    pub fn current(&self) -> Option<(C, u32)> {
        *self.current.lock()
    }

    pub fn is_running(&self) -> bool {
        self.cmdthd_running.load(Ordering::Acquire)
    }

    pub fn issued(&self) -> u32 {
        self.cmd_issued_cnt.load(Ordering::Relaxed)
    }

    pub fn done(&self) -> u32 {
        self.cmd_done_cnt.load(Ordering::Relaxed)
    }

    /// 8 位命令序号（最近一次发出）
    pub fn cmd_seq(&self) -> u8 {
        self.issued() as u8
    }
}

/// 线程主循环
pub(crate) fn cmd_thread<C: Code, E: Code>(shared: &AdapterShared<C, E>) {
    let cmd_priv = &shared.cmd_priv;
    cmd_priv.cmdthd_running.store(true, Ordering::Release);
    log::info!(target: "wireless::bsp::cmd", "rtw_cmd_thread start");

    while let Some(id) = cmd_priv.queue.wait_dequeue() {
        let Some(mut obj) = shared.pool.take(id) else {
            continue;
        };
        if shared.is_stopping() {
            obj.res = Err(CmdError::TeardownInProgress);
        } else {
            *cmd_priv.current.lock() = Some((obj.code, obj.seq));
            obj.res = execute(shared, &mut obj);
            *cmd_priv.current.lock() = None;
        }
        complete(shared, id, obj);
    }

    cmd_priv.cmdthd_running.store(false, Ordering::Release);
    log::info!(
        target: "wireless::bsp::cmd",
        "rtw_cmd_thread exit (issued={} done={})",
        cmd_priv.issued(),
        cmd_priv.done()
    );
}

/// Transmitting → (AwaitResponse | Done)
fn execute<C: Code, E: Code>(shared: &AdapterShared<C, E>, obj: &mut CmdObj<C>) -> CmdResult {
    let rsp = &shared.cmd_priv.rsp;
    let sync = shared.cmd_reg.lookup(obj.code).mode == CmdMode::RequestResponse;
    let cmd_seq = obj.seq as u8;
    if sync && !rsp.arm(cmd_seq) {
        return Err(CmdError::TeardownInProgress);
    }

    log::debug!(
        target: "wireless::bsp::cmd",
        "h2c tx code={:?} seq={} cmd_seq={} len={}",
        obj.code,
        obj.seq,
        cmd_seq,
        obj.cmdsz()
    );
    if let Err(e) = shared.transport.transmit(obj.code.raw(), cmd_seq, &obj.parmbuf) {
        if sync {
            rsp.disarm();
        }
        log::warn!(target: "wireless::bsp::cmd", "h2c tx code={:?} seq={} failed err={}", obj.code, obj.seq, e);
        return Err(CmdError::TransportFailure(e));
    }
    if !sync {
        return Ok(());
    }

    match rsp.wait(obj.timeout) {
        RspWait::Rsp(data) => {
            if data.len() > MAX_RSPSZ {
                log::warn!(
                    target: "wireless::bsp::cmd",
                    "h2c rsp code={:?} len={} truncated to {}",
                    obj.code,
                    data.len(),
                    MAX_RSPSZ
                );
            }
            obj.rsp.clear();
            obj.rsp.extend_from_slice(&data[..data.len().min(MAX_RSPSZ)]);
            Ok(())
        }
        RspWait::TimedOut => {
            log::warn!(
                target: "wireless::bsp::cmd",
                "h2c code={:?} seq={} timeout {}ms (no rsp)",
                obj.code,
                obj.seq,
                obj.timeout.as_millis()
            );
            Err(CmdError::Timeout)
        }
        RspWait::Aborted => Err(CmdError::TeardownInProgress),
    }
}

/// 回调 → 把结果复制给等待方 → 释放回池；回调从不释放对象
fn complete<C: Code, E: Code>(shared: &AdapterShared<C, E>, id: CmdId, mut obj: CmdObj<C>) {
    if let Some(cb) = &shared.cmd_reg.lookup(obj.code).callback {
        cb(&obj);
    }
    if let Some(waiter) = obj.waiter.take() {
        waiter.complete(CmdOutcome {
            res: obj.res.clone(),
            rsp: obj.rsp.clone(),
        });
    }
    if let Err(e) = &obj.res {
        log::debug!(target: "wireless::bsp::cmd", "h2c code={:?} seq={} done: {}", obj.code, obj.seq, e);
    }
    shared.cmd_priv.cmd_done_cnt.fetch_add(1, Ordering::Relaxed);
    shared.pool.free(id, obj);
}
