//! 适配器：命令池、命令/事件队列、码表与工作线程的所有者
//!
//! 生命周期：[`Adapter::new`] 建表、起线程 → 提交命令 / 投递事件 → [`Adapter::teardown`]
//! （或 drop）关闭队列、释放在途等待、排空后回收线程。拆除后池容量必须回到初始值。

use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

use axerrno::{AxError, AxResult};

use crate::c2h::{parse_c2h_frame, C2hEvent};
use crate::cmd::{CmdHandle, CmdOutcome, Code};
use crate::cmd_thread::{cmd_thread, CmdPriv};
use crate::config::{AdapterConfig, EvtPath};
use crate::error::CmdError;
use crate::event::{delivery_for, evt_thread, EvtDelivery, EvtPriv};
use crate::pool::CmdPool;
use crate::registry::{CmdRegistry, EvtKind, EvtRegistry};
use crate::sync::Completion;
use crate::transport::H2cTransport;

/// 工作线程与调用方共享的状态
pub(crate) struct AdapterShared<C: Code, E: Code> {
    pub(crate) config: AdapterConfig,
    pub(crate) pool: CmdPool<C>,
    pub(crate) cmd_priv: CmdPriv<C>,
    pub(crate) evt_priv: EvtPriv<E>,
    pub(crate) cmd_reg: CmdRegistry<C>,
    pub(crate) evt_reg: EvtRegistry<E>,
    pub(crate) transport: Box<dyn H2cTransport>,
    delivery: Box<dyn EvtDelivery<E>>,
    stopping: AtomicBool,
}

impl<C: Code, E: Code> AdapterShared<C, E> {
    #[inline]
    pub(crate) fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    fn submit(
        &self,
        code: C,
        parm: &[u8],
        timeout: Duration,
        waiter: Option<Arc<Completion<CmdOutcome>>>,
    ) -> Result<CmdHandle, CmdError> {
        if self.is_stopping() {
            return Err(CmdError::TeardownInProgress);
        }
        let id = self.pool.alloc(code, parm, timeout, waiter).inspect_err(|e| {
            log::debug!(target: "wireless::bsp::cmd", "h2c code={:?} not queued: {}", code, e);
        })?;
        // 顺序号在队列锁内分配，与出队顺序一致
        let queued = self.cmd_priv.queue.enqueue_with(id, |&id| {
            let seq = self.cmd_priv.next_seq();
            self.pool.set_seq(id, seq);
            seq
        });
        match queued {
            Ok(seq) => Ok(CmdHandle { id, seq }),
            Err(id) => {
                if let Some(obj) = self.pool.take(id) {
                    self.pool.free(id, obj);
                }
                Err(CmdError::TeardownInProgress)
            }
        }
    }

    fn deliver_event(&self, frame: &[u8]) -> Result<(), CmdError> {
        let (hdr, payload) = parse_c2h_frame(frame).inspect_err(|e| {
            log::warn!(target: "wireless::bsp::evt", "drop c2h frame ({} bytes): {}", frame.len(), e);
        })?;
        if self.is_stopping() {
            self.evt_priv.note_drop();
            return Err(CmdError::TeardownInProgress);
        }
        let (code, entry) = self.evt_reg.lookup_raw(hdr.code as u16).inspect_err(|_| {
            log::warn!(target: "wireless::bsp::evt", "c2h unknown event code 0x{:02x}, ignored", hdr.code);
        })?;
        if entry.parmsize != 0 && entry.parmsize != payload.len() {
            log::warn!(
                target: "wireless::bsp::evt",
                "c2h {:?} payload {} bytes, expected {}, dropped",
                code,
                payload.len(),
                entry.parmsize
            );
            return Err(CmdError::ParmSizeMismatch {
                code: hdr.code as u16,
                expected: entry.parmsize,
                got: payload.len(),
            });
        }
        self.evt_priv.check_seq(hdr.seq, self.config.evt_seq_check);

        match &entry.kind {
            EvtKind::CmdRsp => {
                if !self.cmd_priv.rsp.deliver(payload) {
                    log::debug!(target: "wireless::bsp::evt", "stray h2c rsp ({} bytes), no command waiting", payload.len());
                    self.evt_priv.note_drop();
                }
                Ok(())
            }
            EvtKind::Ignore => {
                log::trace!(target: "wireless::bsp::evt", "c2h {:?} has no handler", code);
                Ok(())
            }
            EvtKind::Handler(handler) => {
                let evt = C2hEvent {
                    code,
                    seq: hdr.seq,
                    payload,
                };
                self.delivery.deliver(&self.evt_priv, handler, &evt)
            }
        }
    }
}

/// 诊断快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CmdStats {
    pub cmd_issued: u32,
    pub cmd_done: u32,
    pub cmd_seq: u8,
    pub cmd_queued: usize,
    pub pool_free: usize,
    pub pool_capacity: usize,
    pub event_seq: u8,
    pub evt_done: u32,
    pub evt_dropped: u32,
}

/// 入站 C2H 帧的投递口，只持有弱引用，适配器拆除后投递返回 `TeardownInProgress`。
/// transport 自身归适配器所有时，用它回送帧不会形成引用环。
pub struct C2hSink<C: Code, E: Code> {
    shared: Weak<AdapterShared<C, E>>,
}

impl<C: Code, E: Code> Clone for C2hSink<C, E> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<C: Code, E: Code> C2hSink<C, E> {
    pub fn deliver(&self, frame: &[u8]) -> Result<(), CmdError> {
        let shared = self.shared.upgrade().ok_or(CmdError::TeardownInProgress)?;
        shared.deliver_event(frame)
    }
}

/// 一个无线适配器的命令/事件分发引擎
pub struct Adapter<C: Code, E: Code> {
    shared: Arc<AdapterShared<C, E>>,
    threads: spin::Mutex<Vec<JoinHandle<()>>>,
}

impl<C: Code, E: Code> Adapter<C, E> {
    /// 建立适配器并启动 `rtw_cmd_thread`（延迟路径下另起 `rtw_evt_thread`）
    pub fn new<T>(
        config: AdapterConfig,
        cmd_reg: CmdRegistry<C>,
        evt_reg: EvtRegistry<E>,
        transport: T,
    ) -> AxResult<Self>
    where
        T: H2cTransport + 'static,
    {
        let shared = Arc::new(AdapterShared {
            pool: CmdPool::new(config.cmd_pool_size),
            cmd_priv: CmdPriv::new(),
            evt_priv: EvtPriv::new(),
            cmd_reg,
            evt_reg,
            transport: Box::new(transport),
            delivery: delivery_for(config.evt_path),
            stopping: AtomicBool::new(false),
            config,
        });
        let adapter = Self {
            shared,
            threads: spin::Mutex::new(Vec::new()),
        };

        adapter.spawn("rtw_cmd_thread", cmd_thread::<C, E>)?;
        if adapter.shared.config.evt_path == EvtPath::Deferred {
            // 失败时 adapter 被 drop，已起的 cmd 线程随拆除退出
            adapter.spawn("rtw_evt_thread", evt_thread::<C, E>)?;
        }
        log::info!(
            target: "wireless::bsp",
            "adapter up: pool={} timeout={}ms evt_path={:?}",
            adapter.shared.pool.capacity(),
            adapter.shared.config.cmd_timeout_ms,
            adapter.shared.config.evt_path
        );
        Ok(adapter)
    }

    fn spawn(&self, name: &str, body: fn(&AdapterShared<C, E>)) -> AxResult {
        let shared = self.shared.clone();
        let handle = thread::Builder::new()
            .name(name.into())
            .spawn(move || body(&shared))
            .map_err(|e| {
                log::error!(target: "wireless::bsp", "spawn {} failed: {}", name, e);
                AxError::NoMemory
            })?;
        self.threads.lock().push(handle);
        Ok(())
    }

    #[inline]
    pub fn config(&self) -> &AdapterConfig {
        &self.shared.config
    }

    pub fn evt_path(&self) -> EvtPath {
        self.shared.delivery.path()
    }

    /// 异步提交，使用默认超时；完成通过码表回调通知
    pub fn submit(&self, code: C, parm: &[u8]) -> Result<CmdHandle, CmdError> {
        self.shared
            .submit(code, parm, self.shared.config.cmd_timeout(), None)
    }

    /// 异步提交，指定本条命令的响应超时
    pub fn submit_with_timeout(
        &self,
        code: C,
        parm: &[u8],
        timeout: Duration,
    ) -> Result<CmdHandle, CmdError> {
        self.shared.submit(code, parm, timeout, None)
    }

    /// 提交并阻塞到命令完成，返回结果与复制出的响应。
    ///
    /// 等待上限为 `timeout + wait_slack`（排队时间），超出返回 `Timeout`，此时命令仍可能稍后完成。
    /// 不得在命令回调（cmd_thread）里调用。
    pub fn submit_and_wait(
        &self,
        code: C,
        parm: &[u8],
        timeout: Duration,
    ) -> Result<CmdOutcome, CmdError> {
        let waiter = Arc::new(Completion::new());
        let handle = self
            .shared
            .submit(code, parm, timeout, Some(waiter.clone()))?;
        waiter
            .wait_timeout(timeout.saturating_add(self.shared.config.wait_slack()))
            .ok_or_else(|| {
                log::warn!(
                    target: "wireless::bsp::cmd",
                    "h2c code={:?} seq={} not completed in time",
                    code,
                    handle.seq
                );
                CmdError::Timeout
            })
    }

    /// 入站 C2H 帧：解码、校验、按码分发。可在任意线程调用。
    pub fn deliver_event(&self, frame: &[u8]) -> Result<(), CmdError> {
        self.shared.deliver_event(frame)
    }

    pub fn c2h_sink(&self) -> C2hSink<C, E> {
        C2hSink {
            shared: Arc::downgrade(&self.shared),
        }
    }

    pub fn is_stopping(&self) -> bool {
        self.shared.is_stopping()
    }

    pub fn pool_available(&self) -> usize {
        self.shared.pool.available()
    }

    /// 正在执行的命令（code, seq）
    pub fn current_cmd(&self) -> Option<(C, u32)> {
        self.shared.cmd_priv.current()
    }

    pub fn cmd_thread_running(&self) -> bool {
        self.shared.cmd_priv.is_running()
    }

    pub fn stats(&self) -> CmdStats {
        let s = &self.shared;
        CmdStats {
            cmd_issued: s.cmd_priv.issued(),
            cmd_done: s.cmd_priv.done(),
            cmd_seq: s.cmd_priv.cmd_seq(),
            cmd_queued: s.cmd_priv.queue.len(),
            pool_free: s.pool.available(),
            pool_capacity: s.pool.capacity(),
            event_seq: s.evt_priv.event_seq(),
            evt_done: s.evt_priv.done(),
            evt_dropped: s.evt_priv.dropped(),
        }
    }

    /// 拆除：拒绝新命令、释放在途响应等待、排空两条队列并回收线程。可重复调用。
    pub fn teardown(&self) {
        if self.shared.stopping.swap(true, Ordering::AcqRel) {
            return;
        }
        log::info!(target: "wireless::bsp", "adapter teardown");
        self.shared.cmd_priv.queue.close();
        self.shared.cmd_priv.rsp.abort();
        self.shared.evt_priv.queue.close();

        let handles = core::mem::take(&mut *self.threads.lock());
        let me = thread::current().id();
        for handle in handles {
            if handle.thread().id() == me {
                // 在回调里拆除：本线程返回后自行排空退出
                log::warn!(target: "wireless::bsp", "teardown from {:?}, not joined", handle.thread().name());
                continue;
            }
            if handle.join().is_err() {
                log::error!(target: "wireless::bsp", "worker thread panicked");
            }
        }

        let stats = self.stats();
        if stats.cmd_issued != stats.cmd_done || stats.pool_free != stats.pool_capacity {
            log::warn!(target: "wireless::bsp", "teardown incomplete: {:?}", stats);
        } else {
            log::info!(
                target: "wireless::bsp",
                "adapter down: {} cmds, {} evts ({} dropped)",
                stats.cmd_done,
                stats.evt_done,
                stats.evt_dropped
            );
        }
    }
}

impl<C: Code, E: Code> Drop for Adapter<C, E> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::c2h::{build_c2h_frame, build_h2c_rsp};
    use crate::cmd::{CmdMode, CmdObj};
    use crate::error::CmdResult;
    use crate::transport::NullTransport;
    use parking_lot::{Condvar, Mutex};
    use std::time::Instant;

    crate::define_codes! {
        enum TCmd {
            Join,
            Leave,
            Read,
            Write,
        }
    }

    crate::define_codes! {
        enum TEvt {
            Survey,
            JoinBss,
            Rsp,
        }
    }

    type Sink = C2hSink<TCmd, TEvt>;
    type Done = Arc<Mutex<Vec<(TCmd, u32, CmdResult)>>>;

    /// 记录发送；可关闸阻塞、对指定码失败、对 Read 回送倒序 payload 作为响应
    #[derive(Default)]
    struct Mock {
        sent: Mutex<Vec<(u16, Vec<u8>)>>,
        seqs: Mutex<Vec<u8>>,
        closed: Mutex<bool>,
        gate: Condvar,
        fail: Option<u16>,
        sink: Mutex<Option<Sink>>,
    }

    impl Mock {
        fn gated() -> Arc<Self> {
            Arc::new(Self {
                closed: Mutex::new(true),
                ..Default::default()
            })
        }

        fn open(&self) {
            *self.closed.lock() = false;
            self.gate.notify_all();
        }

        fn sent(&self) -> Vec<(u16, Vec<u8>)> {
            self.sent.lock().clone()
        }
    }

    impl H2cTransport for Mock {
        fn transmit(&self, code: u16, cmd_seq: u8, parm: &[u8]) -> Result<(), i32> {
            let mut closed = self.closed.lock();
            while *closed {
                self.gate.wait(&mut closed);
            }
            drop(closed);
            self.sent.lock().push((code, parm.to_vec()));
            self.seqs.lock().push(cmd_seq);
            if self.fail == Some(code) {
                return Err(-5);
            }
            if code == TCmd::Read.raw() {
                if let Some(sink) = self.sink.lock().as_ref() {
                    let rsp: Vec<u8> = parm.iter().rev().copied().collect();
                    let _ = sink.deliver(&build_c2h_frame(TEvt::Rsp as u8, 0, &build_h2c_rsp(cmd_seq, &rsp)));
                }
            }
            Ok(())
        }
    }

    fn wait_until(mut f: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if f() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        f()
    }

    fn recording_registry(done: &Done) -> CmdRegistry<TCmd> {
        let mut reg = CmdRegistry::new().mode(TCmd::Read, CmdMode::RequestResponse);
        for &code in TCmd::ALL {
            let done = done.clone();
            reg = reg.on(code, move |obj: &CmdObj<TCmd>| {
                done.lock().push((obj.code, obj.seq, obj.res.clone()));
            });
        }
        reg
    }

    fn evt_registry() -> EvtRegistry<TEvt> {
        EvtRegistry::new().cmd_rsp(TEvt::Rsp)
    }

    fn config(pool: usize, timeout_ms: u32) -> AdapterConfig {
        AdapterConfig {
            cmd_pool_size: pool,
            cmd_timeout_ms: timeout_ms,
            wait_slack_ms: 1000,
            ..Default::default()
        }
    }

    #[test]
    fn callbacks_fire_once_each_in_submission_order() {
        let done = Done::default();
        let mock = Arc::new(Mock::default());
        let adapter = Adapter::new(config(8, 1000), recording_registry(&done), evt_registry(), mock.clone()).unwrap();

        let mut seqs = Vec::new();
        for i in 0..40u8 {
            let code = if i % 2 == 0 { TCmd::Join } else { TCmd::Leave };
            loop {
                match adapter.submit(code, &[i]) {
                    Ok(h) => {
                        seqs.push(h.seq);
                        break;
                    }
                    Err(CmdError::ResourceExhausted) => thread::yield_now(),
                    Err(e) => panic!("submit: {e}"),
                }
            }
        }
        assert!(wait_until(|| done.lock().len() == 40));
        let done = done.lock().clone();
        assert_eq!(done.iter().map(|d| d.1).collect::<Vec<_>>(), seqs);
        assert!(seqs.windows(2).all(|w| w[1] == w[0] + 1));
        assert!(done.iter().all(|d| d.2.is_ok()));
        let payloads: Vec<u8> = mock.sent().iter().map(|s| s.1[0]).collect();
        assert_eq!(payloads, (0..40).collect::<Vec<_>>());

        adapter.teardown();
        let stats = adapter.stats();
        assert_eq!(stats.cmd_issued, 40);
        assert_eq!(stats.cmd_done, 40);
        assert_eq!(stats.pool_free, 8);
    }

    #[test]
    fn exhausted_pool_rejects_without_disturbing_pending() {
        let done = Done::default();
        let mock = Mock::gated();
        let adapter = Adapter::new(config(2, 1000), recording_registry(&done), evt_registry(), mock.clone()).unwrap();

        let a = adapter.submit(TCmd::Join, &[1]).unwrap();
        let b = adapter.submit(TCmd::Leave, &[2]).unwrap();
        assert_eq!(adapter.submit(TCmd::Write, &[3]), Err(CmdError::ResourceExhausted));
        assert_eq!(adapter.pool_available(), 0);

        mock.open();
        assert!(wait_until(|| done.lock().len() == 2));
        let done = done.lock().clone();
        assert_eq!(done[0], (TCmd::Join, a.seq, Ok(())));
        assert_eq!(done[1], (TCmd::Leave, b.seq, Ok(())));
        assert!(wait_until(|| adapter.pool_available() == 2));
        assert_eq!(mock.sent().len(), 2);
    }

    #[test]
    fn response_timeout_fails_and_frees_slot() {
        let done = Done::default();
        let mock = Arc::new(Mock::default());
        let adapter = Adapter::new(config(1, 50), recording_registry(&done), evt_registry(), mock.clone()).unwrap();

        let first = adapter.submit(TCmd::Read, &[7]).unwrap();
        let start = Instant::now();
        assert!(wait_until(|| done.lock().len() == 1));
        assert!(start.elapsed() >= Duration::from_millis(45));
        assert_eq!(done.lock()[0].2, Err(CmdError::Timeout));

        assert!(wait_until(|| adapter.pool_available() == 1));
        let next = adapter.submit(TCmd::Join, &[]).unwrap();
        assert_eq!(next.id.slot(), first.id.slot());
        assert_ne!(next.id, first.id);
        assert!(wait_until(|| done.lock().len() == 2));
    }

    #[test]
    fn teardown_fails_pending_and_restores_pool() {
        let done = Done::default();
        let mock = Arc::new(Mock::default());
        let adapter = Adapter::new(config(8, 10_000), recording_registry(&done), evt_registry(), mock.clone()).unwrap();

        for i in 0..5u8 {
            adapter.submit(TCmd::Read, &[i]).unwrap();
        }
        assert!(wait_until(|| adapter.current_cmd().is_some()));
        let start = Instant::now();
        adapter.teardown();
        assert!(start.elapsed() < Duration::from_secs(5));

        let done = done.lock().clone();
        assert_eq!(done.len(), 5);
        assert!(done.iter().all(|d| d.2 == Err(CmdError::TeardownInProgress)));
        assert!(!adapter.cmd_thread_running());
        assert_eq!(adapter.pool_available(), 8);
        assert_eq!(adapter.submit(TCmd::Join, &[]), Err(CmdError::TeardownInProgress));
        // 再次拆除无副作用
        adapter.teardown();
    }

    #[test]
    fn submit_and_wait_copies_out_response() {
        let mock = Arc::new(Mock::default());
        let adapter = Adapter::new(config(4, 1000), CmdRegistry::new().mode(TCmd::Read, CmdMode::RequestResponse), evt_registry(), mock.clone()).unwrap();
        *mock.sink.lock() = Some(adapter.c2h_sink());

        let out = adapter.submit_and_wait(TCmd::Read, &[1, 2, 3], Duration::from_millis(500)).unwrap();
        assert_eq!(out, CmdOutcome { res: Ok(()), rsp: vec![3, 2, 1] });
        let out = adapter.submit_and_wait(TCmd::Write, &[9], Duration::from_millis(500)).unwrap();
        assert_eq!(out.into_rsp(), Ok(Vec::new()));
        assert!(wait_until(|| adapter.pool_available() == 4));
    }

    #[test]
    fn stray_response_is_dropped() {
        let adapter: Adapter<TCmd, TEvt> = Adapter::new(config(4, 1000), CmdRegistry::new(), evt_registry(), Arc::new(Mock::default())).unwrap();
        assert_eq!(adapter.deliver_event(&build_c2h_frame(TEvt::Rsp as u8, 0, &build_h2c_rsp(1, &[1]))), Ok(()));
        assert_eq!(adapter.stats().evt_dropped, 1);
    }

    #[test]
    fn late_response_is_not_handed_to_next_command() {
        let done = Done::default();
        let rsps = Arc::new(Mutex::new(Vec::new()));
        let mut reg = recording_registry(&done);
        let r = rsps.clone();
        let d = done.clone();
        reg = reg.on(TCmd::Read, move |obj: &CmdObj<TCmd>| {
            r.lock().push(obj.rsp.clone());
            d.lock().push((obj.code, obj.seq, obj.res.clone()));
        });
        let mock = Arc::new(Mock::default());
        let adapter = Adapter::new(config(4, 100), reg, evt_registry(), mock.clone()).unwrap();

        let a = adapter.submit(TCmd::Read, &[1]).unwrap();
        assert!(wait_until(|| done.lock().len() == 1));
        assert_eq!(done.lock()[0], (TCmd::Read, a.seq, Err(CmdError::Timeout)));

        let b = adapter.submit_with_timeout(TCmd::Read, &[2], Duration::from_secs(5)).unwrap();
        // 发送时响应槽已挂起
        assert!(wait_until(|| mock.seqs.lock().len() == 2));
        let seqs = mock.seqs.lock().clone();
        assert_eq!(seqs, vec![a.seq as u8, b.seq as u8]);
        // 第一条命令的迟到响应
        let late = build_h2c_rsp(seqs[0], b"answer-for-A");
        assert_eq!(adapter.deliver_event(&build_c2h_frame(TEvt::Rsp as u8, 0, &late)), Ok(()));
        assert_eq!(adapter.stats().evt_dropped, 1);
        let mine = build_h2c_rsp(seqs[1], b"answer-for-B");
        assert_eq!(adapter.deliver_event(&build_c2h_frame(TEvt::Rsp as u8, 1, &mine)), Ok(()));

        assert!(wait_until(|| done.lock().len() == 2));
        assert_eq!(done.lock()[1], (TCmd::Read, b.seq, Ok(())));
        assert_eq!(rsps.lock()[1], b"answer-for-B".to_vec());
    }

    #[test]
    fn unbounded_timeout_keeps_worker_alive() {
        let done = Done::default();
        let mock = Arc::new(Mock::default());
        let adapter = Adapter::new(config(4, 1000), recording_registry(&done), evt_registry(), mock.clone()).unwrap();
        *mock.sink.lock() = Some(adapter.c2h_sink());

        let out = adapter.submit_and_wait(TCmd::Read, &[1, 2], Duration::MAX).unwrap();
        assert_eq!(out.rsp, vec![2, 1]);
        adapter.submit_with_timeout(TCmd::Read, &[3], Duration::MAX).unwrap();
        adapter.submit(TCmd::Write, &[4]).unwrap();
        assert!(wait_until(|| done.lock().len() == 3));
        assert!(done.lock().iter().all(|d| d.2.is_ok()));
        assert!(wait_until(|| adapter.pool_available() == 4));
        assert!(adapter.cmd_thread_running());

        // 无响应时靠拆除结束等待
        *mock.sink.lock() = None;
        adapter.submit_with_timeout(TCmd::Read, &[5], Duration::MAX).unwrap();
        assert!(wait_until(|| adapter.current_cmd().is_some()));
        adapter.teardown();
        assert_eq!(done.lock()[3].2, Err(CmdError::TeardownInProgress));
        assert_eq!(adapter.pool_available(), 4);
        assert!(!adapter.cmd_thread_running());
    }

    #[test]
    fn transport_failure_is_reported_not_retried() {
        let done = Done::default();
        let mock = Arc::new(Mock {
            fail: Some(TCmd::Write.raw()),
            ..Default::default()
        });
        let adapter = Adapter::new(config(4, 1000), recording_registry(&done), evt_registry(), mock.clone()).unwrap();
        adapter.submit(TCmd::Write, &[1]).unwrap();
        adapter.submit(TCmd::Join, &[2]).unwrap();
        assert!(wait_until(|| done.lock().len() == 2));
        assert_eq!(done.lock()[0].2, Err(CmdError::TransportFailure(-5)));
        assert_eq!(done.lock()[1].2, Ok(()));
        assert_eq!(mock.sent().len(), 2);
    }

    #[test]
    fn join_with_network_descriptor() {
        let joins = Arc::new(Mutex::new(Vec::new()));
        let j = joins.clone();
        let reg = CmdRegistry::new().on(TCmd::Join, move |obj: &CmdObj<TCmd>| {
            j.lock().push((obj.cmdsz(), obj.res.clone()));
        });
        let mock = Arc::new(Mock::default());
        let adapter = Adapter::new(config(1, 1000), reg, evt_registry(), mock.clone()).unwrap();

        let desc = [0x5au8; 64];
        let h = adapter.submit(TCmd::Join, &desc).unwrap();
        assert!(wait_until(|| joins.lock().len() == 1));
        assert_eq!(joins.lock()[0], (64, Ok(())));
        assert_eq!(mock.sent()[0], (TCmd::Join.raw(), desc.to_vec()));

        assert!(wait_until(|| adapter.pool_available() == 1));
        let again = adapter.submit(TCmd::Leave, &[]).unwrap();
        assert_eq!(again.id.slot(), h.id.slot());
    }

    fn survey_recorder() -> (EvtRegistry<TEvt>, Arc<Mutex<Vec<(Vec<u8>, Option<String>)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let reg = evt_registry().parmsize(TEvt::JoinBss, 4).on(TEvt::Survey, move |evt: &C2hEvent<'_, TEvt>| {
            s.lock().push((evt.payload.to_vec(), thread::current().name().map(String::from)));
        });
        (reg, seen)
    }

    #[test]
    fn direct_path_runs_handler_in_caller_context() {
        let (reg, seen) = survey_recorder();
        let cfg = AdapterConfig {
            evt_path: EvtPath::Direct,
            ..config(4, 1000)
        };
        let adapter: Adapter<TCmd, TEvt> = Adapter::new(cfg, CmdRegistry::new(), reg, NullTransport).unwrap();
        assert_eq!(adapter.evt_path(), EvtPath::Direct);

        adapter.deliver_event(&build_c2h_frame(TEvt::Survey as u8, 0, b"ssid")).unwrap();
        // 返回时处理函数已执行完
        let seen = seen.lock().clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, b"ssid".to_vec());
        assert_eq!(seen[0].1, thread::current().name().map(String::from));
        assert_eq!(adapter.stats().evt_done, 1);
    }

    #[test]
    fn deferred_path_runs_handler_on_evt_thread() {
        let (reg, seen) = survey_recorder();
        let adapter: Adapter<TCmd, TEvt> = Adapter::new(config(4, 1000), CmdRegistry::new(), reg, NullTransport).unwrap();

        for i in 0..3u8 {
            adapter.deliver_event(&build_c2h_frame(TEvt::Survey as u8, i, &[i])).unwrap();
        }
        assert!(wait_until(|| seen.lock().len() == 3));
        let seen = seen.lock().clone();
        assert_eq!(seen.iter().map(|s| s.0[0]).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(seen.iter().all(|s| s.1.as_deref() == Some("rtw_evt_thread")));
        assert_eq!(adapter.stats().event_seq, 3);
    }

    #[test]
    fn malformed_and_unknown_events_never_reach_handlers() {
        let (reg, seen) = survey_recorder();
        let cfg = AdapterConfig {
            evt_path: EvtPath::Direct,
            ..config(4, 1000)
        };
        let adapter: Adapter<TCmd, TEvt> = Adapter::new(cfg, CmdRegistry::new(), reg, NullTransport).unwrap();

        let mut short = build_c2h_frame(TEvt::Survey as u8, 0, &[0u8; 16]);
        short.truncate(14);
        assert_eq!(
            adapter.deliver_event(&short),
            Err(CmdError::MalformedEvent { declared: 16, available: 10 })
        );
        assert_eq!(
            adapter.deliver_event(&build_c2h_frame(0x40, 0, &[1])),
            Err(CmdError::UnrecognizedCode(0x40))
        );
        let err = adapter
            .deliver_event(&build_c2h_frame(TEvt::JoinBss as u8, 0, &[1, 2]))
            .unwrap_err();
        assert!(matches!(err, CmdError::ParmSizeMismatch { expected: 4, got: 2, .. }));
        assert!(err.to_string().ends_with("expected 4 bytes, got 2"));
        assert!(seen.lock().is_empty());
        assert_eq!(adapter.stats().evt_done, 0);
    }

    #[test]
    fn direct_handler_may_deliver_nested_event() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let nested: Arc<Mutex<Option<Sink>>> = Arc::default();
        let (outer_seen, inner_seen, k) = (seen.clone(), seen.clone(), nested.clone());
        let reg = evt_registry()
            .on(TEvt::Survey, move |evt: &C2hEvent<'_, TEvt>| {
                outer_seen.lock().push(evt.payload.to_vec());
                if let Some(sink) = k.lock().as_ref() {
                    // scratch 缓冲仍被外层占用
                    assert_eq!(sink.deliver(&build_c2h_frame(TEvt::JoinBss as u8, 1, b"nested")), Ok(()));
                }
            })
            .on(TEvt::JoinBss, move |evt: &C2hEvent<'_, TEvt>| {
                inner_seen.lock().push(evt.payload.to_vec());
            });
        let cfg = AdapterConfig {
            evt_path: EvtPath::Direct,
            ..config(4, 1000)
        };
        let adapter: Adapter<TCmd, TEvt> = Adapter::new(cfg, CmdRegistry::new(), reg, NullTransport).unwrap();
        *nested.lock() = Some(adapter.c2h_sink());

        adapter.deliver_event(&build_c2h_frame(TEvt::Survey as u8, 0, b"outer")).unwrap();
        assert_eq!(*seen.lock(), vec![b"outer".to_vec(), b"nested".to_vec()]);
        assert_eq!(adapter.stats().evt_done, 2);
        // 嵌套帧之后 scratch 已释放，下一帧照常
        adapter.deliver_event(&build_c2h_frame(TEvt::JoinBss as u8, 2, b"next")).unwrap();
        assert_eq!(seen.lock().len(), 3);
    }

    #[test]
    fn seq_mismatch_resyncs_and_still_dispatches() {
        let (reg, seen) = survey_recorder();
        let cfg = AdapterConfig {
            evt_path: EvtPath::Direct,
            ..config(4, 1000)
        };
        let adapter: Adapter<TCmd, TEvt> = Adapter::new(cfg, CmdRegistry::new(), reg, NullTransport).unwrap();
        for seq in [0u8, 1, 5, 0x7f] {
            adapter.deliver_event(&build_c2h_frame(TEvt::Survey as u8, seq, &[seq])).unwrap();
        }
        assert_eq!(seen.lock().len(), 4);
        assert_eq!(adapter.stats().event_seq, 0);
    }

    #[test]
    fn events_after_teardown_are_refused() {
        let (reg, seen) = survey_recorder();
        let adapter: Adapter<TCmd, TEvt> = Adapter::new(config(4, 1000), CmdRegistry::new(), reg, NullTransport).unwrap();
        let sink = adapter.c2h_sink();
        adapter.teardown();
        assert_eq!(
            sink.deliver(&build_c2h_frame(TEvt::Survey as u8, 0, &[])),
            Err(CmdError::TeardownInProgress)
        );
        drop(adapter);
        assert_eq!(
            sink.deliver(&build_c2h_frame(TEvt::Survey as u8, 0, &[])),
            Err(CmdError::TeardownInProgress)
        );
        assert!(seen.lock().is_empty());
    }
}
