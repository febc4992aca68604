//! C2H 事件投递
//!
//! 两种策略，适配器创建时按 [`EvtPath`] 选定其一：
//!
//! - **Direct**：在投递方上下文（中断或收包线程）同步调用处理函数。payload 先拷入固定大小的
//!   scratch 缓冲，路径上不分配、不阻塞：scratch 被占用（并发投递或处理函数内重入投递）时改用栈上缓冲，
//!   不自旋等待。处理函数同样不得阻塞：只用自旋锁，不等待命令完成。
//! - **Deferred**：payload 复制进新分配的 [`EvtObj`]，入事件队列，由 `rtw_evt_thread` 按接收顺序处理。
//!
//! 同一路径内事件按接收顺序投递；两条路径之间**不保证顺序**：直连处理的事件可能先于或晚于
//! 更早到达但走延迟队列的事件被观察到。H2C 响应不经过任一策略，直接交给等待中的命令。

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use crate::adapter::AdapterShared;
use crate::c2h::{C2hEvent, C2H_SEQ_MASK};
use crate::cmd::{Code, MAX_EVTSZ};
use crate::config::EvtPath;
use crate::error::CmdError;
use crate::queue::CmdQueue;
use crate::registry::{EvtHandler, EvtKind};

/// 延迟路径上的事件对象
#[derive(Debug, Clone)]
pub struct EvtObj<E: Code> {
    pub code: E,
    pub seq: u8,
    pub parmbuf: Vec<u8>,
}

impl<E: Code> EvtObj<E> {
    #[inline]
    pub fn evtsz(&self) -> usize {
        self.parmbuf.len()
    }

    pub fn as_event(&self) -> C2hEvent<'_, E> {
        C2hEvent {
            code: self.code,
            seq: self.seq,
            payload: &self.parmbuf,
        }
    }
}

/// 事件侧的适配器状态
pub struct EvtPriv<E: Code> {
    pub(crate) queue: CmdQueue<EvtObj<E>>,
    /// 期望的下一事件序号（7 bit 回绕，仅用于诊断）
    event_seq: AtomicU8,
    evt_done_cnt: AtomicU32,
    evt_drop_cnt: AtomicU32,
    evtthd_running: AtomicBool,
    /// 直连路径 payload 暂存
    c2h_mem: spin::Mutex<[u8; MAX_EVTSZ]>,
}

impl<E: Code> EvtPriv<E> {
    pub(crate) fn new() -> Self {
        Self {
            queue: CmdQueue::new(),
            event_seq: AtomicU8::new(0),
            evt_done_cnt: AtomicU32::new(0),
            evt_drop_cnt: AtomicU32::new(0),
            evtthd_running: AtomicBool::new(false),
            c2h_mem: spin::Mutex::new([0; MAX_EVTSZ]),
        }
    }

    /// 比对帧内序号与期望值，不一致时记录并以帧内序号重新同步；不影响分发
    pub(crate) fn check_seq(&self, seq: u8, verify: bool) {
        let expected = self.event_seq.load(Ordering::Relaxed);
        if verify && seq != expected {
            log::warn!(target: "wireless::bsp::evt", "c2h event seq error: got {} expected {}", seq, expected);
        }
        self.event_seq.store(seq.wrapping_add(1) & C2H_SEQ_MASK, Ordering::Relaxed);
    }

    pub(crate) fn note_done(&self) {
        self.evt_done_cnt.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn note_drop(&self) {
        self.evt_drop_cnt.fetch_add(1, Ordering::Relaxed);
    }

    pub fn event_seq(&self) -> u8 {
        self.event_seq.load(Ordering::Relaxed)
    }

    pub fn done(&self) -> u32 {
        self.evt_done_cnt.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u32 {
        self.evt_drop_cnt.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.evtthd_running.load(Ordering::Acquire)
    }
}

/// 事件投递策略
pub trait EvtDelivery<E: Code>: Send + Sync {
    fn path(&self) -> EvtPath;

    fn deliver(
        &self,
        evt_priv: &EvtPriv<E>,
        handler: &EvtHandler<E>,
        evt: &C2hEvent<'_, E>,
    ) -> Result<(), CmdError>;
}

/// 同步调用
pub struct DirectDelivery;

impl<E: Code> EvtDelivery<E> for DirectDelivery {
    fn path(&self) -> EvtPath {
        EvtPath::Direct
    }

    fn deliver(
        &self,
        evt_priv: &EvtPriv<E>,
        handler: &EvtHandler<E>,
        evt: &C2hEvent<'_, E>,
    ) -> Result<(), CmdError> {
        match evt_priv.c2h_mem.try_lock() {
            Some(mut mem) => run_direct(handler, evt, &mut mem[..]),
            None => {
                log::trace!(target: "wireless::bsp::evt", "c2h {:?}: scratch busy, use stack buffer", evt.code);
                let mut mem = [0u8; MAX_EVTSZ];
                run_direct(handler, evt, &mut mem);
            }
        }
        evt_priv.note_done();
        Ok(())
    }
}

fn run_direct<E: Code>(handler: &EvtHandler<E>, evt: &C2hEvent<'_, E>, mem: &mut [u8]) {
    // 帧解码时已限制 len <= MAX_EVTSZ
    let len = evt.payload.len();
    mem[..len].copy_from_slice(evt.payload);
    handler(&C2hEvent {
        code: evt.code,
        seq: evt.seq,
        payload: &mem[..len],
    });
}

/// 入队，由 evt 线程处理
pub struct DeferredDelivery;

impl<E: Code> EvtDelivery<E> for DeferredDelivery {
    fn path(&self) -> EvtPath {
        EvtPath::Deferred
    }

    fn deliver(
        &self,
        evt_priv: &EvtPriv<E>,
        _handler: &EvtHandler<E>,
        evt: &C2hEvent<'_, E>,
    ) -> Result<(), CmdError> {
        let obj = EvtObj {
            code: evt.code,
            seq: evt.seq,
            parmbuf: evt.payload.to_vec(),
        };
        evt_priv.queue.enqueue(obj).map_err(|obj| {
            log::debug!(target: "wireless::bsp::evt", "c2h {:?} dropped: evt queue closed", obj.code);
            evt_priv.note_drop();
            CmdError::TeardownInProgress
        })
    }
}

pub(crate) fn delivery_for<E: Code>(path: EvtPath) -> Box<dyn EvtDelivery<E>> {
    match path {
        EvtPath::Direct => Box::new(DirectDelivery),
        EvtPath::Deferred => Box::new(DeferredDelivery),
    }
}

/// 延迟路径线程：取事件、查表、调用处理函数、释放事件对象。
/// 拆除开始后剩余事件直接丢弃。
pub(crate) fn evt_thread<C: Code, E: Code>(shared: &AdapterShared<C, E>) {
    let evt_priv = &shared.evt_priv;
    evt_priv.evtthd_running.store(true, Ordering::Release);
    log::info!(target: "wireless::bsp::evt", "rtw_evt_thread start");

    while let Some(obj) = evt_priv.queue.wait_dequeue() {
        if shared.is_stopping() {
            evt_priv.note_drop();
            continue;
        }
        if let EvtKind::Handler(handler) = &shared.evt_reg.lookup(obj.code).kind {
            handler(&obj.as_event());
        }
        evt_priv.note_done();
    }

    evt_priv.evtthd_running.store(false, Ordering::Release);
    log::info!(
        target: "wireless::bsp::evt",
        "rtw_evt_thread exit (done={} dropped={})",
        evt_priv.done(),
        evt_priv.dropped()
    );
}
