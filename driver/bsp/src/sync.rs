//! 同步原语
//!
//! - **Completion**（parking_lot Mutex + Condvar）：一次性完成信号，带值；
//!   等待方用 `wait_timeout` 阻塞直到 `complete` 或超时，与 complete()/wait_for_completion_timeout() 语义一致。
//!   值与通知放在同一把锁下，notify 不会丢失。
//! - **deadline_after**：超时换算为截止时间，超大超时按上限截断，不会溢出。

use core::fmt;
use core::time::Duration;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

/// 单次等待的上限；调用方给出更长的超时按此截断
pub const MAX_WAIT: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// `now + dur`，溢出或超过 [`MAX_WAIT`] 时取 `now + MAX_WAIT`
pub fn deadline_after(dur: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(dur.min(MAX_WAIT))
        .or_else(|| now.checked_add(MAX_WAIT))
        .unwrap_or(now)
}

/// 一次性完成信号
pub struct Completion<T> {
    slot: Mutex<Option<T>>,
    cond: Condvar,
}

impl<T> Completion<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            cond: Condvar::new(),
        }
    }

    /// 写入结果并唤醒所有等待方；已完成时返回 false（保留第一次的值）
    pub fn complete(&self, value: T) -> bool {
        let mut slot = self.slot.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(value);
        self.cond.notify_all();
        true
    }

    pub fn is_done(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// 阻塞等待，最多 `dur`；超时返回 None。虚假唤醒时按截止时间继续等待
    pub fn wait_timeout(&self, dur: Duration) -> Option<T> {
        let deadline = deadline_after(dur);
        let mut slot = self.slot.lock();
        while slot.is_none() {
            if self.cond.wait_until(&mut slot, deadline).timed_out() {
                break;
            }
        }
        slot.take()
    }
}

impl<T> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion").field("done", &self.is_done()).finish()
    }
}

impl<T> Default for Completion<T> {
    fn default() -> Self {
        Self::new()
    }
}
