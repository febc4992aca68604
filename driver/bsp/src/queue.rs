//! CmdQueue — 严格 FIFO 的线程安全队列
//!
//! 命令队列（元素为池句柄 `CmdId`）与延迟路径的事件队列（元素为 `EvtObj`）共用此实现：
//! 多生产者入队，单消费者线程在队空时阻塞（Condvar，等待期间释放锁）。
//! `close()` 之后入队失败，消费者取完剩余元素后得到 None 退出。

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

struct QueueInner<T> {
    items: VecDeque<T>,
    closed: bool,
}

pub struct CmdQueue<T> {
    inner: Mutex<QueueInner<T>>,
    not_empty: Condvar,
}

impl<T> CmdQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                items: VecDeque::new(),
                closed: false,
            }),
            not_empty: Condvar::new(),
        }
    }

    /// 队尾入队；队列已关闭时把元素原样退回
    pub fn enqueue(&self, item: T) -> Result<(), T> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(item);
        }
        inner.items.push_back(item);
        self.not_empty.notify_one();
        Ok(())
    }

    /// 在持锁状态下入队并执行 `f`（用于在同一临界区内分配顺序号，保证顺序号与出队顺序一致）
    pub fn enqueue_with<R>(&self, item: T, f: impl FnOnce(&T) -> R) -> Result<R, T> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(item);
        }
        let r = f(&item);
        inner.items.push_back(item);
        self.not_empty.notify_one();
        Ok(r)
    }

    /// 队首出队，不阻塞
    pub fn dequeue(&self) -> Option<T> {
        self.inner.lock().items.pop_front()
    }

    /// 阻塞直到队列非空或已关闭。关闭后仍先返回剩余元素，取空才返回 None
    pub fn wait_dequeue(&self) -> Option<T> {
        let mut inner = self.inner.lock();
        loop {
            if let Some(item) = inner.items.pop_front() {
                return Some(item);
            }
            if inner.closed {
                return None;
            }
            self.not_empty.wait(&mut inner);
        }
    }

    /// 关闭队列并唤醒消费者
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        self.not_empty.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }
}

impl<T> Default for CmdQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn fifo_order() {
        let q = CmdQueue::new();
        for i in 0..5 {
            q.enqueue(i).unwrap();
        }
        assert_eq!(q.len(), 5);
        let out: Vec<_> = core::iter::from_fn(|| q.dequeue()).collect();
        assert_eq!(out, vec![0, 1, 2, 3, 4]);
        assert!(q.is_empty());
    }

    #[test]
    fn consumer_wakes_on_enqueue() {
        let q = Arc::new(CmdQueue::new());
        let q2 = q.clone();
        let t = thread::spawn(move || q2.wait_dequeue());
        thread::sleep(Duration::from_millis(20));
        q.enqueue(42u32).unwrap();
        assert_eq!(t.join().unwrap(), Some(42));
    }

    #[test]
    fn close_drains_then_ends() {
        let q = CmdQueue::new();
        q.enqueue('a').unwrap();
        q.enqueue('b').unwrap();
        q.close();
        assert_eq!(q.enqueue('c'), Err('c'));
        assert_eq!(q.wait_dequeue(), Some('a'));
        assert_eq!(q.wait_dequeue(), Some('b'));
        assert_eq!(q.wait_dequeue(), None);
    }

    #[test]
    fn close_releases_blocked_consumer() {
        let q: Arc<CmdQueue<u8>> = Arc::new(CmdQueue::new());
        let q2 = q.clone();
        let t = thread::spawn(move || q2.wait_dequeue());
        thread::sleep(Duration::from_millis(20));
        q.close();
        assert_eq!(t.join().unwrap(), None);
    }
}
