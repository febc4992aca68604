//! 命令对象池
//!
//! 固定容量的 slab：槽位以整数下标寻址，空闲链用 "next free index" 串起，分配/释放均为 O(1)。
//! 每个槽位的参数/响应缓冲在释放后保留容量，下一次分配直接复用。
//!
//! 槽位状态任一时刻只处于 {Free, Pending, InFlight} 之一；句柄带代数，释放后代数加一，
//! 旧句柄无法再访问该槽位。

use core::time::Duration;
use std::sync::Arc;

use crate::cmd::{CmdId, CmdObj, CmdOutcome, Code, MAX_CMDSZ};
use crate::error::CmdError;
use crate::sync::Completion;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Free { next: Option<u32> },
    /// 已分配、在命令队列中
    Pending,
    /// 已被 cmd_thread 取出
    InFlight,
}

struct Slot<C: Code> {
    gen: u32,
    state: SlotState,
    obj: Option<CmdObj<C>>,
    parm_spare: Vec<u8>,
    rsp_spare: Vec<u8>,
}

struct PoolInner<C: Code> {
    slots: Vec<Slot<C>>,
    free_head: Option<u32>,
    free_cnt: usize,
}

/// 命令对象池（单把 spin 锁保护空闲链）
pub struct CmdPool<C: Code> {
    inner: spin::Mutex<PoolInner<C>>,
    capacity: usize,
}

impl<C: Code> CmdPool<C> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let slots = (0..capacity)
            .map(|i| Slot {
                gen: 0,
                state: SlotState::Free {
                    next: if i + 1 < capacity { Some((i + 1) as u32) } else { None },
                },
                obj: None,
                parm_spare: Vec::new(),
                rsp_spare: Vec::new(),
            })
            .collect();
        Self {
            inner: spin::Mutex::new(PoolInner {
                slots,
                free_head: Some(0),
                free_cnt: capacity,
            }),
            capacity,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 当前空闲槽位数
    pub fn available(&self) -> usize {
        self.inner.lock().free_cnt
    }

    /// 取一个空闲槽位并以 code/参数初始化；池空时返回 `ResourceExhausted`
    pub fn alloc(
        &self,
        code: C,
        parm: &[u8],
        timeout: Duration,
        waiter: Option<Arc<Completion<CmdOutcome>>>,
    ) -> Result<CmdId, CmdError> {
        if parm.len() > MAX_CMDSZ {
            return Err(CmdError::ParmTooLarge(parm.len()));
        }
        let mut inner = self.inner.lock();
        let index = inner.free_head.ok_or(CmdError::ResourceExhausted)?;
        let slot = &mut inner.slots[index as usize];
        let next = match slot.state {
            SlotState::Free { next } => next,
            state => {
                // 空闲链损坏
                debug_assert!(false, "cmd pool: slot {} on free list in state {:?}", index, state);
                log::error!(target: "wireless::bsp::cmd", "cmd pool: slot {} on free list in state {:?}", index, state);
                return Err(CmdError::ResourceExhausted);
            }
        };
        let mut obj = CmdObj::new(code);
        obj.parmbuf = core::mem::take(&mut slot.parm_spare);
        obj.parmbuf.extend_from_slice(parm);
        obj.rsp = core::mem::take(&mut slot.rsp_spare);
        obj.timeout = timeout;
        obj.waiter = waiter;
        slot.obj = Some(obj);
        slot.state = SlotState::Pending;
        let id = CmdId { index, gen: slot.gen };
        inner.free_head = next;
        inner.free_cnt -= 1;
        Ok(id)
    }

    /// 给 Pending 状态的命令写入发出顺序号
    pub(crate) fn set_seq(&self, id: CmdId, seq: u32) {
        let mut inner = self.inner.lock();
        if let Some(slot) = inner.slots.get_mut(id.index as usize) {
            if slot.gen == id.gen {
                if let Some(obj) = slot.obj.as_mut() {
                    obj.seq = seq;
                }
            }
        }
    }

    /// Pending → InFlight，把命令对象移交给 cmd_thread；旧句柄或状态不符返回 None
    pub fn take(&self, id: CmdId) -> Option<CmdObj<C>> {
        let mut inner = self.inner.lock();
        let slot = inner.slots.get_mut(id.index as usize)?;
        if slot.gen != id.gen || slot.state != SlotState::Pending {
            debug_assert!(false, "cmd pool: take of stale/invalid handle {:?}", id);
            log::warn!(target: "wireless::bsp::cmd", "cmd pool: take of stale handle {:?} (state {:?})", id, slot.state);
            return None;
        }
        slot.state = SlotState::InFlight;
        slot.obj.take()
    }

    /// InFlight → Free，回收缓冲并使句柄失效
    pub fn free(&self, id: CmdId, mut obj: CmdObj<C>) {
        let mut inner = self.inner.lock();
        let head = inner.free_head;
        let Some(slot) = inner.slots.get_mut(id.index as usize) else {
            debug_assert!(false, "cmd pool: free of out-of-range handle {:?}", id);
            return;
        };
        if slot.gen != id.gen || slot.state != SlotState::InFlight {
            // 重复释放或使用已释放句柄
            debug_assert!(false, "cmd pool: double free of {:?} (state {:?})", id, slot.state);
            log::error!(target: "wireless::bsp::cmd", "cmd pool: double free of {:?} (state {:?})", id, slot.state);
            return;
        }
        obj.parmbuf.clear();
        obj.rsp.clear();
        slot.parm_spare = core::mem::take(&mut obj.parmbuf);
        slot.rsp_spare = core::mem::take(&mut obj.rsp);
        slot.gen = slot.gen.wrapping_add(1);
        slot.state = SlotState::Free { next: head };
        inner.free_head = Some(id.index);
        inner.free_cnt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::define_codes! {
        enum PoolCmd {
            A,
            B,
        }
    }

    const T: Duration = Duration::from_millis(10);

    #[test]
    fn alloc_until_exhausted() {
        let pool: CmdPool<PoolCmd> = CmdPool::new(2);
        let a = pool.alloc(PoolCmd::A, &[1], T, None).unwrap();
        let b = pool.alloc(PoolCmd::B, &[2], T, None).unwrap();
        assert_ne!(a.slot(), b.slot());
        assert_eq!(pool.available(), 0);
        assert_eq!(pool.alloc(PoolCmd::A, &[], T, None), Err(CmdError::ResourceExhausted));

        // 已挂起的命令不受影响
        let obj = pool.take(b).unwrap();
        assert_eq!(obj.code, PoolCmd::B);
        assert_eq!(obj.parmbuf, vec![2]);
        pool.free(b, obj);
        let obj = pool.take(a).unwrap();
        assert_eq!(obj.parmbuf, vec![1]);
        pool.free(a, obj);
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn freed_slot_is_reused_with_new_generation() {
        let pool: CmdPool<PoolCmd> = CmdPool::new(1);
        let a = pool.alloc(PoolCmd::A, &[0xaa; 64], T, None).unwrap();
        let obj = pool.take(a).unwrap();
        pool.free(a, obj);

        let b = pool.alloc(PoolCmd::B, &[0xbb; 4], T, None).unwrap();
        assert_eq!(a.slot(), b.slot());
        assert_ne!(a, b);
        let obj = pool.take(b).unwrap();
        assert_eq!(obj.parmbuf, vec![0xbb; 4]);
        assert!(obj.parmbuf.capacity() >= 64);
        pool.free(b, obj);
    }

    #[test]
    fn oversized_parm_rejected() {
        let pool: CmdPool<PoolCmd> = CmdPool::new(1);
        let big = vec![0u8; MAX_CMDSZ + 1];
        assert_eq!(
            pool.alloc(PoolCmd::A, &big, T, None),
            Err(CmdError::ParmTooLarge(MAX_CMDSZ + 1))
        );
        assert_eq!(pool.available(), 1);
    }

    #[test]
    #[should_panic]
    fn stale_take_asserts_in_debug() {
        let pool: CmdPool<PoolCmd> = CmdPool::new(1);
        let a = pool.alloc(PoolCmd::A, &[], T, None).unwrap();
        let obj = pool.take(a).unwrap();
        pool.free(a, obj);
        let _ = pool.take(a);
    }
}
