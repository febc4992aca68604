//! 回调登记表
//!
//! 命令码 → (协议模式, 完成回调)，事件码 → (parmsize, 处理方式)。
//! 表长等于码表长度，按码值直接下标；适配器创建时构建一次，之后只读，无需加锁。

use std::sync::Arc;

use crate::c2h::C2hEvent;
use crate::cmd::{CmdMode, CmdObj, Code};
use crate::error::CmdError;

/// 命令完成回调：在 cmd_thread 上调用，可读取 `res` 与 `rsp`，不得保留对象
pub type CmdCallback<C> = Arc<dyn Fn(&CmdObj<C>) + Send + Sync>;

/// 事件处理回调：直连路径下在投递方上下文同步调用，不允许阻塞（不得持睡眠锁、不得等待命令完成）
pub type EvtHandler<E> = Arc<dyn Fn(&C2hEvent<'_, E>) + Send + Sync>;

pub struct CmdEntry<C: Code> {
    pub mode: CmdMode,
    pub callback: Option<CmdCallback<C>>,
}

impl<C: Code> Clone for CmdEntry<C> {
    fn clone(&self) -> Self {
        Self {
            mode: self.mode,
            callback: self.callback.clone(),
        }
    }
}

/// 命令码表
pub struct CmdRegistry<C: Code> {
    table: Box<[CmdEntry<C>]>,
}

impl<C: Code> CmdRegistry<C> {
    /// 每个码一项：FireAndForget、无回调
    pub fn new() -> Self {
        let table = (0..C::COUNT)
            .map(|_| CmdEntry {
                mode: CmdMode::FireAndForget,
                callback: None,
            })
            .collect();
        Self { table }
    }

    pub fn mode(mut self, code: C, mode: CmdMode) -> Self {
        self.table[code.index()].mode = mode;
        self
    }

    pub fn on<F>(mut self, code: C, f: F) -> Self
    where
        F: Fn(&CmdObj<C>) + Send + Sync + 'static,
    {
        self.table[code.index()].callback = Some(Arc::new(f));
        self
    }

    #[inline]
    pub fn lookup(&self, code: C) -> &CmdEntry<C> {
        &self.table[code.index()]
    }

    /// 原始码值查表；越界返回 `UnrecognizedCode`
    pub fn lookup_raw(&self, raw: u16) -> Result<(C, &CmdEntry<C>), CmdError> {
        let code = C::from_raw(raw).ok_or(CmdError::UnrecognizedCode(raw))?;
        Ok((code, &self.table[code.index()]))
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl<C: Code> Default for CmdRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// 事件的处理方式
pub enum EvtKind<E: Code> {
    /// 登记但无处理函数：解码后丢弃
    Ignore,
    Handler(EvtHandler<E>),
    /// H2C 响应：payload 交给当前等待响应的命令
    CmdRsp,
}

pub struct EvtEntry<E: Code> {
    /// 期望的 payload 长度，0 表示不定长
    pub parmsize: usize,
    pub kind: EvtKind<E>,
}

/// 事件码表
pub struct EvtRegistry<E: Code> {
    table: Box<[EvtEntry<E>]>,
}

impl<E: Code> EvtRegistry<E> {
    pub fn new() -> Self {
        let table = (0..E::COUNT)
            .map(|_| EvtEntry {
                parmsize: 0,
                kind: EvtKind::Ignore,
            })
            .collect();
        Self { table }
    }

    pub fn parmsize(mut self, code: E, size: usize) -> Self {
        self.table[code.index()].parmsize = size;
        self
    }

    pub fn on<F>(mut self, code: E, f: F) -> Self
    where
        F: Fn(&C2hEvent<'_, E>) + Send + Sync + 'static,
    {
        self.table[code.index()].kind = EvtKind::Handler(Arc::new(f));
        self
    }

    /// 把该事件码标记为 H2C 响应通道
    pub fn cmd_rsp(mut self, code: E) -> Self {
        self.table[code.index()].kind = EvtKind::CmdRsp;
        self
    }

    #[inline]
    pub fn lookup(&self, code: E) -> &EvtEntry<E> {
        &self.table[code.index()]
    }

    pub fn lookup_raw(&self, raw: u16) -> Result<(E, &EvtEntry<E>), CmdError> {
        let code = E::from_raw(raw).ok_or(CmdError::UnrecognizedCode(raw))?;
        Ok((code, &self.table[code.index()]))
    }
}

impl<E: Code> Default for EvtRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}
