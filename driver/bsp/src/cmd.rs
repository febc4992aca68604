//! 命令对象与码表抽象
//! 实现：H2C 命令描述符（code + 参数缓冲 + 响应缓冲）、同步/异步模式、码值 trait

use core::fmt::Debug;
use core::time::Duration;
use std::sync::Arc;

use crate::error::{CmdError, CmdResult};
use crate::sync::Completion;

/// H2C 参数缓冲最大长度
pub const MAX_CMDSZ: usize = 1024;
/// H2C 响应最大长度
pub const MAX_RSPSZ: usize = 512;
/// C2H 事件 payload 最大长度（直连路径 scratch 缓冲大小）
pub const MAX_EVTSZ: usize = 1024;
/// 命令对象池默认容量
pub const FREE_CMDOBJ_SZ: usize = 128;
/// 同步命令默认超时 (ms)
pub const CMD_TIMEOUT_MS: u32 = 6000;

/// 稠密码表：从 0 开始的小整数，可直接做下标
///
/// 命令码与事件码各自实现；一般由 [`define_codes!`](crate::define_codes) 生成。
pub trait Code: Copy + Eq + Debug + Send + Sync + 'static {
    /// 码值个数（表长）
    const COUNT: usize;

    fn index(self) -> usize;

    fn from_index(idx: usize) -> Option<Self>;

    #[inline]
    fn raw(self) -> u16 {
        self.index() as u16
    }

    #[inline]
    fn from_raw(raw: u16) -> Option<Self> {
        Self::from_index(raw as usize)
    }
}

/// 生成 `#[repr(u16)]` 码表枚举并实现 [`Code`]，码值按声明顺序从 0 递增
#[macro_export]
macro_rules! define_codes {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u16)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[ $( $name::$variant ),+ ];
        }

        impl $crate::Code for $name {
            const COUNT: usize = $name::ALL.len();

            #[inline]
            fn index(self) -> usize {
                self as usize
            }

            #[inline]
            fn from_index(idx: usize) -> Option<Self> {
                $name::ALL.get(idx).copied()
            }
        }
    };
}

/// 命令的固件协议类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CmdMode {
    /// 发送成功即完成
    #[default]
    FireAndForget,
    /// 发送后等待 H2C 响应，超时视为失败
    RequestResponse,
}

/// 命令对象：一条挂起或执行中的 H2C 请求
///
/// 生命周期：`pool.alloc` → 入队 → cmd_thread 取出执行 → 回调读取 `res`/`rsp`
/// → 由处理层释放回池。回调只借用，不负责释放。
#[derive(Debug)]
pub struct CmdObj<C: Code> {
    pub code: C,
    pub res: CmdResult,
    pub parmbuf: Vec<u8>,
    pub rsp: Vec<u8>,
    /// 发出顺序号（从 1 开始，32 位回绕）
    pub seq: u32,
    pub(crate) timeout: Duration,
    pub(crate) waiter: Option<Arc<Completion<CmdOutcome>>>,
}

impl<C: Code> CmdObj<C> {
    pub(crate) fn new(code: C) -> Self {
        Self {
            code,
            res: Ok(()),
            parmbuf: Vec::new(),
            rsp: Vec::new(),
            seq: 0,
            timeout: Duration::from_millis(CMD_TIMEOUT_MS as u64),
            waiter: None,
        }
    }

    #[inline]
    pub fn cmdsz(&self) -> usize {
        self.parmbuf.len()
    }

    #[inline]
    pub fn rspsz(&self) -> usize {
        self.rsp.len()
    }

    #[inline]
    pub fn is_ok(&self) -> bool {
        self.res.is_ok()
    }
}

/// 调用方可见的完成结果；响应在命令对象释放前复制出来，归调用方所有
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdOutcome {
    pub res: CmdResult,
    pub rsp: Vec<u8>,
}

impl CmdOutcome {
    /// 成功时取响应，失败时返回错误
    pub fn into_rsp(self) -> Result<Vec<u8>, CmdError> {
        self.res.map(|()| self.rsp)
    }
}

/// 命令句柄：池下标 + 代数，释放后即失效
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CmdId {
    pub(crate) index: u32,
    pub(crate) gen: u32,
}

impl CmdId {
    /// 池内槽位下标；释放后同一槽位可能被下一次分配复用
    #[inline]
    pub fn slot(&self) -> usize {
        self.index as usize
    }
}

/// `submit` 返回给调用方的句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CmdHandle {
    pub id: CmdId,
    pub seq: u32,
}
