//! # Cancel 模块
//!
//! 协作式取消。
//!
//! - [`CancelSource`]：唯一持有者，负责发出取消；不可克隆
//! - [`CancelToken`]：只读视图，可以任意克隆并传给动画循环
//!
//! 子 source 与父 token 链接：父级取消时，所有后代 token 一并视为已取消。
//! 弹窗的深层子弹窗正是通过这条链共享同一个取消作用域。

use std::cell::Cell;
use std::rc::Rc;

#[derive(Debug, Default)]
struct CancelNode {
    cancelled: Cell<bool>,
    parent: Option<Rc<CancelNode>>,
}

impl CancelNode {
    fn is_cancelled(&self) -> bool {
        if self.cancelled.get() {
            return true;
        }
        let mut parent = self.parent.as_deref();
        while let Some(node) = parent {
            if node.cancelled.get() {
                return true;
            }
            parent = node.parent.as_deref();
        }
        false
    }
}

/// 取消令牌（只读）
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    node: Rc<CancelNode>,
}

impl CancelToken {
    /// 永远不会被取消的令牌
    pub fn never() -> Self {
        Self::default()
    }

    /// 自身或任一祖先是否已取消
    pub fn is_cancelled(&self) -> bool {
        self.node.is_cancelled()
    }
}

/// 取消源
///
/// 每个源只属于一个组件（一个 `Operation` 或一个弹窗），不会在互不相关的操作间共享。
#[derive(Debug, Default)]
pub struct CancelSource {
    node: Rc<CancelNode>,
}

impl CancelSource {
    /// 创建独立的取消源
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建挂在 `parent` 之下的取消源
    pub fn child_of(parent: &CancelToken) -> Self {
        Self {
            node: Rc::new(CancelNode {
                cancelled: Cell::new(false),
                parent: Some(Rc::clone(&parent.node)),
            }),
        }
    }

    /// 获取只读令牌
    pub fn token(&self) -> CancelToken {
        CancelToken {
            node: Rc::clone(&self.node),
        }
    }

    /// 发出取消
    pub fn cancel(&self) {
        self.node.cancelled.set(true);
    }

    /// 自身或任一祖先是否已取消
    pub fn is_cancelled(&self) -> bool {
        self.node.is_cancelled()
    }
}
