//! # Operation 模块
//!
//! 可取消的异步操作单元。
//!
//! 创建即开始：工作被投递到协作式执行器上，调用方拿到一个句柄，
//! 可以注册完成回调、取消，或者 `await` 它的最终状态。
//! 工作内部的错误和 panic 都在任务根部被捕获并记录，绝不会传回调用方。

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use futures::channel::oneshot;
use futures::executor::LocalSpawner;
use futures::future::{FutureExt, Shared};
use futures::task::LocalSpawnExt;
use tracing::{debug, error};

use crate::cancel::{CancelSource, CancelToken};
use crate::error::PopupResult;

/// 操作状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    /// 正在执行
    Running,
    /// 正常完成
    Completed,
    /// 被取消
    Cancelled,
    /// 执行失败（错误或 panic，已记录）
    Failed,
}

impl OperationStatus {
    /// 是否已结束
    pub fn is_finished(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

type Callback = Box<dyn FnOnce()>;

struct OperationShared {
    source: CancelSource,
    status: Cell<OperationStatus>,
    callback: RefCell<Option<Callback>>,
    done: Shared<oneshot::Receiver<OperationStatus>>,
}

impl OperationShared {
    /// 任务结束时调用一次
    fn finish(&self, status: OperationStatus, notify: oneshot::Sender<OperationStatus>) {
        // cancel() 可能已经抢先把状态改成 Cancelled
        let status = if self.status.get() == OperationStatus::Cancelled {
            OperationStatus::Cancelled
        } else {
            status
        };
        self.status.set(status);

        if status == OperationStatus::Completed {
            let callback = self.callback.borrow_mut().take();
            if let Some(callback) = callback {
                callback();
            }
        }
        let _ = notify.send(status);
    }
}

/// 可取消的异步操作句柄
///
/// 克隆得到的是同一个操作的另一个句柄，取消源仍然只有一份。
#[derive(Clone)]
pub struct Operation {
    shared: Rc<OperationShared>,
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("status", &self.shared.status.get())
            .finish()
    }
}

impl Operation {
    /// 投递并立即开始一个操作
    ///
    /// # 参数
    /// - `spawner`: 协作式执行器
    /// - `source`: 外部提供的取消源，为 `None` 时自行创建
    /// - `work`: 以取消令牌为参数的异步工作
    pub fn spawn<F, Fut>(spawner: &LocalSpawner, source: Option<CancelSource>, work: F) -> Self
    where
        F: FnOnce(CancelToken) -> Fut,
        Fut: Future<Output = PopupResult<()>> + 'static,
    {
        let source = source.unwrap_or_default();
        let token = source.token();
        let (notify, done) = oneshot::channel();

        let shared = Rc::new(OperationShared {
            source,
            status: Cell::new(OperationStatus::Running),
            callback: RefCell::new(None),
            done: done.shared(),
        });

        // 同步部分（弹窗前置、生命周期事件）同样不能把 panic 抛给调用方
        let work = match panic::catch_unwind(AssertUnwindSafe(|| work(token.clone()))) {
            Ok(work) => work,
            Err(panic) => {
                error!(panic = panic_message(&*panic), "操作同步部分发生 panic");
                shared.source.cancel();
                shared.status.set(OperationStatus::Failed);
                return Self { shared };
            }
        };

        let task_shared = Rc::clone(&shared);
        let task = async move {
            let status = match AssertUnwindSafe(work).catch_unwind().await {
                Ok(Ok(())) if token.is_cancelled() => OperationStatus::Cancelled,
                Ok(Ok(())) => OperationStatus::Completed,
                Ok(Err(e)) => {
                    error!(error = %e, "操作执行失败");
                    OperationStatus::Failed
                }
                Err(panic) => {
                    error!(panic = panic_message(&*panic), "操作执行时发生 panic");
                    OperationStatus::Failed
                }
            };
            task_shared.finish(status, notify);
        };

        if let Err(e) = spawner.spawn_local(task) {
            error!(error = %e, "操作投递失败，执行器已关闭");
            shared.status.set(OperationStatus::Failed);
        }

        Self { shared }
    }

    /// 注册完成回调
    ///
    /// 只保留最后一次注册的回调；操作被取消或失败时不会调用。
    /// 若操作已经正常完成，回调立即执行。
    pub fn on_complete(self, callback: impl FnOnce() + 'static) -> Self {
        if self.shared.status.get() == OperationStatus::Completed {
            callback();
        } else {
            *self.shared.callback.borrow_mut() = Some(Box::new(callback));
        }
        self
    }

    /// 取消操作
    ///
    /// 工作会在下一个挂起点观察到取消并尽快返回，完成回调不会被调用。
    pub fn cancel(&self) {
        if self.shared.status.get() != OperationStatus::Running {
            return;
        }
        debug!("取消操作");
        self.shared.source.cancel();
        self.shared.status.set(OperationStatus::Cancelled);
        self.shared.callback.borrow_mut().take();
    }

    /// 当前状态
    pub fn status(&self) -> OperationStatus {
        self.shared.status.get()
    }

    /// 是否已结束（完成、取消或失败）
    pub fn is_finished(&self) -> bool {
        self.status().is_finished()
    }

    /// 是否已请求取消
    pub fn is_cancelled(&self) -> bool {
        self.shared.source.is_cancelled()
    }

    /// 本操作的取消令牌
    pub fn token(&self) -> CancelToken {
        self.shared.source.token()
    }

    /// 等待任务真正结束，返回最终状态
    pub fn finished(&self) -> impl Future<Output = OperationStatus> + 'static {
        let status = self.shared.status.get();
        self.shared
            .done
            .clone()
            .map(move |result| result.unwrap_or(status))
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "<unknown>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{FrameClock, FrameContext};
    use crate::error::PopupError;
    use futures::executor::LocalPool;

    #[test]
    fn test_completes_and_runs_callback() {
        let mut pool = LocalPool::new();
        let hits = Rc::new(Cell::new(0));

        let counter = Rc::clone(&hits);
        let op = Operation::spawn(&pool.spawner(), None, |_| async { Ok(()) })
            .on_complete(move || counter.set(counter.get() + 1));
        assert_eq!(op.status(), OperationStatus::Running);

        pool.run_until_stalled();
        assert_eq!(op.status(), OperationStatus::Completed);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_last_callback_wins() {
        let mut pool = LocalPool::new();
        let first = Rc::new(Cell::new(false));
        let second = Rc::new(Cell::new(false));

        let (a, b) = (Rc::clone(&first), Rc::clone(&second));
        let _op = Operation::spawn(&pool.spawner(), None, |_| async { Ok(()) })
            .on_complete(move || a.set(true))
            .on_complete(move || b.set(true));

        pool.run_until_stalled();
        assert!(!first.get());
        assert!(second.get());
    }

    #[test]
    fn test_cancel_skips_callback() {
        let mut pool = LocalPool::new();
        let clock = FrameClock::new();
        let hits = Rc::new(Cell::new(0));

        let frames = clock.clone();
        let counter = Rc::clone(&hits);
        let op = Operation::spawn(&pool.spawner(), None, move |token| async move {
            let ctx = FrameContext::new(frames, token);
            while ctx.next_frame().await.is_some() {}
            Ok(())
        })
        .on_complete(move || counter.set(counter.get() + 1));

        pool.run_until_stalled();
        op.cancel();
        clock.tick(0.1);
        pool.run_until_stalled();

        assert_eq!(op.status(), OperationStatus::Cancelled);
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn test_external_source() {
        let mut pool = LocalPool::new();
        let source = CancelSource::new();
        let token = source.token();

        let op = Operation::spawn(&pool.spawner(), Some(source), |_| async { Ok(()) });
        op.cancel();
        assert!(token.is_cancelled());

        pool.run_until_stalled();
        assert_eq!(op.status(), OperationStatus::Cancelled);
    }

    #[test]
    fn test_errors_and_panics_are_contained() {
        let mut pool = LocalPool::new();

        let failed = Operation::spawn(&pool.spawner(), None, |_| async {
            Err(PopupError::NotInitialized {
                popup: "menu".to_string(),
            })
        });
        let panicked = Operation::spawn(&pool.spawner(), None, |_| async {
            let explode = true;
            if explode {
                panic!("boom");
            }
            Ok(())
        });

        pool.run_until_stalled();
        assert_eq!(failed.status(), OperationStatus::Failed);
        assert_eq!(panicked.status(), OperationStatus::Failed);
    }

    #[test]
    fn test_synchronous_panic_is_contained() {
        let mut pool = LocalPool::new();
        let hit = Rc::new(Cell::new(false));

        let flag = Rc::clone(&hit);
        let op = Operation::spawn(&pool.spawner(), None, |_| {
            let explode = true;
            if explode {
                panic!("boom");
            }
            async { Ok(()) }
        })
        .on_complete(move || flag.set(true));

        assert_eq!(op.status(), OperationStatus::Failed);
        assert!(op.is_cancelled());
        assert_eq!(pool.run_until(op.finished()), OperationStatus::Failed);
        assert!(!hit.get());
    }

    #[test]
    fn test_callback_after_completion_runs_immediately() {
        let mut pool = LocalPool::new();
        let op = Operation::spawn(&pool.spawner(), None, |_| async { Ok(()) });
        pool.run_until_stalled();

        let hit = Rc::new(Cell::new(false));
        let flag = Rc::clone(&hit);
        let _op = op.on_complete(move || flag.set(true));
        assert!(hit.get());
    }

    #[test]
    fn test_finished_future() {
        let mut pool = LocalPool::new();
        let op = Operation::spawn(&pool.spawner(), None, |_| async { Ok(()) });
        let status = pool.run_until(op.finished());
        assert_eq!(status, OperationStatus::Completed);
    }
}
