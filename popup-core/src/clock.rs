//! # Clock 模块
//!
//! 帧时钟：协作式调度的唯一节拍来源。
//!
//! 宿主每帧调用一次 [`FrameClock::tick`]，所有挂起在 [`FrameClock::next_frame`]
//! 上的动画任务被唤醒，拿到本帧的时间增量。宿主退出时调用
//! [`FrameClock::stop`]，挂起的任务随即以 `None` 返回（相当于“应用已停止运行”）。

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::cancel::CancelToken;

struct ClockInner {
    /// 已经过的帧数
    frame: Cell<u64>,
    /// 最近一帧的时间增量（秒）
    delta: Cell<f32>,
    /// 应用是否仍在运行
    running: Cell<bool>,
    /// 等待下一帧的任务
    wakers: RefCell<Vec<Waker>>,
}

/// 帧时钟（克隆后共享同一时间轴）
#[derive(Clone)]
pub struct FrameClock {
    inner: Rc<ClockInner>,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FrameClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameClock")
            .field("frame", &self.inner.frame.get())
            .field("running", &self.inner.running.get())
            .field("waiting", &self.inner.wakers.borrow().len())
            .finish()
    }
}

impl FrameClock {
    /// 创建新的帧时钟
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ClockInner {
                frame: Cell::new(0),
                delta: Cell::new(0.0),
                running: Cell::new(true),
                wakers: RefCell::new(Vec::new()),
            }),
        }
    }

    /// 推进一帧并唤醒所有等待者
    pub fn tick(&self, dt: f32) {
        self.inner.frame.set(self.inner.frame.get() + 1);
        self.inner.delta.set(dt.max(0.0));
        self.wake_all();
    }

    /// 停止时钟（应用退出）
    pub fn stop(&self) {
        self.inner.running.set(false);
        self.wake_all();
    }

    /// 应用是否仍在运行
    pub fn is_running(&self) -> bool {
        self.inner.running.get()
    }

    /// 当前帧号
    pub fn frame(&self) -> u64 {
        self.inner.frame.get()
    }

    /// 最近一帧的时间增量
    pub fn delta(&self) -> f32 {
        self.inner.delta.get()
    }

    /// 等待下一帧，返回该帧的时间增量；时钟停止时返回 `None`
    pub fn next_frame(&self) -> NextFrame {
        NextFrame {
            clock: self.clone(),
            target: self.frame() + 1,
        }
    }

    fn wake_all(&self) {
        let wakers = std::mem::take(&mut *self.inner.wakers.borrow_mut());
        for waker in wakers {
            waker.wake();
        }
    }
}

/// [`FrameClock::next_frame`] 返回的 future
#[derive(Debug)]
pub struct NextFrame {
    clock: FrameClock,
    target: u64,
}

impl Future for NextFrame {
    type Output = Option<f32>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if !self.clock.is_running() {
            return Poll::Ready(None);
        }
        if self.clock.frame() >= self.target {
            return Poll::Ready(Some(self.clock.delta()));
        }
        self.clock.inner.wakers.borrow_mut().push(cx.waker().clone());
        Poll::Pending
    }
}

/// 动画循环的帧上下文：帧时钟 + 取消令牌
///
/// 每次从挂起中恢复时同时检查取消信号和应用运行状态。
#[derive(Debug, Clone)]
pub struct FrameContext {
    clock: FrameClock,
    token: CancelToken,
}

impl FrameContext {
    pub fn new(clock: FrameClock, token: CancelToken) -> Self {
        Self { clock, token }
    }

    /// 既未取消、应用也仍在运行
    pub fn is_live(&self) -> bool {
        !self.token.is_cancelled() && self.clock.is_running()
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    /// 挂起到下一帧；被取消或应用停止时返回 `None`
    pub async fn next_frame(&self) -> Option<f32> {
        if !self.is_live() {
            return None;
        }
        let dt = self.clock.next_frame().await?;
        self.is_live().then_some(dt)
    }
}
