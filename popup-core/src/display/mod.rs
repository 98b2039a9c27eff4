//! # Display 模块
//!
//! 显示方式：弹窗显示/隐藏时“怎么动”。
//!
//! ## 核心概念
//!
//! - [`DisplayStrategy`]: 显示方式（淡入淡出、缩放、滑动……），无状态，由注册表按类型缓存唯一实例
//! - [`DisplaySettings`]: 每种显示方式对应的设置（时长、缓动曲线、结束回调及专有字段）
//! - [`DisplayBinding`]: 显示方式 + 设置的组合，弹窗用它缓存默认的显示/隐藏方式
//! - [`Tween`]: 单次动画的时间轴
//!
//! 所有显示方式共用同一个循环：记录起点、确定终点，每帧按 `elapsed / duration`
//! 查缓动表，不截断地插值并写回节点，然后挂起到下一帧。正常结束时强制写入精确终点，
//! 同步交互/射线标记并触发结束回调；被取消时停在中间状态，不触发回调。

mod fade;
mod scale;
mod slide;

use std::any::{Any, type_name};
use std::fmt;
use std::rc::Rc;

use futures::future::{self, FutureExt, LocalBoxFuture};

use crate::clock::FrameContext;
use crate::easing::Easing;
use crate::error::{PopupError, PopupResult};
use crate::widget::Widget;

pub use fade::{Fade, FadeSettings};
pub use scale::{Scale, ScaleSettings};
pub use slide::{Slide, SlideDirection, SlideSettings};

/// 一次过渡的结束方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// 播放完毕，已落到终点
    Completed,
    /// 被取消或应用已停止，停在中间状态
    Cancelled,
}

/// 显示方式的返回值
pub type TransitionResult = PopupResult<TransitionOutcome>;

/// 动画结束回调
#[derive(Clone)]
pub struct AnimationCallback(Rc<dyn Fn()>);

impl AnimationCallback {
    pub fn new(callback: impl Fn() + 'static) -> Self {
        Self(Rc::new(callback))
    }

    pub fn invoke(&self) {
        (self.0)()
    }
}

impl fmt::Debug for AnimationCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AnimationCallback")
    }
}

/// 显示方式设置的公共部分
pub trait DisplaySettings: Clone + Default + fmt::Debug + 'static {
    /// 动画时长（秒）
    fn duration(&self) -> f32;

    /// 缓动曲线
    fn easing(&self) -> Easing;

    /// 动画结束回调
    fn on_animation_end(&self) -> Option<&AnimationCallback>;
}

/// 显示方式
///
/// 实现必须是无状态的：注册表为每种类型只缓存一个实例，供所有弹窗共用，
/// 一次调用的全部状态都只存在于返回的 future 里。
pub trait DisplayStrategy: Default + 'static {
    /// 对应的设置类型
    type Settings: DisplaySettings;

    /// 显示方式名称（日志用）
    const NAME: &'static str;

    /// 显示过渡
    fn show(
        &self,
        widget: Rc<dyn Widget>,
        settings: Self::Settings,
        ctx: FrameContext,
    ) -> LocalBoxFuture<'static, TransitionResult>;

    /// 隐藏过渡
    fn hide(
        &self,
        widget: Rc<dyn Widget>,
        settings: Self::Settings,
        ctx: FrameContext,
    ) -> LocalBoxFuture<'static, TransitionResult>;

    /// 不播放动画，直接落到显示/隐藏的终点状态（不触发回调）
    fn settle(&self, widget: &dyn Widget, settings: &Self::Settings, visible: bool)
    -> PopupResult<()>;
}

/// 类型擦除后的显示方式
///
/// 设置以 `&dyn Any` 传入，类型不符时返回 [`PopupError::SettingsMismatch`]。
pub trait AnyDisplay {
    fn name(&self) -> &'static str;

    fn show_any(
        &self,
        widget: Rc<dyn Widget>,
        settings: &dyn Any,
        ctx: FrameContext,
    ) -> LocalBoxFuture<'static, TransitionResult>;

    fn hide_any(
        &self,
        widget: Rc<dyn Widget>,
        settings: &dyn Any,
        ctx: FrameContext,
    ) -> LocalBoxFuture<'static, TransitionResult>;

    fn settle_any(&self, widget: &dyn Widget, settings: &dyn Any, visible: bool) -> PopupResult<()>;
}

fn downcast<T: DisplayStrategy>(settings: &dyn Any) -> PopupResult<&T::Settings> {
    settings
        .downcast_ref::<T::Settings>()
        .ok_or_else(|| PopupError::SettingsMismatch {
            display: T::NAME,
            expected: type_name::<T::Settings>(),
        })
}

impl<T: DisplayStrategy> AnyDisplay for T {
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn show_any(
        &self,
        widget: Rc<dyn Widget>,
        settings: &dyn Any,
        ctx: FrameContext,
    ) -> LocalBoxFuture<'static, TransitionResult> {
        match downcast::<T>(settings) {
            Ok(settings) => self.show(widget, settings.clone(), ctx),
            Err(e) => future::ready(Err(e)).boxed_local(),
        }
    }

    fn hide_any(
        &self,
        widget: Rc<dyn Widget>,
        settings: &dyn Any,
        ctx: FrameContext,
    ) -> LocalBoxFuture<'static, TransitionResult> {
        match downcast::<T>(settings) {
            Ok(settings) => self.hide(widget, settings.clone(), ctx),
            Err(e) => future::ready(Err(e)).boxed_local(),
        }
    }

    fn settle_any(&self, widget: &dyn Widget, settings: &dyn Any, visible: bool) -> PopupResult<()> {
        self.settle(widget, downcast::<T>(settings)?, visible)
    }
}

/// 显示方式 + 设置
///
/// 弹窗缓存的“默认显示/隐藏方式”，也是单次调用覆盖缓存时传入的参数。
#[derive(Clone)]
pub struct DisplayBinding {
    display: Rc<dyn AnyDisplay>,
    settings: Rc<dyn Any>,
}

impl fmt::Debug for DisplayBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplayBinding")
            .field("display", &self.display.name())
            .finish()
    }
}

impl DisplayBinding {
    /// 类型安全地组合显示方式与设置
    pub fn new<T: DisplayStrategy>(display: Rc<T>, settings: T::Settings) -> Self {
        Self {
            display: display as Rc<dyn AnyDisplay>,
            settings: Rc::new(settings),
        }
    }

    /// 由已擦除类型的部件组合（设置类型在运行时校验）
    pub fn from_parts(display: Rc<dyn AnyDisplay>, settings: Rc<dyn Any>) -> Self {
        Self { display, settings }
    }

    /// 显示方式名称
    pub fn display_name(&self) -> &'static str {
        self.display.name()
    }

    /// 以具体类型读取设置
    pub fn settings<S: 'static>(&self) -> Option<&S> {
        self.settings.downcast_ref::<S>()
    }

    /// 两个绑定是否共享同一份设置
    pub fn shares_settings(&self, other: &DisplayBinding) -> bool {
        Rc::ptr_eq(&self.settings, &other.settings)
    }

    pub(crate) fn run(
        &self,
        widget: Rc<dyn Widget>,
        visible: bool,
        ctx: FrameContext,
    ) -> LocalBoxFuture<'static, TransitionResult> {
        if visible {
            self.display.show_any(widget, self.settings.as_ref(), ctx)
        } else {
            self.display.hide_any(widget, self.settings.as_ref(), ctx)
        }
    }

    pub(crate) fn settle(&self, widget: &dyn Widget, visible: bool) -> PopupResult<()> {
        self.display
            .settle_any(widget, self.settings.as_ref(), visible)
    }
}

/// 动画状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TweenState {
    /// 正在播放
    Playing,
    /// 已完成
    Completed,
}

/// 单次动画的时间轴
///
/// 只关心进度，不关心具体插值的是透明度、缩放还是位置。
#[derive(Debug, Clone)]
pub struct Tween {
    /// 动画时长（秒）
    duration: f32,
    /// 缓动曲线
    easing: Easing,
    /// 已经过的时间
    elapsed: f32,
    state: TweenState,
}

impl Tween {
    /// 创建新的时间轴（时长不大于 0 时直接完成）
    pub fn new(duration: f32, easing: Easing) -> Self {
        let state = if duration > 0.0 {
            TweenState::Playing
        } else {
            TweenState::Completed
        };
        Self {
            duration: duration.max(0.0),
            easing,
            elapsed: 0.0,
            state,
        }
    }

    /// 推进时间
    ///
    /// # 返回
    /// - `true`: 动画仍在进行中
    /// - `false`: 动画已结束
    pub fn advance(&mut self, dt: f32) -> bool {
        if self.state == TweenState::Completed {
            return false;
        }
        self.elapsed += dt;
        if self.elapsed >= self.duration {
            self.state = TweenState::Completed;
            false
        } else {
            true
        }
    }

    /// 当前线性进度
    pub fn progress(&self) -> f32 {
        if self.duration <= 0.0 {
            1.0
        } else {
            self.elapsed / self.duration
        }
    }

    /// 当前缓动后的进度（可能越过 [0, 1]）
    pub fn eased(&self) -> f32 {
        self.easing.evaluate(self.progress())
    }

    pub fn is_finished(&self) -> bool {
        self.state == TweenState::Completed
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }
}

/// 逐帧播放时间轴，每帧把缓动后的进度交给 `apply`
async fn play(
    ctx: &FrameContext,
    duration: f32,
    easing: Easing,
    mut apply: impl FnMut(f32),
) -> TransitionOutcome {
    let mut tween = Tween::new(duration, easing);
    while !tween.is_finished() {
        if !ctx.is_live() {
            return TransitionOutcome::Cancelled;
        }
        apply(tween.eased());
        let Some(dt) = ctx.next_frame().await else {
            return TransitionOutcome::Cancelled;
        };
        tween.advance(dt);
    }

    if ctx.is_live() {
        TransitionOutcome::Completed
    } else {
        TransitionOutcome::Cancelled
    }
}

/// 过渡正常结束后的收尾：交互/射线标记 + 结束回调
fn finish(widget: &dyn Widget, visible: bool, settings: &impl DisplaySettings) {
    widget.set_interactable(visible);
    widget.set_blocks_raycasts(visible);
    if let Some(callback) = settings.on_animation_end() {
        callback.invoke();
    }
}
