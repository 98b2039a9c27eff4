//! 滑入滑出
//!
//! 位置计算基于屏幕空间 Canvas：本地坐标原点即 Canvas 中心，
//! 画外位置 = Canvas 半尺寸 + 节点半尺寸。

use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture};

use super::{
    AnimationCallback, DisplaySettings, DisplayStrategy, TransitionOutcome, TransitionResult,
    finish, play,
};
use crate::clock::FrameContext;
use crate::easing::Easing;
use crate::error::{PopupError, PopupResult};
use crate::math::Vec2;
use crate::widget::Widget;

/// 滑入方向（显示时的运动方向）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlideDirection {
    /// 从下方滑入
    #[default]
    Up,
    /// 从上方滑入
    Down,
    /// 从右侧滑入
    Left,
    /// 从左侧滑入
    Right,
}

/// 滑动设置
#[derive(Debug, Clone)]
pub struct SlideSettings {
    pub duration: f32,
    pub easing: Easing,
    pub direction: SlideDirection,
    /// 显示时的目标位置（默认零点，即 Canvas 中心）
    pub target_position: Vec2,
    pub on_animation_end: Option<AnimationCallback>,
}

impl Default for SlideSettings {
    fn default() -> Self {
        Self {
            duration: 0.3,
            easing: Easing::Linear,
            direction: SlideDirection::default(),
            target_position: Vec2::ZERO,
            on_animation_end: None,
        }
    }
}

impl DisplaySettings for SlideSettings {
    fn duration(&self) -> f32 {
        self.duration
    }

    fn easing(&self) -> Easing {
        self.easing
    }

    fn on_animation_end(&self) -> Option<&AnimationCallback> {
        self.on_animation_end.as_ref()
    }
}

/// 通过本地位置显示/隐藏
#[derive(Debug, Default, Clone, Copy)]
pub struct Slide;

impl Slide {
    /// 画外位置：显示的起点，也是隐藏的终点
    pub fn off_canvas_position(widget: &dyn Widget, settings: &SlideSettings) -> PopupResult<Vec2> {
        let canvas = widget.canvas().ok_or_else(|| PopupError::MissingCanvas {
            popup: widget.name(),
        })?;
        if !canvas.render_mode.is_screen_space() {
            return Err(PopupError::WorldSpaceCanvas {
                popup: widget.name(),
            });
        }

        let half = (canvas.size + widget.size()) * 0.5;
        let target = settings.target_position;
        Ok(match settings.direction {
            SlideDirection::Up => Vec2::new(target.x, -half.y),
            SlideDirection::Down => Vec2::new(target.x, half.y),
            SlideDirection::Left => Vec2::new(half.x, target.y),
            SlideDirection::Right => Vec2::new(-half.x, target.y),
        })
    }

    async fn run(
        widget: Rc<dyn Widget>,
        settings: SlideSettings,
        ctx: FrameContext,
        visible: bool,
    ) -> TransitionResult {
        let off_canvas = Self::off_canvas_position(widget.as_ref(), &settings)?;
        let (start, target) = if visible {
            widget.set_local_position(off_canvas);
            (off_canvas, settings.target_position)
        } else {
            (widget.local_position(), off_canvas)
        };

        let outcome = play(&ctx, settings.duration, settings.easing, |eased| {
            widget.set_local_position(start.lerp_unclamped(target, eased));
        })
        .await;

        if outcome == TransitionOutcome::Completed {
            widget.set_local_position(target);
            finish(widget.as_ref(), visible, &settings);
        }
        Ok(outcome)
    }
}

impl DisplayStrategy for Slide {
    type Settings = SlideSettings;

    const NAME: &'static str = "Slide";

    fn show(
        &self,
        widget: Rc<dyn Widget>,
        settings: SlideSettings,
        ctx: FrameContext,
    ) -> LocalBoxFuture<'static, TransitionResult> {
        Self::run(widget, settings, ctx, true).boxed_local()
    }

    fn hide(
        &self,
        widget: Rc<dyn Widget>,
        settings: SlideSettings,
        ctx: FrameContext,
    ) -> LocalBoxFuture<'static, TransitionResult> {
        Self::run(widget, settings, ctx, false).boxed_local()
    }

    fn settle(&self, widget: &dyn Widget, settings: &SlideSettings, visible: bool) -> PopupResult<()> {
        let position = if visible {
            settings.target_position
        } else {
            Self::off_canvas_position(widget, settings)?
        };
        widget.set_local_position(position);
        widget.set_interactable(visible);
        widget.set_blocks_raycasts(visible);
        Ok(())
    }
}
