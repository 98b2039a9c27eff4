//! 缩放

use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture};

use super::{
    AnimationCallback, DisplaySettings, DisplayStrategy, TransitionOutcome, TransitionResult,
    finish, play,
};
use crate::clock::FrameContext;
use crate::easing::Easing;
use crate::error::PopupResult;
use crate::math::Vec2;
use crate::widget::Widget;

/// 缩放设置
#[derive(Debug, Clone)]
pub struct ScaleSettings {
    pub duration: f32,
    pub easing: Easing,
    /// 显示时的目标缩放
    pub show_scale: Vec2,
    /// 隐藏时的目标缩放
    pub hide_scale: Vec2,
    pub on_animation_end: Option<AnimationCallback>,
}

impl Default for ScaleSettings {
    fn default() -> Self {
        Self {
            duration: 0.3,
            easing: Easing::Linear,
            show_scale: Vec2::ONE,
            hide_scale: Vec2::ZERO,
            on_animation_end: None,
        }
    }
}

impl DisplaySettings for ScaleSettings {
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

/// 通过本地缩放显示/隐藏
#[derive(Debug, Default, Clone, Copy)]
pub struct Scale;

impl Scale {
    async fn run(
        widget: Rc<dyn Widget>,
        settings: ScaleSettings,
        ctx: FrameContext,
        visible: bool,
    ) -> TransitionResult {
        let start = widget.scale();
        let target = if visible {
            settings.show_scale
        } else {
            settings.hide_scale
        };

        let outcome = play(&ctx, settings.duration, settings.easing, |eased| {
            widget.set_scale(start.lerp_unclamped(target, eased));
        })
        .await;

        if outcome == TransitionOutcome::Completed {
            widget.set_scale(target);
            finish(widget.as_ref(), visible, &settings);
        }
        Ok(outcome)
    }
}

impl DisplayStrategy for Scale {
    type Settings = ScaleSettings;

    const NAME: &'static str = "Scale";

    fn show(
        &self,
        widget: Rc<dyn Widget>,
        settings: ScaleSettings,
        ctx: FrameContext,
    ) -> LocalBoxFuture<'static, TransitionResult> {
        Self::run(widget, settings, ctx, true).boxed_local()
    }

    fn hide(
        &self,
        widget: Rc<dyn Widget>,
        settings: ScaleSettings,
        ctx: FrameContext,
    ) -> LocalBoxFuture<'static, TransitionResult> {
        Self::run(widget, settings, ctx, false).boxed_local()
    }

    fn settle(&self, widget: &dyn Widget, settings: &ScaleSettings, visible: bool) -> PopupResult<()> {
        widget.set_scale(if visible {
            settings.show_scale
        } else {
            settings.hide_scale
        });
        widget.set_interactable(visible);
        widget.set_blocks_raycasts(visible);
        Ok(())
    }
}
