//! 淡入淡出

use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture};

use super::{
    AnimationCallback, DisplaySettings, DisplayStrategy, TransitionOutcome, TransitionResult,
    finish, play,
};
use crate::clock::FrameContext;
use crate::easing::Easing;
use crate::error::{PopupError, PopupResult};
use crate::math::lerp_unclamped;
use crate::widget::Widget;

/// 淡入淡出设置
#[derive(Debug, Clone)]
pub struct FadeSettings {
    /// 动画时长（秒）
    pub duration: f32,
    /// 缓动曲线
    pub easing: Easing,
    /// 显示时的目标透明度
    pub max_value: f32,
    /// 隐藏时的目标透明度
    pub min_value: f32,
    /// 动画结束回调
    pub on_animation_end: Option<AnimationCallback>,
}

impl Default for FadeSettings {
    fn default() -> Self {
        Self {
            duration: 0.3,
            easing: Easing::Linear,
            max_value: 1.0,
            min_value: 0.0,
            on_animation_end: None,
        }
    }
}

impl DisplaySettings for FadeSettings {
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

/// 通过 CanvasGroup 透明度显示/隐藏
#[derive(Debug, Default, Clone, Copy)]
pub struct Fade;

impl Fade {
    async fn run(
        widget: Rc<dyn Widget>,
        settings: FadeSettings,
        ctx: FrameContext,
        visible: bool,
    ) -> TransitionResult {
        let start = widget.alpha().ok_or_else(|| PopupError::MissingCanvasGroup {
            popup: widget.name(),
        })?;
        let target = if visible {
            settings.max_value
        } else {
            settings.min_value
        };

        let outcome = play(&ctx, settings.duration, settings.easing, |eased| {
            widget.set_alpha(lerp_unclamped(start, target, eased));
        })
        .await;

        if outcome == TransitionOutcome::Completed {
            widget.set_alpha(target);
            finish(widget.as_ref(), visible, &settings);
        }
        Ok(outcome)
    }
}

impl DisplayStrategy for Fade {
    type Settings = FadeSettings;

    const NAME: &'static str = "Fade";

    fn show(
        &self,
        widget: Rc<dyn Widget>,
        settings: FadeSettings,
        ctx: FrameContext,
    ) -> LocalBoxFuture<'static, TransitionResult> {
        Self::run(widget, settings, ctx, true).boxed_local()
    }

    fn hide(
        &self,
        widget: Rc<dyn Widget>,
        settings: FadeSettings,
        ctx: FrameContext,
    ) -> LocalBoxFuture<'static, TransitionResult> {
        Self::run(widget, settings, ctx, false).boxed_local()
    }

    fn settle(&self, widget: &dyn Widget, settings: &FadeSettings, visible: bool) -> PopupResult<()> {
        if widget.alpha().is_none() {
            return Err(PopupError::MissingCanvasGroup {
                popup: widget.name(),
            });
        }
        widget.set_alpha(if visible {
            settings.max_value
        } else {
            settings.min_value
        });
        widget.set_interactable(visible);
        widget.set_blocks_raycasts(visible);
        Ok(())
    }
}
