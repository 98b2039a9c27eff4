//! # Popup Core
//!
//! 弹窗生命周期与过渡动画的核心库。
//!
//! ## 架构概述
//!
//! `popup-core` 是纯逻辑核心，不依赖任何渲染引擎。宿主把自己的 UI 节点包装成
//! [`Widget`]，每帧推进一次 [`FrameClock`]，其余的调度都在单线程的协作式执行器上完成：
//!
//! ```text
//! Host                               popup-core
//!   │                                    │
//!   │── registry.layer_show(MENU) ─────►│  同步：翻转标记、取消上一次请求
//!   │                                    │
//!   │── clock.tick(dt) ────────────────►│  每帧：显示方式插值并写回节点
//!   │◄─── widget.set_alpha / scale ──────│
//! ```
//!
//! ## 核心类型
//!
//! - [`Easing`]：带 11 点查表缓存的缓动曲线
//! - [`Operation`]：可取消的异步操作句柄
//! - [`DisplayStrategy`]：显示方式（[`Fade`]、[`Scale`]、[`Slide`]）
//! - [`PopupEntity`]：弹窗状态机
//! - [`PopupRegistry`]：弹窗注册表与调度器
//! - [`PopupRuntime`]：无渲染宿主的帧驱动器
//!
//! ## 使用示例
//!
//! ```ignore
//! use popup_core::{Layer, PopupEntity, PopupRuntime, PopupSettings, SimpleWidget};
//!
//! let mut runtime = PopupRuntime::new(PopupSettings::load_or_create(DEFAULT_SETTINGS_PATH));
//! let menu = PopupEntity::builder(SimpleWidget::new("menu").shared())
//!     .layer(Layer::MENU)
//!     .build();
//! runtime.registry().attach(&menu);
//!
//! runtime.registry().layer_show(Layer::MENU);
//! loop {
//!     runtime.advance(1.0 / 60.0);
//! }
//! ```

pub mod cancel;
pub mod clock;
pub mod config;
pub mod display;
pub mod easing;
pub mod error;
pub mod hotkey;
pub mod layer;
pub mod math;
pub mod operation;
pub mod popup;
pub mod registry;
pub mod runtime;
pub mod widget;

pub use cancel::{CancelSource, CancelToken};
pub use clock::{FrameClock, FrameContext};
pub use config::{ConfigError, DEFAULT_SETTINGS_PATH, LogType, PopupSettings};
pub use display::{
    AnimationCallback, AnyDisplay, DisplayBinding, DisplaySettings, DisplayStrategy, Fade,
    FadeSettings, Scale, ScaleSettings, Slide, SlideDirection, SlideSettings, TransitionOutcome,
    TransitionResult, Tween,
};
pub use easing::Easing;
pub use error::{PopupError, PopupResult};
pub use hotkey::{HotkeyAction, Key, KeyInput, PressedKeys};
pub use layer::Layer;
pub use math::Vec2;
pub use operation::{Operation, OperationStatus};
pub use popup::{CloseButton, PopupBuilder, PopupEntity, PopupEvent, PopupId, TransitionRequest};
pub use registry::{PopupRegistry, WeakRegistry};
pub use runtime::PopupRuntime;
pub use widget::{CanvasInfo, RenderMode, SimpleWidget, Widget, WidgetState};
