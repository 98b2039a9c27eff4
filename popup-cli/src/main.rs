//! # Popup Simulator
//!
//! 无渲染的弹窗模拟器：搭建一个演示场景，逐帧驱动并打印弹窗状态。
//!
//! ## 用法
//!
//! ```bash
//! cargo run -p popup-cli
//! cargo run -p popup-cli -- --frames 240 --dt 0.0333
//! cargo run -p popup-cli -- --settings settings/popup_settings.json --verbose
//! ```
//!
//! ## 场景
//!
//! - `hub`：HUB 图层，初始可见
//! - `menu`：MENU 图层，回弹缩放；带一个从下方滑入的深层弹窗 `dialog`
//! - `overlay`：OVERLAY 图层，按 F1 显示，带关闭按钮
//!
//! 脚本：切换到 MENU → 快捷键打开 overlay → 点击关闭按钮 → 隐藏全部。

use std::path::PathBuf;
use std::rc::Rc;

use anyhow::bail;
use clap::Parser;
use popup_core::{
    CloseButton, DEFAULT_SETTINGS_PATH, Easing, Fade, FadeSettings, Layer, PopupEntity,
    PopupRegistry, PopupRuntime, PopupSettings, PressedKeys, Scale, ScaleSettings, SimpleWidget,
    Slide, SlideDirection, SlideSettings, Vec2,
};
use tracing::{Level, info};

#[derive(Parser)]
#[command(name = "popup-sim")]
#[command(about = "弹窗模拟器 - 逐帧驱动演示场景并打印弹窗状态")]
#[command(version)]
struct Cli {
    /// 模拟的帧数
    #[arg(short, long, default_value_t = 120)]
    frames: u32,

    /// 每帧时长（秒）
    #[arg(long, default_value_t = 1.0 / 60.0)]
    dt: f32,

    /// 设置文件路径（不存在时写出默认设置）
    #[arg(short, long, default_value = DEFAULT_SETTINGS_PATH)]
    settings: PathBuf,

    /// 输出调试日志
    #[arg(short, long)]
    verbose: bool,
}

/// 演示场景
struct Scene {
    widgets: Vec<(String, SimpleWidget)>,
    popups: Vec<Rc<PopupEntity>>,
    close: CloseButton,
}

impl Scene {
    fn build(registry: &PopupRegistry) -> Self {
        let hub_widget = SimpleWidget::new("hub").with_alpha(1.0);
        let menu_widget = SimpleWidget::new("menu").with_depth(1).with_scale(Vec2::ZERO);
        let dialog_widget = SimpleWidget::new("dialog")
            .with_alpha(1.0)
            .with_depth(2)
            .with_size(600.0, 400.0);
        let overlay_widget = SimpleWidget::new("overlay").with_depth(1);
        let close = CloseButton::new();

        let hub = PopupEntity::builder(hub_widget.shared())
            .layer(Layer::HUB)
            .visible(true)
            .build();

        let slide = registry.binding::<Slide>(SlideSettings {
            duration: 0.4,
            easing: Easing::EaseOutCubic,
            direction: SlideDirection::Up,
            ..SlideSettings::default()
        });
        let dialog = PopupEntity::builder(dialog_widget.shared())
            .layer(Layer::DIALOG)
            .show_display(slide.clone())
            .hide_display(slide)
            .build();

        let menu = PopupEntity::builder(menu_widget.shared())
            .layer(Layer::MENU)
            .show_display(registry.binding::<Scale>(ScaleSettings {
                duration: 0.5,
                easing: Easing::EaseOutBack,
                ..ScaleSettings::default()
            }))
            .hide_display(registry.binding::<Scale>(ScaleSettings {
                duration: 0.25,
                easing: Easing::EaseInQuad,
                ..ScaleSettings::default()
            }))
            .deep_popup(Rc::clone(&dialog))
            .build();

        let overlay = PopupEntity::builder(overlay_widget.shared())
            .layer(Layer::OVERLAY)
            .show_display(registry.binding::<Fade>(FadeSettings {
                duration: 0.2,
                ..FadeSettings::default()
            }))
            .show_key("F1")
            .close_button(close.clone())
            .build();

        for popup in [&hub, &menu, &overlay] {
            registry.attach(popup);
        }

        Self {
            widgets: vec![
                ("hub".to_string(), hub_widget),
                ("menu".to_string(), menu_widget),
                ("dialog".to_string(), dialog_widget),
                ("overlay".to_string(), overlay_widget),
            ],
            popups: vec![hub, menu, dialog, overlay],
            close,
        }
    }

    fn print(&self, frame: u32) {
        println!("--- frame {frame} ---");
        for popup in &self.popups {
            let Some((_, widget)) = self.widgets.iter().find(|(name, _)| name == popup.name())
            else {
                continue;
            };
            let state = widget.state();
            println!(
                "{:<8} be_visible={:<5} visible={:<5} alpha={:<6} scale={:<6.3} pos=({:.1}, {:.1})",
                popup.name(),
                popup.is_be_visible(),
                popup.is_visible(),
                state
                    .alpha
                    .map(|a| format!("{a:.3}"))
                    .unwrap_or_else(|| "-".to_string()),
                state.scale.x,
                state.position.x,
                state.position.y,
            );
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if cli.dt <= 0.0 {
        bail!("每帧时长必须大于 0: {}", cli.dt);
    }

    let settings = PopupSettings::load_or_create(&cli.settings);
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        settings.log_type.level()
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("初始化日志失败: {e}"))?;

    info!(path = ?cli.settings, ?settings, "已加载设置");

    let mut runtime = PopupRuntime::new(settings);
    let registry = runtime.registry().clone();
    let scene = Scene::build(&registry);

    let hotkey_frame = cli.frames / 3;
    let close_frame = cli.frames * 2 / 3;
    let hide_frame = cli.frames * 5 / 6;
    let report_every = (cli.frames / 8).max(1);

    registry.layer_show(Layer::MENU);
    scene.print(0);

    for frame in 1..=cli.frames {
        let mut keys = PressedKeys::new();
        if frame == hotkey_frame {
            keys.press("F1");
        }
        if let Some(action) = runtime.advance_with_input(cli.dt, &keys) {
            info!(frame, ?action, "快捷键触发");
        }

        if frame == close_frame && scene.close.press() {
            info!(frame, "点击关闭按钮");
        }
        if frame == hide_frame {
            registry.hide_all();
        }

        if frame % report_every == 0 || frame == cli.frames {
            scene.print(frame);
        }
    }

    runtime.shutdown();
    Ok(())
}
