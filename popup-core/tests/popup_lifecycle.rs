//! # 弹窗生命周期集成测试
//!
//! 测试 Registry → PopupEntity → DisplayStrategy 的完整链路。
//! 所有场景都在无渲染的 `PopupRuntime` 上逐帧驱动。

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use popup_core::{
    AnimationCallback, CanvasInfo, CloseButton, Fade, FadeSettings, HotkeyAction, Layer,
    OperationStatus, PopupEntity, PopupEvent, PopupRegistry, PopupRuntime, PopupSettings,
    PressedKeys, SimpleWidget, Slide, SlideSettings, TransitionRequest,
};

const DT: f32 = 0.1;

fn runtime() -> (PopupRuntime, PopupRegistry) {
    let runtime = PopupRuntime::new(PopupSettings::default());
    let registry = runtime.registry().clone();
    (runtime, registry)
}

fn fade(registry: &PopupRegistry, duration: f32) -> TransitionRequest {
    TransitionRequest::new().with_display(registry.binding::<Fade>(FadeSettings {
        duration,
        ..FadeSettings::default()
    }))
}

fn counting_fade(registry: &PopupRegistry, duration: f32, counter: &Rc<Cell<u32>>) -> TransitionRequest {
    let counter = Rc::clone(counter);
    TransitionRequest::new().with_display(registry.binding::<Fade>(FadeSettings {
        duration,
        on_animation_end: Some(AnimationCallback::new(move || counter.set(counter.get() + 1))),
        ..FadeSettings::default()
    }))
}

/// 创建并挂载一个弹窗
fn attach(registry: &PopupRegistry, name: &str, layer: Layer) -> (SimpleWidget, Rc<PopupEntity>) {
    let widget = SimpleWidget::new(name);
    let popup = PopupEntity::builder(widget.shared()).layer(layer).build();
    registry.attach(&popup);
    (widget, popup)
}

/// Fade 0.5 秒：结束时透明度精确为 1.0
#[test]
fn test_fade_lands_on_exact_target() {
    let (mut runtime, registry) = runtime();
    let widget = SimpleWidget::new("menu");
    let popup = PopupEntity::builder(widget.shared())
        .layer(Layer::MENU)
        .show_display(registry.binding::<Fade>(FadeSettings {
            duration: 0.5,
            ..FadeSettings::default()
        }))
        .build();
    registry.attach(&popup);

    let op = registry.show(Layer::MENU);
    runtime.advance_for(0.3, DT);

    let alpha = widget.state().alpha.unwrap();
    assert!(alpha > 0.0 && alpha < 1.0);
    assert!(popup.is_be_visible());
    assert!(!popup.is_visible());

    runtime.advance_for(0.5, DT);
    assert_eq!(widget.state().alpha, Some(1.0));
    assert!(widget.state().interactable);
    assert!(popup.is_visible());
    assert_eq!(op.status(), OperationStatus::Completed);
}

/// 层级深度 0/1/2 任意顺序注册后按 [2, 1, 0] 遍历
#[test]
fn test_registry_orders_by_depth() {
    let (_runtime, registry) = runtime();
    let popups: Vec<_> = [1, 0, 2]
        .into_iter()
        .map(|depth| {
            let widget = SimpleWidget::new(format!("depth{depth}")).with_depth(depth);
            let popup = PopupEntity::builder(widget.shared()).layer(Layer::HUB).build();
            registry.attach(&popup);
            popup
        })
        .collect();

    let names: Vec<_> = registry
        .popups()
        .iter()
        .map(|p| p.name().to_string())
        .collect();
    assert_eq!(names, ["depth2", "depth1", "depth0"]);
    drop(popups);
}

/// Show(A|B) 只激活 A 和 B；LayerShow(A) 额外隐藏 B
#[test]
fn test_layer_resolution_and_layer_show() {
    let (mut runtime, registry) = runtime();
    let (_, a) = attach(&registry, "a", Layer::HUB);
    let (_, b) = attach(&registry, "b", Layer::MENU);
    let (c_widget, c) = attach(&registry, "c", Layer::GAME);

    registry.show(Layer::HUB | Layer::MENU);
    assert!(a.is_be_visible());
    assert!(b.is_be_visible());
    assert!(!c.is_be_visible());

    runtime.advance_for(1.0, DT);
    assert!(a.is_visible() && b.is_visible());
    assert!(!c.is_visible());
    assert_eq!(c_widget.state().alpha, Some(0.0));

    registry.layer_show(Layer::HUB);
    runtime.advance_for(1.0, DT);
    assert!(a.is_visible());
    assert!(!b.is_be_visible() && !b.is_visible());
    assert!(!c.is_visible());
}

/// 切换图层：隐藏阶段结束后才开始显示阶段
#[test]
fn test_layer_show_hides_before_showing() {
    let (mut runtime, registry) = runtime();
    let hub_widget = SimpleWidget::new("hub").with_alpha(1.0);
    let hub = PopupEntity::builder(hub_widget.shared())
        .layer(Layer::HUB)
        .visible(true)
        .build();
    registry.attach(&hub);
    let (menu_widget, menu) = attach(&registry, "menu", Layer::MENU);

    registry.layer_show_with(Layer::MENU, fade(&registry, 0.5));
    runtime.advance_for(0.2, DT);
    assert!(!hub.is_be_visible());
    assert!(!menu.is_be_visible(), "隐藏阶段未结束前不应开始显示");
    assert_eq!(menu_widget.state().alpha, Some(0.0));

    runtime.advance_for(1.5, DT);
    assert!(menu.is_visible());
    assert_eq!(hub_widget.state().alpha, Some(0.0));
    assert_eq!(menu_widget.state().alpha, Some(1.0));
}

/// 重复显示：Showing 事件每个周期只触发一次
#[test]
fn test_show_is_idempotent() {
    let (mut runtime, registry) = runtime();
    let (_, menu) = attach(&registry, "menu", Layer::MENU);

    let events = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&events);
    menu.subscribe_events(move |_, event| log.borrow_mut().push(event));

    registry.show_popup(&menu);
    runtime.advance(DT);
    registry.show_popup(&menu);
    runtime.advance_for(1.0, DT);
    registry.show_popup(&menu);
    runtime.advance_for(1.0, DT);

    assert_eq!(*events.borrow(), vec![PopupEvent::Showing, PopupEvent::Shown]);
    assert!(menu.is_visible());
}

/// 显示 → 隐藏 → 显示：回到同一终点
#[test]
fn test_round_trip() {
    let (mut runtime, registry) = runtime();
    let (widget, menu) = attach(&registry, "menu", Layer::MENU);

    registry.show_popup(&menu);
    runtime.advance_for(1.0, DT);
    let first = widget.state().alpha;

    registry.hide_popup(&menu);
    runtime.advance_for(1.0, DT);
    assert_eq!(widget.state().alpha, Some(0.0));
    assert!(!menu.is_be_visible() && !menu.is_visible());
    assert!(!widget.state().interactable);

    registry.show_popup(&menu);
    runtime.advance_for(1.0, DT);
    assert_eq!(widget.state().alpha, first);
    assert_eq!(first, Some(1.0));
    assert!(menu.is_be_visible() && menu.is_visible());
}

/// 隐藏进行中再次显示：隐藏被取消，结束回调不触发
#[test]
fn test_show_cancels_in_flight_hide() {
    let (mut runtime, registry) = runtime();
    let widget = SimpleWidget::new("menu").with_alpha(1.0);
    let menu = PopupEntity::builder(widget.shared())
        .layer(Layer::MENU)
        .visible(true)
        .build();
    registry.attach(&menu);

    let hide_ended = Rc::new(Cell::new(0));
    let hide = registry.hide_with(Layer::MENU, counting_fade(&registry, 1.0, &hide_ended));
    runtime.advance_for(0.3, DT);
    let alpha = widget.state().alpha.unwrap();
    assert!(alpha < 1.0 && alpha > 0.0);

    let show = registry.show(Layer::MENU);
    assert_eq!(hide.status(), OperationStatus::Cancelled);

    runtime.advance_for(2.0, DT);
    assert_eq!(hide_ended.get(), 0);
    assert_eq!(show.status(), OperationStatus::Completed);
    assert_eq!(widget.state().alpha, Some(1.0));
    assert!(menu.is_visible());
}

/// 新的顶层操作取消上一个顶层操作
#[test]
fn test_top_level_operation_rolls() {
    let (mut runtime, registry) = runtime();
    let (_, a) = attach(&registry, "a", Layer::HUB);
    let (_, b) = attach(&registry, "b", Layer::MENU);

    let first = registry.show_with(Layer::HUB, fade(&registry, 1.0));
    runtime.advance_for(0.2, DT);
    let second = registry.show(Layer::MENU);

    assert!(first.is_cancelled());
    assert_eq!(first.status(), OperationStatus::Cancelled);
    runtime.advance_for(1.0, DT);

    // 被取消的显示停在半途，不写入最终标记
    assert!(a.is_be_visible() && !a.is_visible());
    assert!(b.is_visible());
    assert_eq!(second.status(), OperationStatus::Completed);

    // 停在半途的弹窗可以重新显示
    registry.show(Layer::HUB);
    runtime.advance_for(1.0, DT);
    assert!(a.is_visible());
}

/// 深层弹窗：两个子弹窗使用与父弹窗相同的设置
#[test]
fn test_deep_popups_share_settings() {
    let (mut runtime, registry) = runtime();
    let children: Vec<_> = ["left", "right"]
        .into_iter()
        .map(|name| {
            PopupEntity::builder(SimpleWidget::new(name).with_alpha(1.0).shared())
                .visible(true)
                .build()
        })
        .collect();
    let parent_widget = SimpleWidget::new("parent").with_alpha(1.0);
    let parent = PopupEntity::builder(parent_widget.shared())
        .layer(Layer::MENU)
        .visible(true)
        .deep_popup(Rc::clone(&children[0]))
        .deep_popup(Rc::clone(&children[1]))
        .build();
    registry.attach(&parent);
    assert_eq!(registry.len(), 3);

    let ended = Rc::new(Cell::new(0));
    registry.hide_popup_with(&parent, counting_fade(&registry, 0.3, &ended));
    for child in &children {
        assert!(!child.is_be_visible());
    }

    runtime.advance_for(1.0, DT);
    assert_eq!(ended.get(), 3);
    assert!(!parent.is_visible());
    for child in &children {
        assert!(!child.is_visible());
        assert_eq!(child.widget().alpha(), Some(0.0));
    }
}

/// 深层弹窗：取消父弹窗的隐藏会一并取消子弹窗的隐藏
#[test]
fn test_deep_popups_share_cancel_scope() {
    let (mut runtime, registry) = runtime();
    let child_widget = SimpleWidget::new("child").with_alpha(1.0);
    let child = PopupEntity::builder(child_widget.shared())
        .visible(true)
        .build();
    let parent = PopupEntity::builder(SimpleWidget::new("parent").with_alpha(1.0).shared())
        .layer(Layer::MENU)
        .visible(true)
        .deep_popup(Rc::clone(&child))
        .build();
    registry.attach(&parent);

    let ended = Rc::new(Cell::new(0));
    registry.hide_popup_with(&parent, counting_fade(&registry, 1.0, &ended));
    runtime.advance_for(0.3, DT);
    let mid = child_widget.state().alpha.unwrap();
    assert!(mid < 1.0);

    registry.show_popup(&parent);
    runtime.advance_for(2.0, DT);

    assert_eq!(ended.get(), 0);
    assert!(parent.is_visible());
    assert!(child.is_visible());
    assert_eq!(child_widget.state().alpha, Some(1.0));
}

/// `_with` 变体可以单独覆盖深层弹窗的显示方式
#[test]
fn test_deep_display_override() {
    let (mut runtime, registry) = runtime();
    let child_widget = SimpleWidget::new("child");
    let child = PopupEntity::builder(child_widget.shared()).build();
    let parent_widget = SimpleWidget::new("parent");
    let parent = PopupEntity::builder(parent_widget.shared())
        .layer(Layer::MENU)
        .deep_popup(Rc::clone(&child))
        .build();
    registry.attach(&parent);

    let half = registry.binding::<Fade>(FadeSettings {
        duration: 0.2,
        max_value: 0.5,
        ..FadeSettings::default()
    });
    registry.show_with(Layer::MENU, fade(&registry, 0.2).with_deep_display(half));
    runtime.advance_for(1.0, DT);

    assert_eq!(parent_widget.state().alpha, Some(1.0));
    assert_eq!(child_widget.state().alpha, Some(0.5));
}

/// 快捷键：按注册表顺序触发第一个匹配的弹窗，每帧最多一次
#[test]
fn test_hotkeys() {
    let (mut runtime, registry) = runtime();
    let shallow = PopupEntity::builder(SimpleWidget::new("shallow").shared())
        .show_key("F1")
        .build();
    let deep = PopupEntity::builder(SimpleWidget::new("deep").with_depth(3).shared())
        .show_key("F1")
        .hide_key("Escape")
        .build();
    registry.attach(&shallow);
    registry.attach(&deep);

    let f1: PressedKeys = ["F1"].into_iter().collect();
    let escape: PressedKeys = ["Escape"].into_iter().collect();

    assert_eq!(
        runtime.advance_with_input(DT, &f1),
        Some(HotkeyAction::Show(deep.id()))
    );
    assert!(deep.is_be_visible());
    assert!(!shallow.is_be_visible());
    runtime.advance_for(1.0, DT);

    // deep 已显示，F1 落到下一个弹窗
    assert_eq!(
        runtime.advance_with_input(DT, &f1),
        Some(HotkeyAction::Show(shallow.id()))
    );
    assert_eq!(
        runtime.advance_with_input(DT, &escape),
        Some(HotkeyAction::Hide(deep.id()))
    );

    registry.refresh_settings(PopupSettings {
        key_event_system_enabled: false,
        ..PopupSettings::default()
    });
    assert_eq!(runtime.advance_with_input(DT, &escape), None);
}

/// 快捷键：祖先未显示时跳过
#[test]
fn test_hotkeys_require_visible_ancestors() {
    let (mut runtime, registry) = runtime();
    let child = PopupEntity::builder(SimpleWidget::new("child").shared())
        .show_key("Tab")
        .build();
    let parent = PopupEntity::builder(SimpleWidget::new("parent").shared())
        .deep_popup(Rc::clone(&child))
        .build();
    registry.attach(&parent);

    let tab: PressedKeys = ["Tab"].into_iter().collect();
    assert_eq!(runtime.advance_with_input(DT, &tab), None);

    registry.show_popup(&parent);
    runtime.advance_for(1.0, DT);
    // 父弹窗显示时会带出子弹窗，先把子弹窗单独隐藏
    registry.hide_popup(&child);
    runtime.advance_for(1.0, DT);
    assert!(parent.is_visible() && !child.is_visible());

    assert_eq!(
        runtime.advance_with_input(DT, &tab),
        Some(HotkeyAction::Show(child.id()))
    );
}

/// 关闭按钮：显示期间挂上，按下后隐藏弹窗并摘除
#[test]
fn test_close_button() {
    let (mut runtime, registry) = runtime();
    let close = CloseButton::new();
    let popup = PopupEntity::builder(SimpleWidget::new("overlay").shared())
        .layer(Layer::OVERLAY)
        .close_button(close.clone())
        .build();
    registry.attach(&popup);
    assert!(!close.is_attached());
    assert!(!close.press());

    registry.show(Layer::OVERLAY);
    assert!(close.is_attached());
    runtime.advance_for(1.0, DT);

    let events = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&events);
    popup.subscribe_events(move |_, event| log.borrow_mut().push(event));

    assert!(close.press());
    runtime.advance_for(1.0, DT);
    assert!(!popup.is_visible());
    assert!(!close.is_attached());
    assert_eq!(*events.borrow(), vec![PopupEvent::Hiding, PopupEvent::Hidden]);
}

/// 世界空间 Canvas 上的滑动：记录错误、直接落到终点，不影响同批次的其它弹窗
#[test]
fn test_slide_on_world_space_canvas() {
    let (mut runtime, registry) = runtime();
    let broken_widget =
        SimpleWidget::new("broken").with_canvas(Some(CanvasInfo::world_space(10.0, 10.0)));
    let broken = PopupEntity::builder(broken_widget.shared())
        .layer(Layer::DIALOG)
        .show_display(registry.binding::<Slide>(SlideSettings::default()))
        .build();
    registry.attach(&broken);
    let (healthy_widget, healthy) = attach(&registry, "healthy", Layer::DIALOG);

    let op = registry.show(Layer::DIALOG);
    runtime.advance_for(1.0, DT);

    assert_eq!(op.status(), OperationStatus::Completed);
    assert!(broken.is_visible());
    assert!(healthy.is_visible());
    assert_eq!(healthy_widget.state().alpha, Some(1.0));
}

/// 关闭运行时：进行中的动画停在半途，不写入最终标记
#[test]
fn test_shutdown_stops_animations() {
    let (mut runtime, registry) = runtime();
    let (widget, menu) = attach(&registry, "menu", Layer::MENU);

    registry.show_with(Layer::MENU, fade(&registry, 1.0));
    runtime.advance_for(0.3, DT);
    runtime.shutdown();
    runtime.advance_for(1.0, DT);

    assert!(menu.is_be_visible());
    assert!(!menu.is_visible());
    assert!(widget.state().alpha.unwrap() < 1.0);
}

/// 事件监听在同步前置中 panic：注册表入口照常返回，操作记为失败，之后可以重新显示
#[test]
fn test_listener_panic_is_contained() {
    let (mut runtime, registry) = runtime();
    let (widget, hub) = attach(&registry, "hub", Layer::HUB);

    let armed = Rc::new(Cell::new(true));
    let trigger = Rc::clone(&armed);
    hub.subscribe_events(move |_, event| {
        if event == PopupEvent::Showing && trigger.replace(false) {
            panic!("listener failure");
        }
    });

    let op = registry.show(Layer::HUB);
    assert_eq!(op.status(), OperationStatus::Failed);
    assert!(registry.current().is_some());
    runtime.advance_for(1.0, DT);
    assert!(!hub.is_visible());

    let retry = registry.show(Layer::HUB);
    runtime.advance_for(1.0, DT);
    assert_eq!(retry.status(), OperationStatus::Completed);
    assert!(hub.is_visible());
    assert_eq!(widget.state().alpha, Some(1.0));
}

/// 同步前置期间由事件监听发起的顶层操作会被外层操作顶替并取消
#[test]
fn test_nested_top_level_operation_is_cancelled() {
    let (mut runtime, registry) = runtime();
    let (_, a) = attach(&registry, "a", Layer::HUB);
    let (_, b) = attach(&registry, "b", Layer::MENU);

    let nested = Rc::new(RefCell::new(None));
    let slot = Rc::clone(&nested);
    let weak = registry.downgrade();
    a.subscribe_events(move |_, event| {
        if event != PopupEvent::Showing {
            return;
        }
        if let Some(registry) = weak.upgrade() {
            *slot.borrow_mut() = Some(registry.show(Layer::MENU));
        }
    });

    let outer = registry.show(Layer::HUB);
    let inner = nested.borrow_mut().take().unwrap();
    assert_eq!(inner.status(), OperationStatus::Cancelled);
    assert_eq!(outer.status(), OperationStatus::Running);

    runtime.advance_for(1.0, DT);
    assert!(a.is_visible());
    assert!(!b.is_visible());
    assert_eq!(outer.status(), OperationStatus::Completed);

    let newest = registry.hide(Layer::GAME);
    runtime.advance_for(0.1, DT);
    assert_eq!(inner.status(), OperationStatus::Cancelled);
    assert!(newest.is_finished());
}
