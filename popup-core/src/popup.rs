//! # Popup 模块
//!
//! 弹窗实体：一个可交互弹窗的状态机。
//!
//! ## 状态
//!
//! | 状态 | `is_be_visible` | `is_visible` |
//! |------|-----------------|--------------|
//! | Hidden | false | false |
//! | Showing | true | false |
//! | Shown | true | true |
//! | Hiding | false | false |
//!
//! 始终满足 `is_visible ⟹ is_be_visible`。
//!
//! ## 显示/隐藏协议
//!
//! [`PopupEntity::show`] / [`PopupEntity::hide`] 分两段执行：
//!
//! 1. 同步前置：守卫检查、翻转 `is_be_visible`、滚动取消源（取消上一次请求）、
//!    订阅副作用与生命周期事件，在调用返回前就已生效
//! 2. 异步主体：显示方式与所有深层子弹窗并发执行，全部结束后写入最终状态
//!
//! 被取消的请求跳过第 2 段的收尾（不改标记、不退订、不发事件），
//! 交给接手的新请求处理。

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::{self, FutureExt, LocalBoxFuture};
use tracing::debug;

use crate::cancel::{CancelSource, CancelToken};
use crate::clock::FrameContext;
use crate::config::LogType;
use crate::display::{DisplayBinding, Fade};
use crate::error::PopupError;
use crate::hotkey::Key;
use crate::layer::Layer;
use crate::registry::{PopupRegistry, WeakRegistry};
use crate::widget::Widget;

static NEXT_POPUP_ID: AtomicU64 = AtomicU64::new(1);

/// 弹窗唯一标识符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PopupId(u64);

impl PopupId {
    fn next() -> Self {
        Self(NEXT_POPUP_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PopupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PopupId({})", self.0)
    }
}

/// 生命周期事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupEvent {
    /// 开始显示（订阅之后、动画之前）
    Showing,
    /// 显示完成
    Shown,
    /// 开始隐藏
    Hiding,
    /// 隐藏完成（退订之后）
    Hidden,
}

type EventListener = Rc<dyn Fn(&PopupEntity, PopupEvent)>;

/// 关闭按钮
///
/// 弹窗显示期间挂上监听，按下即通过注册表隐藏弹窗；隐藏完成后摘除。
#[derive(Clone, Default)]
pub struct CloseButton {
    listener: Rc<RefCell<Option<Rc<dyn Fn()>>>>,
}

impl fmt::Debug for CloseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloseButton")
            .field("attached", &self.is_attached())
            .finish()
    }
}

impl CloseButton {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按下按钮，返回是否有监听响应
    pub fn press(&self) -> bool {
        let listener = self.listener.borrow().clone();
        match listener {
            Some(listener) => {
                listener();
                true
            }
            None => false,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.listener.borrow().is_some()
    }

    fn attach(&self, listener: impl Fn() + 'static) {
        *self.listener.borrow_mut() = Some(Rc::new(listener));
    }

    fn detach(&self) {
        self.listener.borrow_mut().take();
    }
}

/// 单次显示/隐藏请求
///
/// 所有字段都不会写回弹窗的缓存。
#[derive(Debug, Clone, Default)]
pub struct TransitionRequest {
    /// 覆盖本弹窗缓存的显示方式
    pub display: Option<DisplayBinding>,
    /// 单独覆盖深层子弹窗的显示方式（为空时沿用 `display`）
    pub deep_display: Option<DisplayBinding>,
    /// 父级取消令牌
    pub token: Option<CancelToken>,
}

impl TransitionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_display(mut self, display: DisplayBinding) -> Self {
        self.display = Some(display);
        self
    }

    pub fn with_deep_display(mut self, display: DisplayBinding) -> Self {
        self.deep_display = Some(display);
        self
    }

    pub fn with_token(mut self, token: CancelToken) -> Self {
        self.token = Some(token);
        self
    }

    /// 传给深层子弹窗的请求
    fn for_deep_popups(&self, token: &CancelToken) -> Self {
        Self {
            display: self.deep_display.clone().or_else(|| self.display.clone()),
            deep_display: self.deep_display.clone(),
            token: Some(token.clone()),
        }
    }
}

/// 弹窗实体
///
/// 由场景（调用方）持有 `Rc`，注册表只保留弱引用；实体析构时自动退出注册表。
pub struct PopupEntity {
    id: PopupId,
    name: String,
    layer: Cell<Layer>,
    manual_init: bool,
    widget: Rc<dyn Widget>,
    deep_popups: RefCell<Vec<Rc<PopupEntity>>>,
    parent: RefCell<Weak<PopupEntity>>,
    show_display: RefCell<Option<DisplayBinding>>,
    hide_display: RefCell<Option<DisplayBinding>>,
    /// 过渡已开始
    is_be_visible: Cell<bool>,
    /// 过渡已完成
    is_visible: Cell<bool>,
    subscribed: Cell<bool>,
    show_keys: Vec<Key>,
    hide_keys: Vec<Key>,
    cancel: RefCell<Option<CancelSource>>,
    listeners: RefCell<Vec<EventListener>>,
    close_button: Option<CloseButton>,
    registry: RefCell<WeakRegistry>,
    initialized: Cell<bool>,
}

impl fmt::Debug for PopupEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PopupEntity")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("layer", &self.layer.get())
            .field("is_be_visible", &self.is_be_visible.get())
            .field("is_visible", &self.is_visible.get())
            .field("deep_popups", &self.deep_popups.borrow().len())
            .finish()
    }
}

impl PopupEntity {
    /// 以节点创建构建器，名称取节点名称
    pub fn builder(widget: Rc<dyn Widget>) -> PopupBuilder {
        PopupBuilder::new(widget)
    }

    pub fn id(&self) -> PopupId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layer(&self) -> Layer {
        self.layer.get()
    }

    pub fn set_layer(&self, layer: Layer) {
        self.layer.set(layer);
    }

    pub fn manual_init(&self) -> bool {
        self.manual_init
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.get()
    }

    pub fn widget(&self) -> &Rc<dyn Widget> {
        &self.widget
    }

    pub fn is_be_visible(&self) -> bool {
        self.is_be_visible.get()
    }

    pub fn is_visible(&self) -> bool {
        self.is_visible.get()
    }

    /// 是否处于订阅状态（关闭按钮已挂上）
    pub fn is_subscribed(&self) -> bool {
        self.subscribed.get()
    }

    pub fn show_keys(&self) -> &[Key] {
        &self.show_keys
    }

    pub fn hide_keys(&self) -> &[Key] {
        &self.hide_keys
    }

    pub fn close_button(&self) -> Option<&CloseButton> {
        self.close_button.as_ref()
    }

    pub fn show_display(&self) -> Option<DisplayBinding> {
        self.show_display.borrow().clone()
    }

    pub fn hide_display(&self) -> Option<DisplayBinding> {
        self.hide_display.borrow().clone()
    }

    /// 替换缓存的显示方式
    pub fn set_show_display(&self, binding: DisplayBinding) {
        *self.show_display.borrow_mut() = Some(binding);
    }

    /// 替换缓存的隐藏方式
    pub fn set_hide_display(&self, binding: DisplayBinding) {
        *self.hide_display.borrow_mut() = Some(binding);
    }

    pub fn deep_popups(&self) -> Vec<Rc<PopupEntity>> {
        self.deep_popups.borrow().clone()
    }

    pub fn parent(&self) -> Option<Rc<PopupEntity>> {
        self.parent.borrow().upgrade()
    }

    /// 挂上一个深层子弹窗
    pub fn add_deep_popup(self: &Rc<Self>, child: Rc<PopupEntity>) {
        *child.parent.borrow_mut() = Rc::downgrade(self);
        self.deep_popups.borrow_mut().push(child);
    }

    /// `other` 是否在本弹窗的深层子树中
    ///
    /// 深层弹窗图中不能有环。
    pub fn contains_deep_popup(&self, other: &PopupEntity) -> bool {
        self.deep_popups
            .borrow()
            .iter()
            .any(|child| child.id == other.id || child.contains_deep_popup(other))
    }

    /// 所有祖先弹窗是否都已显示完成（没有祖先时为 `true`）
    pub fn ancestors_visible(&self) -> bool {
        let mut current = self.parent();
        while let Some(popup) = current {
            if !popup.is_visible() {
                return false;
            }
            current = popup.parent();
        }
        true
    }

    /// 监听生命周期事件
    pub fn subscribe_events(&self, listener: impl Fn(&PopupEntity, PopupEvent) + 'static) {
        self.listeners.borrow_mut().push(Rc::new(listener));
    }

    /// 绑定的注册表
    pub fn registry(&self) -> Option<PopupRegistry> {
        self.registry.borrow().upgrade()
    }

    /// 初始化：绑定注册表、补全默认显示方式、把节点落到当前标记对应的状态，然后注册
    ///
    /// 重复调用无效果。
    pub fn init(self: &Rc<Self>, registry: &PopupRegistry) {
        if self.initialized.replace(true) {
            return;
        }
        *self.registry.borrow_mut() = registry.downgrade();

        if self.show_display.borrow().is_none() || self.hide_display.borrow().is_none() {
            let fallback = registry.default_binding::<Fade>();
            if self.show_display.borrow().is_none() {
                self.set_show_display(fallback.clone());
            }
            if self.hide_display.borrow().is_none() {
                self.set_hide_display(fallback);
            }
        }

        let visible = self.is_be_visible.get();
        let binding = if visible {
            self.show_display()
        } else {
            self.hide_display()
        };
        if let Some(binding) = binding {
            if let Err(e) = binding.settle(self.widget.as_ref(), visible) {
                registry.report(&e);
            }
        }
        if visible {
            self.subscribe();
        }

        registry.register(self);
        debug!(popup = %self.name, id = %self.id, layer = ?self.layer.get(), "弹窗已初始化");
    }

    /// 显示
    ///
    /// 已在显示（`is_be_visible`）时为空操作；上一次显示被取消而停在半途时允许重新开始。
    pub fn show(self: &Rc<Self>, request: TransitionRequest) -> LocalBoxFuture<'static, ()> {
        if self.is_be_visible.get() && (self.is_visible.get() || !self.stalled()) {
            debug!(popup = %self.name, "弹窗已在显示中，忽略");
            return future::ready(()).boxed_local();
        }
        self.transition(request, true)
    }

    /// 隐藏
    ///
    /// 未在显示时为空操作；上一次隐藏被取消而停在半途时允许重新开始。
    pub fn hide(self: &Rc<Self>, request: TransitionRequest) -> LocalBoxFuture<'static, ()> {
        if !self.is_be_visible.get() && !(self.subscribed.get() && self.stalled()) {
            debug!(popup = %self.name, "弹窗未在显示，忽略");
            return future::ready(()).boxed_local();
        }
        self.transition(request, false)
    }

    fn transition(
        self: &Rc<Self>,
        request: TransitionRequest,
        visible: bool,
    ) -> LocalBoxFuture<'static, ()> {
        let Some(registry) = self.registry() else {
            LogType::default().report(PopupError::NotInitialized {
                popup: self.name.clone(),
            });
            return future::ready(()).boxed_local();
        };

        let cached = if visible {
            self.show_display()
        } else {
            self.hide_display()
        };
        let Some(binding) = request.display.clone().or(cached) else {
            registry.report(&PopupError::MissingDisplay {
                popup: self.name.clone(),
                phase: if visible { "显示" } else { "隐藏" },
            });
            return future::ready(()).boxed_local();
        };

        // 同步前置
        self.is_be_visible.set(visible);
        if !visible {
            self.is_visible.set(false);
        }
        let token = self.roll_token(request.token.as_ref());
        if visible {
            self.subscribe();
            self.emit(PopupEvent::Showing);
        } else {
            self.emit(PopupEvent::Hiding);
        }
        debug!(
            popup = %self.name,
            display = binding.display_name(),
            visible,
            "开始过渡"
        );

        let ctx = FrameContext::new(registry.clock(), token.clone());
        let own = binding.run(Rc::clone(&self.widget), visible, ctx.clone());
        let deep_request = request.for_deep_popups(&token);
        let deep: Vec<_> = self
            .deep_popups()
            .iter()
            .map(|child| {
                if visible {
                    child.show(deep_request.clone())
                } else {
                    child.hide(deep_request.clone())
                }
            })
            .collect();

        let this = Rc::clone(self);
        async move {
            let (result, _) = future::join(own, future::join_all(deep)).await;

            if let Err(e) = result {
                registry.report(&e);
                // 出错的弹窗直接落到终点，标记照常收尾
                if ctx.is_live() {
                    if let Err(e) = binding.settle(this.widget.as_ref(), visible) {
                        debug!(popup = %this.name, error = %e, "无法直接落到终点状态");
                    }
                }
            }

            if !ctx.is_live() {
                debug!(popup = %this.name, visible, "过渡被取消");
                return;
            }

            if visible {
                this.is_visible.set(true);
                this.emit(PopupEvent::Shown);
            } else {
                this.unsubscribe();
                this.is_visible.set(false);
                this.emit(PopupEvent::Hidden);
            }
        }
        .boxed_local()
    }

    /// 最近一次请求已被取消
    fn stalled(&self) -> bool {
        self.cancel
            .borrow()
            .as_ref()
            .is_some_and(CancelSource::is_cancelled)
    }

    /// 换上新的取消源并取消上一个，返回新令牌
    fn roll_token(&self, parent: Option<&CancelToken>) -> CancelToken {
        let source = match parent {
            Some(parent) => CancelSource::child_of(parent),
            None => CancelSource::new(),
        };
        let token = source.token();
        if let Some(previous) = self.cancel.replace(Some(source)) {
            previous.cancel();
        }
        token
    }

    fn subscribe(self: &Rc<Self>) {
        if self.subscribed.replace(true) {
            return;
        }
        if let Some(button) = &self.close_button {
            let popup = Rc::downgrade(self);
            button.attach(move || {
                let Some(popup) = popup.upgrade() else {
                    return;
                };
                match popup.registry() {
                    Some(registry) => {
                        registry.hide_popup(&popup);
                    }
                    None => LogType::default().report(PopupError::NotInitialized {
                        popup: popup.name.clone(),
                    }),
                }
            });
        }
    }

    fn unsubscribe(&self) {
        if !self.subscribed.replace(false) {
            return;
        }
        if let Some(button) = &self.close_button {
            button.detach();
        }
    }

    fn emit(&self, event: PopupEvent) {
        let listeners = self.listeners.borrow().clone();
        for listener in listeners {
            listener(self, event);
        }
    }
}

impl Drop for PopupEntity {
    fn drop(&mut self) {
        if let Some(source) = self.cancel.get_mut().take() {
            source.cancel();
        }
        if let Some(registry) = self.registry.get_mut().upgrade() {
            registry.unregister_id(self.id);
        }
    }
}

/// [`PopupEntity`] 构建器
pub struct PopupBuilder {
    name: String,
    widget: Rc<dyn Widget>,
    layer: Layer,
    manual_init: bool,
    visible: bool,
    show_display: Option<DisplayBinding>,
    hide_display: Option<DisplayBinding>,
    deep_popups: Vec<Rc<PopupEntity>>,
    show_keys: Vec<Key>,
    hide_keys: Vec<Key>,
    close_button: Option<CloseButton>,
}

impl PopupBuilder {
    pub fn new(widget: Rc<dyn Widget>) -> Self {
        Self {
            name: widget.name(),
            widget,
            layer: Layer::empty(),
            manual_init: false,
            visible: false,
            show_display: None,
            hide_display: None,
            deep_popups: Vec::new(),
            show_keys: Vec::new(),
            hide_keys: Vec::new(),
            close_button: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn layer(mut self, layer: Layer) -> Self {
        self.layer = layer;
        self
    }

    /// 不随 `attach` 自动初始化，需手动调用 [`PopupEntity::init`]
    pub fn manual_init(mut self, manual: bool) -> Self {
        self.manual_init = manual;
        self
    }

    /// 初始即处于显示状态
    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn show_display(mut self, binding: DisplayBinding) -> Self {
        self.show_display = Some(binding);
        self
    }

    pub fn hide_display(mut self, binding: DisplayBinding) -> Self {
        self.hide_display = Some(binding);
        self
    }

    pub fn deep_popup(mut self, child: Rc<PopupEntity>) -> Self {
        self.deep_popups.push(child);
        self
    }

    pub fn show_key(mut self, key: impl Into<Key>) -> Self {
        self.show_keys.push(key.into());
        self
    }

    pub fn hide_key(mut self, key: impl Into<Key>) -> Self {
        self.hide_keys.push(key.into());
        self
    }

    pub fn close_button(mut self, button: CloseButton) -> Self {
        self.close_button = Some(button);
        self
    }

    pub fn build(self) -> Rc<PopupEntity> {
        let popup = Rc::new(PopupEntity {
            id: PopupId::next(),
            name: self.name,
            layer: Cell::new(self.layer),
            manual_init: self.manual_init,
            widget: self.widget,
            deep_popups: RefCell::new(Vec::new()),
            parent: RefCell::new(Weak::new()),
            show_display: RefCell::new(self.show_display),
            hide_display: RefCell::new(self.hide_display),
            is_be_visible: Cell::new(self.visible),
            is_visible: Cell::new(self.visible),
            subscribed: Cell::new(false),
            show_keys: self.show_keys,
            hide_keys: self.hide_keys,
            cancel: RefCell::new(None),
            listeners: RefCell::new(Vec::new()),
            close_button: self.close_button,
            registry: RefCell::new(WeakRegistry::default()),
            initialized: Cell::new(false),
        });
        for child in self.deep_popups {
            popup.add_deep_popup(child);
        }
        popup
    }
}
