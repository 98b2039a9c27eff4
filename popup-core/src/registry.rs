//! # Registry 模块
//!
//! 弹窗注册表：所有存活弹窗与显示方式实例的上下文对象。
//!
//! ## 职责
//!
//! 1. 持有弹窗的弱引用集合，并按（是否在激活场景，层级深度降序）排序
//! 2. 按类型缓存显示方式的唯一实例（享元）
//! 3. 按图层解析弹窗集合，并发地扇出显示/隐藏，等待全部结束
//! 4. 维护一个滚动的顶层操作：每个顶层入口都会取消上一个仍在进行的顶层操作
//!
//! 公开入口从不返回错误，也不会 panic：配置错误按 `LogType` 记录后吞掉。
//!
//! ```rust,ignore
//! let mut runtime = PopupRuntime::new(settings);
//! let registry = runtime.registry().clone();
//! registry.attach(&menu);
//! registry.layer_show(Layer::MENU);
//! runtime.advance_for(1.0, 1.0 / 60.0);
//! ```

use std::any::{Any, TypeId};
use std::cell::{Ref, RefCell};
use std::cmp::Reverse;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::rc::{Rc, Weak};

use futures::executor::LocalSpawner;
use futures::future::{self, FutureExt, LocalBoxFuture};
use tracing::debug;

use crate::cancel::{CancelSource, CancelToken};
use crate::clock::FrameClock;
use crate::config::PopupSettings;
use crate::display::{DisplayBinding, DisplayStrategy};
use crate::error::{PopupError, PopupResult};
use crate::layer::Layer;
use crate::operation::Operation;
use crate::popup::{PopupEntity, PopupId, TransitionRequest};

struct RegistryInner {
    /// 已注册的弹窗（按排序规则排列）
    popups: RefCell<Vec<(PopupId, Weak<PopupEntity>)>>,
    /// 显示方式享元缓存（TypeId -> Rc<T>）
    displays: RefCell<HashMap<TypeId, Rc<dyn Any>>>,
    /// 当前的顶层操作
    current: RefCell<Option<Operation>>,
    /// 设置快照
    settings: RefCell<PopupSettings>,
    clock: FrameClock,
    spawner: LocalSpawner,
}

/// 弹窗注册表（克隆后共享同一份状态）
#[derive(Clone)]
pub struct PopupRegistry {
    inner: Rc<RegistryInner>,
}

/// 注册表的弱引用，弹窗用它回指注册表
#[derive(Clone, Default)]
pub struct WeakRegistry {
    inner: Weak<RegistryInner>,
}

impl WeakRegistry {
    pub fn upgrade(&self) -> Option<PopupRegistry> {
        self.inner.upgrade().map(|inner| PopupRegistry { inner })
    }
}

impl fmt::Debug for PopupRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PopupRegistry")
            .field("popups", &self.inner.popups.borrow().len())
            .field("displays", &self.inner.displays.borrow().len())
            .field("current", &*self.inner.current.borrow())
            .finish()
    }
}

impl PopupRegistry {
    /// 创建注册表
    ///
    /// # 参数
    /// - `spawner`: 协作式执行器，所有动画任务都投递到这里
    /// - `clock`: 帧时钟
    /// - `settings`: 设置快照
    pub fn new(spawner: LocalSpawner, clock: FrameClock, settings: PopupSettings) -> Self {
        Self {
            inner: Rc::new(RegistryInner {
                popups: RefCell::new(Vec::new()),
                displays: RefCell::new(HashMap::new()),
                current: RefCell::new(None),
                settings: RefCell::new(settings),
                clock,
                spawner,
            }),
        }
    }

    pub fn downgrade(&self) -> WeakRegistry {
        WeakRegistry {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn clock(&self) -> FrameClock {
        self.inner.clock.clone()
    }

    pub fn spawner(&self) -> &LocalSpawner {
        &self.inner.spawner
    }

    // ========== 设置 ==========

    /// 当前设置快照
    pub fn settings(&self) -> Ref<'_, PopupSettings> {
        self.inner.settings.borrow()
    }

    /// 替换设置快照
    pub fn refresh_settings(&self, settings: PopupSettings) {
        debug!(?settings, "刷新弹窗设置");
        *self.inner.settings.borrow_mut() = settings;
    }

    /// 按设置的级别记录配置错误
    pub fn report(&self, error: &PopupError) {
        let log_type = self.settings().log_type;
        log_type.report(error);
    }

    // ========== 注册 ==========

    /// 注册弹窗（幂等），注册后重新排序
    pub fn register(&self, popup: &Rc<PopupEntity>) {
        let mut popups = self.inner.popups.borrow_mut();
        popups.retain(|(_, weak)| weak.strong_count() > 0);
        if popups.iter().any(|(id, _)| *id == popup.id()) {
            return;
        }
        popups.push((popup.id(), Rc::downgrade(popup)));

        // 稳定排序：激活场景在前，同组内层级越深越靠前
        popups.sort_by_cached_key(|(_, weak)| match weak.upgrade() {
            Some(p) => (
                !p.widget().in_active_scene(),
                Reverse(p.widget().hierarchy_depth()),
            ),
            None => (true, Reverse(0)),
        });
        debug!(popup = %popup.name(), total = popups.len(), "弹窗已注册");
    }

    /// 注销弹窗（幂等）
    pub fn unregister(&self, popup: &PopupEntity) {
        self.unregister_id(popup.id());
    }

    pub(crate) fn unregister_id(&self, id: PopupId) {
        // 弹窗可能在遍历注册表的过程中析构，此时交给下一次清理
        let Ok(mut popups) = self.inner.popups.try_borrow_mut() else {
            return;
        };
        let before = popups.len();
        popups.retain(|(pid, weak)| *pid != id && weak.strong_count() > 0);
        if popups.len() != before {
            debug!(%id, "弹窗已注销");
        }
    }

    /// 挂载弹窗及其深层子弹窗：非手动初始化的弹窗立即初始化
    pub fn attach(&self, popup: &Rc<PopupEntity>) {
        if popup.manual_init() {
            debug!(popup = %popup.name(), "弹窗等待手动初始化");
        } else {
            popup.init(self);
        }
        for child in popup.deep_popups() {
            self.attach(&child);
        }
    }

    /// 按注册表顺序列出所有存活弹窗
    pub fn popups(&self) -> Vec<Rc<PopupEntity>> {
        self.inner
            .popups
            .borrow()
            .iter()
            .filter_map(|(_, weak)| weak.upgrade())
            .collect()
    }

    /// 与 `layer` 有交集的弹窗
    pub fn popups_in(&self, layer: Layer) -> Vec<Rc<PopupEntity>> {
        self.popups()
            .into_iter()
            .filter(|p| p.layer().overlaps(layer))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner
            .popups
            .borrow()
            .iter()
            .filter(|(_, weak)| weak.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ========== 显示方式 ==========

    /// 显示方式享元：已缓存则返回缓存的实例，否则创建并缓存
    pub fn display<T: DisplayStrategy>(&self) -> Rc<T> {
        let mut displays = self.inner.displays.borrow_mut();
        if let Some(existing) = displays.get(&TypeId::of::<T>()) {
            if let Ok(display) = Rc::clone(existing).downcast::<T>() {
                return display;
            }
        }
        let display = Rc::new(T::default());
        displays.insert(TypeId::of::<T>(), Rc::clone(&display) as Rc<dyn Any>);
        debug!(display = T::NAME, "创建显示方式实例");
        display
    }

    /// 享元实例 + 设置
    pub fn binding<T: DisplayStrategy>(&self, settings: T::Settings) -> DisplayBinding {
        DisplayBinding::new(self.display::<T>(), settings)
    }

    /// 享元实例 + 默认设置
    pub fn default_binding<T: DisplayStrategy>(&self) -> DisplayBinding {
        self.binding::<T>(T::Settings::default())
    }

    fn request_as<T: DisplayStrategy>(&self, settings: Option<T::Settings>) -> TransitionRequest {
        TransitionRequest::new().with_display(self.binding::<T>(settings.unwrap_or_default()))
    }

    // ========== 顶层操作 ==========

    /// 当前（或最近一次）的顶层操作
    pub fn current(&self) -> Option<Operation> {
        self.inner.current.borrow().clone()
    }

    /// 取消当前的顶层操作
    pub fn cancel_current(&self) {
        let previous = self.inner.current.borrow_mut().take();
        if let Some(previous) = previous {
            previous.cancel();
        }
    }

    /// 开始新的顶层操作：取消上一个，再以新的取消源投递
    fn begin<F, Fut>(&self, parent: Option<CancelToken>, work: F) -> Operation
    where
        F: FnOnce(&PopupRegistry, CancelToken) -> Fut,
        Fut: Future<Output = PopupResult<()>> + 'static,
    {
        self.cancel_current();
        let source = parent.as_ref().map(CancelSource::child_of);
        let operation = Operation::spawn(&self.inner.spawner, source, |token| work(self, token));

        // 同步部分里由事件监听发起的顶层操作被本操作顶替，同样要取消
        let displaced = self.inner.current.replace(Some(operation.clone()));
        if let Some(displaced) = displaced {
            debug!("取消同步前置期间发起的顶层操作");
            displaced.cancel();
        }
        operation
    }

    /// 解析图层；没有匹配时记录错误并返回空集合
    fn resolve(&self, layer: Layer) -> Vec<Rc<PopupEntity>> {
        let popups = self.popups_in(layer);
        if popups.is_empty() {
            self.report(&PopupError::EmptyLayer { layer });
        }
        popups
    }

    /// 显示图层中的弹窗
    pub fn show(&self, layer: Layer) -> Operation {
        self.show_with(layer, TransitionRequest::new())
    }

    /// 以 `T` 覆盖缓存的显示方式来显示图层
    pub fn show_as<T: DisplayStrategy>(
        &self,
        layer: Layer,
        settings: Option<T::Settings>,
    ) -> Operation {
        self.show_with(layer, self.request_as::<T>(settings))
    }

    pub fn show_with(&self, layer: Layer, request: TransitionRequest) -> Operation {
        debug!(?layer, "显示图层");
        self.begin(request.token.clone(), move |registry, token| {
            fan_out(&registry.resolve(layer), &request.with_token(token), true)
        })
    }

    /// 隐藏图层中的弹窗
    pub fn hide(&self, layer: Layer) -> Operation {
        self.hide_with(layer, TransitionRequest::new())
    }

    pub fn hide_as<T: DisplayStrategy>(
        &self,
        layer: Layer,
        settings: Option<T::Settings>,
    ) -> Operation {
        self.hide_with(layer, self.request_as::<T>(settings))
    }

    pub fn hide_with(&self, layer: Layer, request: TransitionRequest) -> Operation {
        debug!(?layer, "隐藏图层");
        self.begin(request.token.clone(), move |registry, token| {
            fan_out(&registry.resolve(layer), &request.with_token(token), false)
        })
    }

    /// 切换到图层：先隐藏其它图层的弹窗，未被取消且应用仍在运行时再显示该图层
    pub fn layer_show(&self, layer: Layer) -> Operation {
        self.layer_show_with(layer, TransitionRequest::new())
    }

    pub fn layer_show_as<T: DisplayStrategy>(
        &self,
        layer: Layer,
        settings: Option<T::Settings>,
    ) -> Operation {
        self.layer_show_with(layer, self.request_as::<T>(settings))
    }

    pub fn layer_show_with(&self, layer: Layer, request: TransitionRequest) -> Operation {
        debug!(?layer, "切换图层");
        self.begin(request.token.clone(), move |registry, token| {
            let request = request.with_token(token.clone());
            let others: Vec<_> = registry
                .popups()
                .into_iter()
                .filter(|p| !p.layer().overlaps(layer))
                .collect();
            let hide_phase = fan_out(&others, &request, false);

            let registry = registry.clone();
            async move {
                hide_phase.await?;
                if token.is_cancelled() || !registry.inner.clock.is_running() {
                    debug!(?layer, "切换图层在隐藏阶段后中止");
                    return Ok(());
                }
                fan_out(&registry.resolve(layer), &request, true).await
            }
        })
    }

    /// 隐藏所有弹窗
    pub fn hide_all(&self) -> Operation {
        self.hide_all_with(TransitionRequest::new())
    }

    pub fn hide_all_as<T: DisplayStrategy>(&self, settings: Option<T::Settings>) -> Operation {
        self.hide_all_with(self.request_as::<T>(settings))
    }

    pub fn hide_all_with(&self, request: TransitionRequest) -> Operation {
        debug!("隐藏所有弹窗");
        self.begin(request.token.clone(), move |registry, token| {
            fan_out(&registry.popups(), &request.with_token(token), false)
        })
    }

    // ========== 单个弹窗 ==========

    /// 显示单个弹窗（不参与顶层操作的滚动取消）
    pub fn show_popup(&self, popup: &Rc<PopupEntity>) -> Operation {
        self.show_popup_with(popup, TransitionRequest::new())
    }

    pub fn show_popup_with(&self, popup: &Rc<PopupEntity>, request: TransitionRequest) -> Operation {
        self.popup_operation(popup, request, true)
    }

    /// 隐藏单个弹窗（不参与顶层操作的滚动取消）
    pub fn hide_popup(&self, popup: &Rc<PopupEntity>) -> Operation {
        self.hide_popup_with(popup, TransitionRequest::new())
    }

    pub fn hide_popup_with(&self, popup: &Rc<PopupEntity>, request: TransitionRequest) -> Operation {
        self.popup_operation(popup, request, false)
    }

    fn popup_operation(
        &self,
        popup: &Rc<PopupEntity>,
        request: TransitionRequest,
        visible: bool,
    ) -> Operation {
        let source = request.token.as_ref().map(CancelSource::child_of);
        Operation::spawn(&self.inner.spawner, source, |token| {
            fan_out(std::slice::from_ref(popup), &request.with_token(token), visible)
        })
    }
}

/// 对每个弹窗同步执行前置，返回等待全部结束的 future
fn fan_out(
    popups: &[Rc<PopupEntity>],
    request: &TransitionRequest,
    visible: bool,
) -> LocalBoxFuture<'static, PopupResult<()>> {
    let transitions: Vec<_> = popups
        .iter()
        .map(|popup| {
            if visible {
                popup.show(request.clone())
            } else {
                popup.hide(request.clone())
            }
        })
        .collect();
    async move {
        future::join_all(transitions).await;
        Ok(())
    }
    .boxed_local()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{Fade, Scale};
    use crate::runtime::PopupRuntime;
    use crate::widget::SimpleWidget;

    fn popup_at(depth: usize, active: bool) -> Rc<PopupEntity> {
        let widget = SimpleWidget::new(format!("depth{depth}"))
            .with_depth(depth)
            .in_scene(active);
        PopupEntity::builder(widget.shared()).layer(Layer::HUB).build()
    }

    #[test]
    fn test_register_is_idempotent() {
        let runtime = PopupRuntime::new(PopupSettings::default());
        let registry = runtime.registry();
        let popup = popup_at(0, true);

        registry.register(&popup);
        registry.register(&popup);
        assert_eq!(registry.len(), 1);

        registry.unregister(&popup);
        registry.unregister(&popup);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_order_groups_scene_then_depth() {
        let runtime = PopupRuntime::new(PopupSettings::default());
        let registry = runtime.registry();
        let background = popup_at(5, false);
        let shallow = popup_at(0, true);
        let deep = popup_at(3, true);

        for popup in [&background, &shallow, &deep] {
            registry.register(popup);
        }

        let order: Vec<_> = registry.popups().iter().map(|p| p.id()).collect();
        assert_eq!(order, vec![deep.id(), shallow.id(), background.id()]);
    }

    #[test]
    fn test_display_flyweight() {
        let runtime = PopupRuntime::new(PopupSettings::default());
        let registry = runtime.registry();

        let a = registry.display::<Fade>();
        let b = registry.display::<Fade>();
        assert!(Rc::ptr_eq(&a, &b));

        let _ = registry.display::<Scale>();
        assert_eq!(registry.inner.displays.borrow().len(), 2);
    }

    #[test]
    fn test_refresh_settings() {
        let runtime = PopupRuntime::new(PopupSettings::default());
        let registry = runtime.registry();
        assert!(registry.settings().key_event_system_enabled);

        registry.refresh_settings(PopupSettings {
            key_event_system_enabled: false,
            ..PopupSettings::default()
        });
        assert!(!registry.settings().key_event_system_enabled);
    }

    #[test]
    fn test_empty_layer_completes() {
        let mut runtime = PopupRuntime::new(PopupSettings::default());
        let op = runtime.registry().show(Layer::OVERLAY);
        runtime.run_until_stalled();
        assert!(op.is_finished());
    }

    #[test]
    fn test_manual_init_is_skipped_by_attach() {
        let runtime = PopupRuntime::new(PopupSettings::default());
        let registry = runtime.registry();
        let popup = PopupEntity::builder(SimpleWidget::new("manual").shared())
            .manual_init(true)
            .build();

        registry.attach(&popup);
        assert!(!popup.is_initialized());
        assert!(registry.is_empty());

        popup.init(registry);
        assert_eq!(registry.len(), 1);
    }
}
