//! # Widget 模块
//!
//! 弹窗根节点的抽象接口。
//!
//! 核心不假设具体的 UI 框架：宿主把自己的节点（根变换 + CanvasGroup + Canvas 祖先）
//! 包装成 [`Widget`]，显示方式只通过这里的 getter/setter 读写视觉状态。
//!
//! ## 设计说明
//!
//! setter 都取 `&self`，由实现方负责内部可变性（`Rc<RefCell<T>>` 模式），
//! 这样同一个节点可以同时被多个动画任务持有。

use std::cell::{Ref, RefCell};
use std::rc::Rc;

use crate::math::Vec2;

/// Canvas 渲染模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// 屏幕空间（覆盖层）
    #[default]
    ScreenSpaceOverlay,
    /// 屏幕空间（相机）
    ScreenSpaceCamera,
    /// 世界空间
    WorldSpace,
}

impl RenderMode {
    pub fn is_screen_space(self) -> bool {
        !matches!(self, RenderMode::WorldSpace)
    }
}

/// 最近的 Canvas 祖先信息
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasInfo {
    /// Canvas 尺寸
    pub size: Vec2,
    /// 渲染模式
    pub render_mode: RenderMode,
}

impl CanvasInfo {
    /// 屏幕空间 Canvas
    pub fn screen_space(width: f32, height: f32) -> Self {
        Self {
            size: Vec2::new(width, height),
            render_mode: RenderMode::ScreenSpaceOverlay,
        }
    }

    /// 世界空间 Canvas
    pub fn world_space(width: f32, height: f32) -> Self {
        Self {
            size: Vec2::new(width, height),
            render_mode: RenderMode::WorldSpace,
        }
    }
}

/// 弹窗根节点接口
pub trait Widget: 'static {
    /// 节点名称（日志用）
    fn name(&self) -> String;

    /// CanvasGroup 的透明度；没有 CanvasGroup 时返回 `None`
    fn alpha(&self) -> Option<f32>;

    /// 设置透明度（没有 CanvasGroup 时忽略）
    fn set_alpha(&self, alpha: f32);

    /// 设置是否可交互（没有 CanvasGroup 时忽略）
    fn set_interactable(&self, interactable: bool);

    /// 设置是否阻挡射线（没有 CanvasGroup 时忽略）
    fn set_blocks_raycasts(&self, blocks: bool);

    /// 本地缩放
    fn scale(&self) -> Vec2;

    fn set_scale(&self, scale: Vec2);

    /// 本地位置（相对 Canvas 中心）
    fn local_position(&self) -> Vec2;

    fn set_local_position(&self, position: Vec2);

    /// 节点自身尺寸
    fn size(&self) -> Vec2;

    /// 最近的 Canvas 祖先
    fn canvas(&self) -> Option<CanvasInfo>;

    /// 在场景层级中的深度（根节点为 0）
    fn hierarchy_depth(&self) -> usize;

    /// 是否属于当前激活的场景
    fn in_active_scene(&self) -> bool;
}

/// [`SimpleWidget`] 的状态
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetState {
    pub name: String,
    /// CanvasGroup 透明度，`None` 表示没有 CanvasGroup
    pub alpha: Option<f32>,
    pub interactable: bool,
    pub blocks_raycasts: bool,
    pub scale: Vec2,
    pub position: Vec2,
    pub size: Vec2,
    pub canvas: Option<CanvasInfo>,
    pub depth: usize,
    pub active_scene: bool,
}

/// 内存中的 [`Widget`] 实现
///
/// 使用 `Rc<RefCell<WidgetState>>` 保存状态，克隆后共享同一个节点。
/// 供无渲染宿主（命令行模拟器）和测试使用。
#[derive(Debug, Clone)]
pub struct SimpleWidget {
    state: Rc<RefCell<WidgetState>>,
}

impl SimpleWidget {
    /// 创建节点：带 CanvasGroup（透明度 0，不可交互），位于 1920x1080 的屏幕空间 Canvas 下
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            state: Rc::new(RefCell::new(WidgetState {
                name: name.into(),
                alpha: Some(0.0),
                interactable: false,
                blocks_raycasts: false,
                scale: Vec2::ONE,
                position: Vec2::ZERO,
                size: Vec2::new(400.0, 300.0),
                canvas: Some(CanvasInfo::screen_space(1920.0, 1080.0)),
                depth: 0,
                active_scene: true,
            })),
        }
    }

    /// 设置初始透明度
    pub fn with_alpha(self, alpha: f32) -> Self {
        self.state.borrow_mut().alpha = Some(alpha);
        self
    }

    /// 移除 CanvasGroup
    pub fn without_canvas_group(self) -> Self {
        self.state.borrow_mut().alpha = None;
        self
    }

    /// 设置 Canvas 祖先（`None` 表示没有）
    pub fn with_canvas(self, canvas: Option<CanvasInfo>) -> Self {
        self.state.borrow_mut().canvas = canvas;
        self
    }

    pub fn with_size(self, width: f32, height: f32) -> Self {
        self.state.borrow_mut().size = Vec2::new(width, height);
        self
    }

    pub fn with_scale(self, scale: Vec2) -> Self {
        self.state.borrow_mut().scale = scale;
        self
    }

    pub fn with_position(self, position: Vec2) -> Self {
        self.state.borrow_mut().position = position;
        self
    }

    pub fn with_depth(self, depth: usize) -> Self {
        self.state.borrow_mut().depth = depth;
        self
    }

    /// 设置是否属于激活场景
    pub fn in_scene(self, active: bool) -> Self {
        self.state.borrow_mut().active_scene = active;
        self
    }

    /// 读取当前状态
    pub fn state(&self) -> Ref<'_, WidgetState> {
        self.state.borrow()
    }

    /// 作为 trait object 共享
    pub fn shared(&self) -> Rc<dyn Widget> {
        Rc::new(self.clone())
    }
}

impl Widget for SimpleWidget {
    fn name(&self) -> String {
        self.state.borrow().name.clone()
    }

    fn alpha(&self) -> Option<f32> {
        self.state.borrow().alpha
    }

    fn set_alpha(&self, alpha: f32) {
        let mut state = self.state.borrow_mut();
        if state.alpha.is_some() {
            state.alpha = Some(alpha);
        }
    }

    fn set_interactable(&self, interactable: bool) {
        let mut state = self.state.borrow_mut();
        if state.alpha.is_some() {
            state.interactable = interactable;
        }
    }

    fn set_blocks_raycasts(&self, blocks: bool) {
        let mut state = self.state.borrow_mut();
        if state.alpha.is_some() {
            state.blocks_raycasts = blocks;
        }
    }

    fn scale(&self) -> Vec2 {
        self.state.borrow().scale
    }

    fn set_scale(&self, scale: Vec2) {
        self.state.borrow_mut().scale = scale;
    }

    fn local_position(&self) -> Vec2 {
        self.state.borrow().position
    }

    fn set_local_position(&self, position: Vec2) {
        self.state.borrow_mut().position = position;
    }

    fn size(&self) -> Vec2 {
        self.state.borrow().size
    }

    fn canvas(&self) -> Option<CanvasInfo> {
        self.state.borrow().canvas
    }

    fn hierarchy_depth(&self) -> usize {
        self.state.borrow().depth
    }

    fn in_active_scene(&self) -> bool {
        self.state.borrow().active_scene
    }
}
