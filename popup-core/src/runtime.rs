//! # Runtime 模块
//!
//! 无渲染宿主的驱动器：持有执行器、帧时钟和注册表。
//!
//! 每帧：宿主轮询输入 → [`PopupRuntime::advance`] 推进时钟并跑完所有就绪任务。

use futures::executor::LocalPool;
use tracing::{debug, trace};

use crate::clock::FrameClock;
use crate::config::PopupSettings;
use crate::hotkey::{HotkeyAction, KeyInput};
use crate::registry::PopupRegistry;

/// 帧驱动器
pub struct PopupRuntime {
    pool: LocalPool,
    clock: FrameClock,
    registry: PopupRegistry,
}

impl std::fmt::Debug for PopupRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PopupRuntime")
            .field("clock", &self.clock)
            .field("registry", &self.registry)
            .finish()
    }
}

impl PopupRuntime {
    /// 创建驱动器和它的注册表
    pub fn new(settings: PopupSettings) -> Self {
        let pool = LocalPool::new();
        let clock = FrameClock::new();
        let registry = PopupRegistry::new(pool.spawner(), clock.clone(), settings);
        Self {
            pool,
            clock,
            registry,
        }
    }

    pub fn registry(&self) -> &PopupRegistry {
        &self.registry
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    /// 跑完所有就绪任务（不推进时钟）
    pub fn run_until_stalled(&mut self) {
        self.pool.run_until_stalled();
    }

    /// 推进一帧
    pub fn advance(&mut self, dt: f32) {
        // 先让新投递的任务跑到第一个挂起点
        self.pool.run_until_stalled();
        self.clock.tick(dt);
        self.pool.run_until_stalled();
        trace!(frame = self.clock.frame(), dt, "帧推进");
    }

    /// 先轮询快捷键再推进一帧
    pub fn advance_with_input(&mut self, dt: f32, input: &impl KeyInput) -> Option<HotkeyAction> {
        let action = self.registry.poll_hotkeys(input);
        self.advance(dt);
        action
    }

    /// 以固定步长推进 `total` 秒，返回推进的帧数
    pub fn advance_for(&mut self, total: f32, dt: f32) -> u32 {
        if dt <= 0.0 {
            self.run_until_stalled();
            return 0;
        }
        let frames = (total / dt).ceil().max(0.0) as u32;
        for _ in 0..frames {
            self.advance(dt);
        }
        frames
    }

    /// 停止时钟：挂起的动画以“应用已停止”结束
    pub fn shutdown(&mut self) {
        debug!(frame = self.clock.frame(), "弹窗运行时关闭");
        self.registry.cancel_current();
        self.clock.stop();
        self.pool.run_until_stalled();
    }
}
