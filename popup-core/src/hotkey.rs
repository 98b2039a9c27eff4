//! # Hotkey 模块
//!
//! 弹窗快捷键轮询。
//!
//! 宿主每帧把本帧按下的键交给 [`PopupRegistry::poll_hotkeys`]：
//! 按注册表顺序找到第一个按键匹配、且祖先弹窗全部可见的弹窗，
//! 对它执行显示或隐藏。每帧最多触发一次。

use std::collections::HashSet;
use std::fmt;

use tracing::debug;

use crate::popup::PopupId;
use crate::registry::PopupRegistry;

/// 键名
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key(String);

impl Key {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// 输入源：查询某个键本帧是否被按下
pub trait KeyInput {
    fn is_pressed(&self, key: &Key) -> bool;
}

/// 本帧按下的键集合
#[derive(Debug, Clone, Default)]
pub struct PressedKeys {
    keys: HashSet<Key>,
}

impl PressedKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, key: impl Into<Key>) {
        self.keys.insert(key.into());
    }

    /// 帧末清空
    pub fn clear(&mut self) {
        self.keys.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl<K: Into<Key>> FromIterator<K> for PressedKeys {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl KeyInput for PressedKeys {
    fn is_pressed(&self, key: &Key) -> bool {
        self.keys.contains(key)
    }
}

/// 快捷键触发的动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyAction {
    Show(PopupId),
    Hide(PopupId),
}

impl PopupRegistry {
    /// 轮询快捷键
    ///
    /// 未开启 `KeyEventSystemEnabled` 时直接返回 `None`。
    pub fn poll_hotkeys(&self, input: &impl KeyInput) -> Option<HotkeyAction> {
        if !self.settings().key_event_system_enabled {
            return None;
        }

        for popup in self.popups() {
            if !popup.ancestors_visible() {
                continue;
            }

            if !popup.is_be_visible() && popup.show_keys().iter().any(|k| input.is_pressed(k)) {
                debug!(popup = %popup.name(), "快捷键显示弹窗");
                self.show_popup(&popup);
                return Some(HotkeyAction::Show(popup.id()));
            }

            if popup.is_be_visible() && popup.hide_keys().iter().any(|k| input.is_pressed(k)) {
                debug!(popup = %popup.name(), "快捷键隐藏弹窗");
                self.hide_popup(&popup);
                return Some(HotkeyAction::Hide(popup.id()));
            }
        }
        None
    }
}
