//! # Config 模块
//!
//! 弹窗系统设置的持久化与日志级别策略。
//!
//! 设置文件是一个很小的 JSON 对象，字段名与编辑器写出的格式一致（PascalCase）。
//! 核心只消费其中的 `KeyEventSystemEnabled` 和 `LogType` 两项快照：
//! 启动时读取一次，之后只在显式刷新时替换。

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

/// 默认设置文件路径（相对于项目根目录）
pub const DEFAULT_SETTINGS_PATH: &str = "settings/popup_settings.json";

/// 配置错误的记录级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogType {
    /// 以 error 级别记录
    #[default]
    Error,
    /// 以 warn 级别记录
    Warning,
    /// 以 info 级别记录
    #[serde(alias = "Log")]
    Info,
}

impl LogType {
    /// 按当前级别记录一条配置错误
    pub fn report(self, message: impl fmt::Display) {
        match self {
            LogType::Error => error!("{message}"),
            LogType::Warning => warn!("{message}"),
            LogType::Info => info!("{message}"),
        }
    }

    /// 对应的 tracing 级别
    pub fn level(self) -> tracing::Level {
        match self {
            LogType::Error => tracing::Level::ERROR,
            LogType::Warning => tracing::Level::WARN,
            LogType::Info => tracing::Level::INFO,
        }
    }
}

/// 弹窗系统设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PopupSettings {
    /// 编辑器中是否显示自定义图标（核心不使用）
    #[serde(default = "default_true")]
    pub custom_icons_enabled: bool,

    /// 是否启用热键轮询
    #[serde(default = "default_true")]
    pub key_event_system_enabled: bool,

    /// 配置错误的记录级别
    #[serde(default)]
    pub log_type: LogType,
}

fn default_true() -> bool {
    true
}

impl Default for PopupSettings {
    fn default() -> Self {
        Self {
            custom_icons_enabled: true,
            key_event_system_enabled: true,
            log_type: LogType::default(),
        }
    }
}

impl PopupSettings {
    /// 加载设置文件
    ///
    /// - 文件不存在：写出默认设置并返回默认值
    /// - 读取或解析失败：打印警告并返回默认值
    pub fn load_or_create(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            let settings = Self::default();
            match settings.save(path) {
                Ok(()) => info!(path = ?path, "设置文件不存在，已写出默认设置"),
                Err(e) => warn!(path = ?path, error = %e, "写出默认设置失败"),
            }
            return settings;
        }

        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!(path = ?path, error = %e, "设置文件解析失败，使用默认设置");
                    Self::default()
                }
            },
            Err(e) => {
                warn!(path = ?path, error = %e, "设置文件读取失败，使用默认设置");
                Self::default()
            }
        }
    }

    /// 保存设置到文件（自动创建父目录）
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, json)?;

        Ok(())
    }
}

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 序列化失败
    #[error("设置序列化失败: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO 错误
    #[error("设置 IO 错误: {0}")]
    Io(#[from] std::io::Error),
}
