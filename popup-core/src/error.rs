//! # Error 模块
//!
//! 定义 popup-core 中使用的错误类型。
//!
//! 这些错误都不会越过注册表的公开接口：它们按 `LogType` 设置的级别记录后被吞掉，
//! 出错的弹窗只会提前结束自己的动画，不影响同一批次里的其它弹窗。

use thiserror::Error;

use crate::layer::Layer;

/// 弹窗系统错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PopupError {
    /// 缺少 CanvasGroup，无法控制透明度与交互
    #[error("弹窗 '{popup}' 缺少 CanvasGroup")]
    MissingCanvasGroup { popup: String },

    /// 滑动动画需要 Canvas 祖先节点
    #[error("弹窗 '{popup}' 没有 Canvas 祖先节点，无法计算滑动位置")]
    MissingCanvas { popup: String },

    /// 滑动动画只支持屏幕空间 Canvas
    #[error("弹窗 '{popup}' 所在的 Canvas 为世界空间渲染，滑动动画只支持屏幕空间")]
    WorldSpaceCanvas { popup: String },

    /// 显示方式收到了错误类型的设置
    #[error("显示方式 {display} 需要 {expected} 类型的设置")]
    SettingsMismatch {
        display: &'static str,
        expected: &'static str,
    },

    /// 图层查询没有匹配到任何弹窗
    #[error("图层 {layer:?} 没有匹配的弹窗")]
    EmptyLayer { layer: Layer },

    /// 弹窗没有可用的显示方式
    #[error("弹窗 '{popup}' 未配置{phase}显示方式")]
    MissingDisplay { popup: String, phase: &'static str },

    /// 弹窗尚未初始化（未绑定注册表）
    #[error("弹窗 '{popup}' 尚未初始化")]
    NotInitialized { popup: String },
}

/// Result 类型别名
pub type PopupResult<T> = Result<T, PopupError>;
