//! # Math 模块
//!
//! 过渡动画用到的二维向量和插值。

use std::ops::{Add, Mul};

/// 二维向量
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    /// 零向量
    pub const ZERO: Self = Self::new(0.0, 0.0);

    /// 单位向量 (1, 1)
    pub const ONE: Self = Self::new(1.0, 1.0);

    /// 创建新的向量
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// 线性插值（不截断 `t`，允许回弹类曲线越界）
    pub fn lerp_unclamped(self, other: Self, t: f32) -> Self {
        Self {
            x: lerp_unclamped(self.x, other.x, t),
            y: lerp_unclamped(self.y, other.y, t),
        }
    }
}

impl Add for Vec2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

/// 标量线性插值（不截断 `t`）
pub fn lerp_unclamped(from: f32, to: f32, t: f32) -> f32 {
    from + (to - from) * t
}
