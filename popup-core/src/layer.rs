//! # Layer 模块
//!
//! 图层是弹窗的位标记，一个弹窗可以同时属于多个图层，
//! 注册表按图层批量显示/隐藏弹窗。

use bitflags::bitflags;

bitflags! {
    /// 弹窗图层掩码
    ///
    /// 内置了几个常用图层；自定义图层用 [`Layer::custom`] 取剩余的位。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Layer: u32 {
        const HUB = 1 << 0;
        const MENU = 1 << 1;
        const GAME = 1 << 2;
        const DIALOG = 1 << 3;
        const OVERLAY = 1 << 4;
    }
}

impl Layer {
    /// 第 `index` 位对应的图层；超出 32 位时返回 `None`
    pub const fn custom(index: u32) -> Option<Self> {
        if index < u32::BITS {
            Some(Self::from_bits_retain(1 << index))
        } else {
            None
        }
    }

    /// 两个掩码是否有交集
    pub fn overlaps(self, other: Layer) -> bool {
        self.intersects(other)
    }
}
