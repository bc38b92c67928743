//! # 数据源与中间模型
//!
//! ## 设计思路
//!
//! 将“外部输入”和“流水线产物”解耦：
//! - `Frame` 表示宿主截取到的只读画面，可跨线程共享
//! - `Insets` 表示单次模糊所用的系统栏/标题栏占位
//! - `BackdropImage` 表示可直接交给宿主展示的模糊结果

use std::sync::Arc;

use image::{ColorType, DynamicImage, RgbaImage};

use super::host::InsetProvider;
use super::BackdropError;

/// 截取到的画面。
///
/// 内部使用 `Arc` 共享像素，克隆成本为常数；流水线只读不写。
#[derive(Debug, Clone)]
pub struct Frame {
    image: Arc<DynamicImage>,
}

impl Frame {
    pub fn new(image: DynamicImage) -> Self {
        Self {
            image: Arc::new(image),
        }
    }

    /// 由 RGBA8 原始字节构造。字节长度必须等于 `width * height * 4`。
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, BackdropError> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|count| count.checked_mul(4))
            .ok_or_else(|| BackdropError::Capture("画面尺寸溢出".to_string()))?;

        if pixels.len() != expected {
            return Err(BackdropError::Capture(format!(
                "像素长度异常：{}（期望 {}）",
                pixels.len(),
                expected
            )));
        }

        let buffer = RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| BackdropError::Capture("无法构建 RGBA 画面".to_string()))?;
        Ok(Self::new(DynamicImage::ImageRgba8(buffer)))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// 颜色深度。
    pub fn color_type(&self) -> ColorType {
        self.image.color()
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }
}

/// 单次模糊使用的占位高度（像素）。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Insets {
    pub chrome_height: u32,
    pub status_bar_height: u32,
    pub bottom_bar_height: u32,
}

impl Insets {
    pub fn new(chrome_height: u32, status_bar_height: u32, bottom_bar_height: u32) -> Self {
        Self {
            chrome_height,
            status_bar_height,
            bottom_bar_height,
        }
    }

    /// 从宿主环境读取一次占位信息。
    ///
    /// 状态栏半透明或窗口全屏时，状态栏高度视为 0。
    pub fn from_provider(provider: &dyn InsetProvider) -> Self {
        let status_bar_height =
            if provider.is_status_bar_translucent() || provider.is_fullscreen() {
                0
            } else {
                provider.status_bar_height()
            };

        Self {
            chrome_height: provider.chrome_height(),
            status_bar_height,
            bottom_bar_height: provider.bottom_bar_height(),
        }
    }
}

/// 背景在 overlay 中的对齐方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gravity {
    Top,
}

/// 宿主展示背景时建议的缩放方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleHint {
    FitCenter,
}

/// 模糊完成后的背景图及摆放信息。
#[derive(Debug, Clone)]
pub struct BackdropImage {
    image: RgbaImage,
    top_margin: u32,
    gravity: Gravity,
    scale: ScaleHint,
    dim: bool,
    animation_duration_ms: u64,
}

impl BackdropImage {
    pub(crate) fn new(image: RgbaImage, top_margin: u32, dim: bool, animation_duration_ms: u64) -> Self {
        Self {
            image,
            top_margin,
            gravity: Gravity::Top,
            scale: ScaleHint::FitCenter,
            dim,
            animation_duration_ms,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// 背景距 overlay 顶部的外边距，使其恰好位于未模糊的标题栏下方。
    pub fn top_margin(&self) -> u32 {
        self.top_margin
    }

    pub fn gravity(&self) -> Gravity {
        self.gravity
    }

    pub fn scale(&self) -> ScaleHint {
        self.scale
    }

    pub fn dim(&self) -> bool {
        self.dim
    }

    pub fn animation_duration_ms(&self) -> u64 {
        self.animation_duration_ms
    }
}
