//! # 几何计算模块
//!
//! 计算截图中允许模糊的区域，以及降采样后的目标尺寸。
//!
//! # 设计思路
//!
//! - 算法纯函数化：输入为帧尺寸、视图尺寸、占位与配置，输出唯一的 `GeometryPlan`，
//!   不依赖真实显示环境即可测试。
//! - 顶部偏移 = 标题栏高度（`blur_chrome` 时为 0）+ 状态栏高度。
//! - 裁剪区域右侧与底部都减去底部系统栏高度。
//!
//! # 宽度公式
//!
//! 目标宽度沿用历史公式：
//!
//! ```text
//! height = ceil(view_h - top - bottom) / factor
//! width  = ceil((view_w - bottom) * height / view_h - top - bottom)
//! ```
//!
//! 宽度公式在“尺寸比例”上再减去像素偏移，量纲并不一致，得到的宽度明显偏窄。
//! 这里按原样复现，结果再由 `FitCenter` 拉伸展示；修正它会改变现有界面的观感。
// TODO: 与设计确认后改为按裁剪区域等比缩放宽度，并同步更新场景测试。

use super::{BackdropError, BlurConfig, Insets};

/// 源帧中的裁剪矩形（左上闭、右下开）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CropRect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl CropRect {
    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }
}

/// 单次模糊的几何方案。每次调用重新计算，不跨帧缓存。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryPlan {
    pub source_crop: CropRect,
    pub target_width: u32,
    pub target_height: u32,
    pub top_margin: u32,
}

/// 解析几何方案。
///
/// # 参数
/// * `frame_width` / `frame_height` - 截图尺寸
/// * `view_width` / `view_height`   - 被截取视图的尺寸
/// * `insets`                       - 标题栏、状态栏、底部系统栏高度
/// * `config`                       - 降采样倍数与是否模糊标题栏
///
/// # 错误
/// 裁剪区域宽或高不为正，或视图高度为 0 时返回 `BackdropError::InvalidGeometry`。
pub fn resolve(
    frame_width: u32,
    frame_height: u32,
    view_width: u32,
    view_height: u32,
    insets: &Insets,
    config: &BlurConfig,
) -> Result<GeometryPlan, BackdropError> {
    let chrome_offset = if config.blur_chrome() {
        0
    } else {
        insets.chrome_height
    };
    let top_offset = chrome_offset.saturating_add(insets.status_bar_height);
    let bottom_inset = insets.bottom_bar_height;

    let invalid = || BackdropError::InvalidGeometry {
        frame_width,
        frame_height,
        top_offset,
        bottom_inset,
    };

    let crop_right = frame_width.checked_sub(bottom_inset).filter(|right| *right > 0);
    let crop_bottom = frame_height
        .checked_sub(bottom_inset)
        .filter(|bottom| *bottom > top_offset);

    let (Some(right), Some(bottom)) = (crop_right, crop_bottom) else {
        return Err(invalid());
    };
    if view_height == 0 {
        return Err(invalid());
    }

    let view_w = f64::from(view_width);
    let view_h = f64::from(view_height);
    let top = f64::from(top_offset);
    let inset = f64::from(bottom_inset);
    let factor = f64::from(config.downscale_factor());

    let height = (view_h - top - inset).ceil() / factor;
    let width = ((view_w - inset) * height / view_h - top - inset).ceil();

    // `as u32` 对超界值饱和截断
    let target_height = height.max(1.0) as u32;
    let target_width = width.max(1.0) as u32;

    Ok(GeometryPlan {
        source_crop: CropRect {
            left: 0,
            top: top_offset,
            right,
            bottom,
        },
        target_width,
        target_height,
        top_margin: chrome_offset,
    })
}
