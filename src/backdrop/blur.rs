//! # 模糊滤镜
//!
//! ## 设计思路
//!
//! 流水线只依赖 `BlurFilter` trait，具体卷积核可替换。约束只有两条：
//! 1. 半径越大输出越平滑
//! 2. 输出尺寸与输入完全一致（就地修改，不做重采样）
//!
//! 半径为 0 时直接返回，像素保持不变。
//!
//! ## 实现思路
//!
//! - `BoxBlur`：可分离的滑动窗口均值滤波，水平 + 垂直两趟，每像素 O(1)；
//!   多趟叠加近似高斯。默认 3 趟。首个窗口的边缘延伸部分按闭式求和，
//!   耗时与半径无关，累加器为 `u64`，任意 `u32` 半径都不会溢出。
//! - `GaussianBlur`：委托 `image::imageops::blur`，速度较慢但质量更好。
//!   半径超过图像边长时按边长计算 sigma。

use image::RgbaImage;

use super::BackdropError;

const CHANNELS: usize = 4;

/// 可替换的模糊策略。像素格式固定为 RGBA8。
pub trait BlurFilter: Send + Sync {
    /// 滤镜名称（用于日志）。
    fn name(&self) -> &'static str;

    /// 就地模糊 `pixels`。
    fn apply(&self, pixels: &mut [u8], width: u32, height: u32, radius: u32) -> Result<(), BackdropError>;
}

fn validate_buffer(pixels: &[u8], width: u32, height: u32) -> Result<(), BackdropError> {
    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|count| count.checked_mul(CHANNELS))
        .ok_or_else(|| BackdropError::Blur("缓冲尺寸溢出".to_string()))?;

    if pixels.len() != expected {
        return Err(BackdropError::Blur(format!(
            "缓冲长度异常：{}（期望 {}x{}x4 = {}）",
            pixels.len(),
            width,
            height,
            expected
        )));
    }
    Ok(())
}

/// 多趟盒式模糊。
#[derive(Debug, Clone, Copy)]
pub struct BoxBlur {
    passes: u32,
}

impl Default for BoxBlur {
    fn default() -> Self {
        Self { passes: 3 }
    }
}

impl BoxBlur {
    pub fn with_passes(passes: u32) -> Self {
        Self {
            passes: passes.max(1),
        }
    }

    pub fn passes(&self) -> u32 {
        self.passes
    }
}

impl BlurFilter for BoxBlur {
    fn name(&self) -> &'static str {
        "box"
    }

    fn apply(&self, pixels: &mut [u8], width: u32, height: u32, radius: u32) -> Result<(), BackdropError> {
        validate_buffer(pixels, width, height)?;
        if radius == 0 || pixels.is_empty() {
            return Ok(());
        }

        let width = width as usize;
        let height = height as usize;
        let row_stride = width * CHANNELS;
        let mut scratch = vec![0u8; pixels.len()];

        for _ in 0..self.passes {
            for y in 0..height {
                blur_line(pixels, &mut scratch, y * row_stride, CHANNELS, width, radius);
            }
            for x in 0..width {
                blur_line(&scratch, pixels, x * CHANNELS, row_stride, height, radius);
            }
        }

        Ok(())
    }
}

/// 沿一条线（行或列）做滑动窗口均值，边缘像素按最近值延伸。
///
/// `offset` 为首个像素的字节偏移，`step` 为相邻像素的字节间距，`len >= 1`。
fn blur_line(src: &[u8], dst: &mut [u8], offset: usize, step: usize, len: usize, radius: u32) {
    let last = len - 1;
    let reach = radius as usize;
    let radius = u64::from(radius);
    let kernel = 2 * radius + 1;
    let at = |i: usize| offset + i.min(last) * step;

    // 首个窗口 [-r, r]：左侧 r + 1 个位置都落在首像素，右侧超出末尾的部分落在末像素
    let inside = reach.min(last);
    let overflow = radius - inside as u64;
    let head = at(0);
    let tail = at(last);
    let mut acc = [0u64; CHANNELS];
    for c in 0..CHANNELS {
        acc[c] = (radius + 1) * u64::from(src[head + c]) + overflow * u64::from(src[tail + c]);
    }
    for i in 1..=inside {
        let p = at(i);
        for c in 0..CHANNELS {
            acc[c] += u64::from(src[p + c]);
        }
    }

    for i in 0..len {
        let out = offset + i * step;
        for c in 0..CHANNELS {
            dst[out + c] = ((acc[c] + kernel / 2) / kernel) as u8;
        }

        let add = at(i.saturating_add(reach).saturating_add(1));
        let remove = at(i.saturating_sub(reach));
        for c in 0..CHANNELS {
            acc[c] = acc[c] + u64::from(src[add + c]) - u64::from(src[remove + c]);
        }
    }
}

/// 基于 `image` crate 的高斯模糊，sigma 取半径的一半。
#[derive(Debug, Clone, Copy, Default)]
pub struct GaussianBlur;

impl BlurFilter for GaussianBlur {
    fn name(&self) -> &'static str {
        "gaussian"
    }

    fn apply(&self, pixels: &mut [u8], width: u32, height: u32, radius: u32) -> Result<(), BackdropError> {
        validate_buffer(pixels, width, height)?;
        if radius == 0 || pixels.is_empty() {
            return Ok(());
        }

        let source = RgbaImage::from_raw(width, height, pixels.to_vec())
            .ok_or_else(|| BackdropError::Blur("无法构建模糊输入缓冲".to_string()))?;
        let effective = radius.min(width.max(height));
        let sigma = (effective as f32 * 0.5).max(0.5);
        let blurred = image::imageops::blur(&source, sigma);

        pixels.copy_from_slice(blurred.as_raw());
        Ok(())
    }
}
