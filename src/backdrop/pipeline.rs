//! # 合成流水线模块
//!
//! ## 设计思路
//!
//! `BackdropCompositor` 把“几何计算 → 裁剪降采样 → 模糊 → 打包”集中管理，
//! 不关心任务调度与宿主生命周期，可在任意线程同步调用。
//!
//! ## 实现思路
//!
//! 1. 调用 `geometry::resolve` 得到几何方案（错误原样向上传递）
//! 2. 目标尺寸不超过裁剪区域（只缩不放）
//! 3. 用 `fast_image_resize` 完成裁剪 + 缩放（双线性），失败时回退 `image::imageops`
//! 4. 释放原始帧，检查取消标志（模糊是最耗时的阶段）
//! 5. 调用可替换的 `BlurFilter`
//! 6. 打包为 `BackdropImage`

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Instant;

use fast_image_resize as fr;
use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage};

use super::blur::{BlurFilter, BoxBlur};
use super::geometry::{self, CropRect, GeometryPlan};
use super::{BackdropError, BackdropImage, BlurConfig, Frame, Insets};

/// 背景合成器。
pub struct BackdropCompositor {
    filter: Arc<dyn BlurFilter>,
}

impl Default for BackdropCompositor {
    fn default() -> Self {
        Self::new(Arc::new(BoxBlur::default()))
    }
}

impl BackdropCompositor {
    pub fn new(filter: Arc<dyn BlurFilter>) -> Self {
        Self { filter }
    }

    pub fn filter_name(&self) -> &'static str {
        self.filter.name()
    }

    /// 将截图合成为模糊背景。
    ///
    /// # 示例
    /// ```rust
    /// use frosted_backdrop::backdrop::{BackdropCompositor, BlurConfig, Frame, Insets};
    ///
    /// let frame = Frame::from_rgba(64, 64, vec![200; 64 * 64 * 4])?;
    /// let backdrop = BackdropCompositor::default().composite(
    ///     frame,
    ///     64,
    ///     64,
    ///     &Insets::default(),
    ///     &BlurConfig::default(),
    /// )?;
    /// assert_eq!(backdrop.height(), 16);
    /// # Ok::<(), frosted_backdrop::backdrop::BackdropError>(())
    /// ```
    pub fn composite(
        &self,
        frame: Frame,
        view_width: u32,
        view_height: u32,
        insets: &Insets,
        config: &BlurConfig,
    ) -> Result<BackdropImage, BackdropError> {
        self.composite_with_cancel(frame, view_width, view_height, insets, config, || false)
    }

    /// 带取消检查的合成。`is_cancelled` 至少在缩放与模糊之间被检查一次。
    pub fn composite_with_cancel<C>(
        &self,
        frame: Frame,
        view_width: u32,
        view_height: u32,
        insets: &Insets,
        config: &BlurConfig,
        is_cancelled: C,
    ) -> Result<BackdropImage, BackdropError>
    where
        C: Fn() -> bool,
    {
        let total_start = Instant::now();

        if is_cancelled() {
            return Err(BackdropError::Cancelled);
        }

        let plan = geometry::resolve(
            frame.width(),
            frame.height(),
            view_width,
            view_height,
            insets,
            config,
        )?;

        let resample_start = Instant::now();
        let (target_width, target_height) = Self::clamp_to_crop(&plan);
        let mut scaled = Self::resample(
            &frame,
            plan.source_crop,
            target_width,
            target_height,
            config.resize_filter(),
        )?;
        drop(frame);
        let resample_elapsed = resample_start.elapsed();

        if is_cancelled() {
            log::debug!("⏹️ 缩放完成后检测到取消，跳过模糊");
            return Err(BackdropError::Cancelled);
        }

        let blur_start = Instant::now();
        self.filter
            .apply(&mut *scaled, target_width, target_height, config.blur_radius())?;
        let blur_elapsed = blur_start.elapsed();

        let total_elapsed = total_start.elapsed();
        if config.debug() {
            log::info!(
                "🧊 背景模糊完成 - plan={:?} filter={} radius={} resample={}ms blur={}ms total={}ms",
                plan,
                self.filter.name(),
                config.blur_radius(),
                resample_elapsed.as_millis(),
                blur_elapsed.as_millis(),
                total_elapsed.as_millis()
            );
        } else {
            log::debug!(
                "🧊 背景模糊完成 - {}x{} resample={}ms blur={}ms total={}ms",
                target_width,
                target_height,
                resample_elapsed.as_millis(),
                blur_elapsed.as_millis(),
                total_elapsed.as_millis()
            );
        }

        Ok(BackdropImage::new(
            scaled,
            plan.top_margin,
            config.dim(),
            config.animation_duration_ms(),
        ))
    }

    /// 目标尺寸不超过裁剪区域，避免放大。
    fn clamp_to_crop(plan: &GeometryPlan) -> (u32, u32) {
        let width = plan.target_width.min(plan.source_crop.width()).max(1);
        let height = plan.target_height.min(plan.source_crop.height()).max(1);

        if (width, height) != (plan.target_width, plan.target_height) {
            log::debug!(
                "📐 目标尺寸 {}x{} 超出裁剪区域 {}x{}，按裁剪区域收敛",
                plan.target_width,
                plan.target_height,
                plan.source_crop.width(),
                plan.source_crop.height()
            );
        }
        (width, height)
    }

    fn resample(
        frame: &Frame,
        crop: CropRect,
        target_width: u32,
        target_height: u32,
        filter: FilterType,
    ) -> Result<RgbaImage, BackdropError> {
        let rgba: Cow<'_, RgbaImage> = match frame.image() {
            DynamicImage::ImageRgba8(buffer) => Cow::Borrowed(buffer),
            other => Cow::Owned(other.to_rgba8()),
        };

        match Self::resample_with_fast_image_resize(&rgba, crop, target_width, target_height, filter) {
            Ok(scaled) => Ok(scaled),
            Err(err) => {
                log::warn!("⚠️ fast_image_resize 缩放失败，回退 image::imageops：{}", err);
                let cropped =
                    image::imageops::crop_imm(&*rgba, crop.left, crop.top, crop.width(), crop.height())
                        .to_image();
                Ok(image::imageops::resize(&cropped, target_width, target_height, filter))
            }
        }
    }

    /// 先按行切出裁剪区域的上下边界，再交给 `fast_image_resize` 裁掉右侧并缩放。
    ///
    /// 行切片保证卷积核不会采样到标题栏或底部系统栏的像素。
    fn resample_with_fast_image_resize(
        source: &RgbaImage,
        crop: CropRect,
        target_width: u32,
        target_height: u32,
        filter: FilterType,
    ) -> Result<RgbaImage, BackdropError> {
        let row_bytes = source.width() as usize * 4;
        let rows = source
            .as_raw()
            .get(crop.top as usize * row_bytes..crop.bottom as usize * row_bytes)
            .ok_or_else(|| BackdropError::Resample("裁剪区域超出源图像".to_string()))?;

        let src_image = fr::images::ImageRef::new(source.width(), crop.height(), rows, fr::PixelType::U8x4)
            .map_err(|e| BackdropError::Resample(format!("构建源图像缓冲失败：{}", e)))?;

        let mut dst_image = fr::images::Image::new(target_width, target_height, fr::PixelType::U8x4);

        let mut resizer = fr::Resizer::new();
        let mut options =
            fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(Self::to_fast_filter(filter)));
        if crop.left != 0 || crop.right != source.width() {
            options = options.crop(
                f64::from(crop.left),
                0.0,
                f64::from(crop.width()),
                f64::from(crop.height()),
            );
        }

        resizer
            .resize(&src_image, &mut dst_image, Some(&options))
            .map_err(|e| BackdropError::Resample(format!("fast_image_resize 执行失败：{}", e)))?;

        RgbaImage::from_raw(target_width, target_height, dst_image.into_vec())
            .ok_or_else(|| BackdropError::Resample("fast_image_resize 输出缓冲长度异常".to_string()))
    }

    fn to_fast_filter(filter: FilterType) -> fr::FilterType {
        match filter {
            FilterType::Nearest => fr::FilterType::Box,
            FilterType::Triangle => fr::FilterType::Bilinear,
            FilterType::CatmullRom => fr::FilterType::CatmullRom,
            FilterType::Gaussian => fr::FilterType::Mitchell,
            FilterType::Lanczos3 => fr::FilterType::Lanczos3,
        }
    }
}
