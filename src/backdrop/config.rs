//! # 配置模块
//!
//! ## 设计思路
//!
//! 将所有“可调策略”集中到不可变的 `BlurConfig`，在构造 overlay 时一次性注入，
//! 不再依赖进程级的全局默认常量。
//! 性能档位（quality / balanced / speed）作为高层语义，映射到底层参数组合。
//!
//! ## 实现思路
//!
//! - 字段私有，所有写入都经过钳制：降采样倍数 `>= 1.0`（禁止放大），模糊半径 `>= 0`。
//! - `Default` 提供生产可用的平衡配置。
//! - `BlurProfile` 负责档位字符串解析与反向输出。
//! - `BlurSettings` 是可序列化的外部形态，落地时同样走钳制逻辑。

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use super::BackdropError;

pub const DEFAULT_DOWNSCALE_FACTOR: f32 = 4.0;
pub const DEFAULT_BLUR_RADIUS: u32 = 8;
pub const DEFAULT_BLUR_CHROME: bool = false;
pub const DEFAULT_DIM: bool = false;
pub const DEFAULT_ANIMATION_DURATION_MS: u64 = 300;

/// 毛玻璃背景配置。
///
/// 字段覆盖了几何裁剪、降采样、模糊与动画透传四个方面。
#[derive(Debug, Clone, PartialEq)]
pub struct BlurConfig {
    downscale_factor: f32,
    blur_radius: u32,
    blur_chrome: bool,
    dim: bool,
    animation_duration_ms: u64,
    resize_filter: FilterType,
    debug: bool,
}

impl Default for BlurConfig {
    fn default() -> Self {
        Self {
            downscale_factor: DEFAULT_DOWNSCALE_FACTOR,
            blur_radius: DEFAULT_BLUR_RADIUS,
            blur_chrome: DEFAULT_BLUR_CHROME,
            dim: DEFAULT_DIM,
            animation_duration_ms: DEFAULT_ANIMATION_DURATION_MS,
            resize_filter: FilterType::Triangle,
            debug: false,
        }
    }
}

impl BlurConfig {
    /// 按给定参数构造，并执行钳制。
    ///
    /// # 示例
    /// ```rust
    /// use frosted_backdrop::backdrop::BlurConfig;
    ///
    /// let config = BlurConfig::new(0.5, -3, false);
    /// assert_eq!(config.downscale_factor(), 1.0);
    /// assert_eq!(config.blur_radius(), 0);
    /// ```
    pub fn new(downscale_factor: f32, blur_radius: i32, blur_chrome: bool) -> Self {
        Self::default()
            .with_downscale_factor(downscale_factor)
            .with_blur_radius(blur_radius)
            .with_blur_chrome(blur_chrome)
    }

    /// 加载中对话框使用的预设：更大的半径与降采样，并开启暗化。
    pub fn loading_dialog() -> Self {
        Self::default()
            .with_blur_radius(10)
            .with_downscale_factor(5.0)
            .with_dim(true)
            .with_blur_chrome(false)
    }

    /// 设置降采样倍数。小于 1.0（以及 NaN）一律钳制到 1.0。
    pub fn with_downscale_factor(mut self, factor: f32) -> Self {
        self.downscale_factor = clamp_downscale_factor(factor);
        self
    }

    /// 设置模糊半径。负数钳制到 0。
    pub fn with_blur_radius(mut self, radius: i32) -> Self {
        self.blur_radius = clamp_blur_radius(radius);
        self
    }

    pub fn with_blur_chrome(mut self, blur_chrome: bool) -> Self {
        self.blur_chrome = blur_chrome;
        self
    }

    pub fn with_dim(mut self, dim: bool) -> Self {
        self.dim = dim;
        self
    }

    pub fn with_animation_duration_ms(mut self, duration_ms: u64) -> Self {
        self.animation_duration_ms = duration_ms;
        self
    }

    pub fn with_resize_filter(mut self, filter: FilterType) -> Self {
        self.resize_filter = filter;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn downscale_factor(&self) -> f32 {
        self.downscale_factor
    }

    pub fn blur_radius(&self) -> u32 {
        self.blur_radius
    }

    pub fn blur_chrome(&self) -> bool {
        self.blur_chrome
    }

    /// 暗化策略，仅透传给宿主，流水线本身不做处理。
    pub fn dim(&self) -> bool {
        self.dim
    }

    /// 进出场动画时长（毫秒），仅透传给宿主。
    pub fn animation_duration_ms(&self) -> u64 {
        self.animation_duration_ms
    }

    pub fn resize_filter(&self) -> FilterType {
        self.resize_filter
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    /// 基于当前参数反推性能档位。
    pub fn infer_profile(&self) -> BlurProfile {
        if self.downscale_factor <= 2.0 {
            return BlurProfile::Quality;
        }

        if self.downscale_factor >= 8.0 || self.resize_filter == FilterType::Nearest {
            return BlurProfile::Speed;
        }

        BlurProfile::Balanced
    }

    /// 应用指定性能档位到实际参数。
    pub fn with_profile(self, profile: BlurProfile) -> Self {
        match profile {
            BlurProfile::Quality => self
                .with_downscale_factor(2.0)
                .with_resize_filter(FilterType::CatmullRom),
            BlurProfile::Balanced => self
                .with_downscale_factor(DEFAULT_DOWNSCALE_FACTOR)
                .with_resize_filter(FilterType::Triangle),
            BlurProfile::Speed => self
                .with_downscale_factor(8.0)
                .with_resize_filter(FilterType::Nearest),
        }
    }

    /// 从外部设置构造配置。
    ///
    /// 先应用档位，再用显式字段覆盖；所有数值都经过钳制。
    pub fn from_settings(settings: &BlurSettings) -> Result<Self, BackdropError> {
        let mut config = Self::default();

        if let Some(profile) = settings.profile.as_deref() {
            config = config.with_profile(BlurProfile::from_str(profile)?);
        }
        if let Some(factor) = settings.downscale_factor {
            config = config.with_downscale_factor(factor);
        }
        if let Some(radius) = settings.blur_radius {
            config = config.with_blur_radius(radius);
        }
        if let Some(duration) = settings.animation_duration_ms {
            config = config.with_animation_duration_ms(duration);
        }

        Ok(config
            .with_blur_chrome(settings.blur_chrome)
            .with_dim(settings.dim)
            .with_debug(settings.debug))
    }

    /// 输出为可持久化的设置。
    pub fn to_settings(&self) -> BlurSettings {
        BlurSettings {
            profile: Some(self.infer_profile().as_str().to_string()),
            downscale_factor: Some(self.downscale_factor),
            blur_radius: Some(self.blur_radius.min(i32::MAX as u32) as i32),
            blur_chrome: self.blur_chrome,
            dim: self.dim,
            animation_duration_ms: Some(self.animation_duration_ms),
            debug: self.debug,
        }
    }
}

fn clamp_downscale_factor(factor: f32) -> f32 {
    // f32::max 在一侧为 NaN 时返回另一侧
    factor.max(1.0)
}

fn clamp_blur_radius(radius: i32) -> u32 {
    radius.max(0) as u32
}

/// 模糊性能档位（面向产品/用户语义）。
///
/// - `Quality`：降采样少，滤镜更锐利
/// - `Balanced`：默认
/// - `Speed`：降采样多，最近邻缩放
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlurProfile {
    Quality,
    Balanced,
    Speed,
}

impl BlurProfile {
    /// 从外部字符串解析档位。
    pub fn from_str(profile: &str) -> Result<Self, BackdropError> {
        match profile.trim().to_lowercase().as_str() {
            "quality" => Ok(Self::Quality),
            "balanced" => Ok(Self::Balanced),
            "speed" => Ok(Self::Speed),
            other => Err(BackdropError::InvalidConfig(format!(
                "未知性能档位：{}（可选：quality / balanced / speed）",
                other
            ))),
        }
    }

    /// 将档位输出为稳定字符串，供持久化。
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quality => "quality",
            Self::Balanced => "balanced",
            Self::Speed => "speed",
        }
    }
}

/// 配置的序列化形态（JSON）。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlurSettings {
    pub profile: Option<String>,
    pub downscale_factor: Option<f32>,
    pub blur_radius: Option<i32>,
    pub blur_chrome: bool,
    pub dim: bool,
    pub animation_duration_ms: Option<u64>,
    pub debug: bool,
}
