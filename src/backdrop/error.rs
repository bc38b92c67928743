//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 使用单一错误枚举承载毛玻璃背景链路中的所有错误来源，避免字符串拼接式错误处理。
//! 通过 `thiserror` 保持人类可读错误，同时让调用侧可按分支匹配。
//!
//! 只有 `InvalidGeometry` 会被上报给宿主；`NotVisible` 在本地延迟重试，
//! `Cancelled` 仅作为内部信号，最终表现为 `on_backdrop_discarded()`。

/// 毛玻璃背景统一错误类型。
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackdropError {
    #[error(
        "几何参数非法：帧 {frame_width}x{frame_height}，顶部偏移 {top_offset}，底部系统栏 {bottom_inset}"
    )]
    InvalidGeometry {
        frame_width: u32,
        frame_height: u32,
        top_offset: u32,
        bottom_inset: u32,
    },

    #[error("界面尚未完成首次绘制")]
    NotVisible,

    #[error("模糊任务已取消")]
    Cancelled,

    #[error("截图错误：{0}")]
    Capture(String),

    #[error("缩放错误：{0}")]
    Resample(String),

    #[error("模糊错误：{0}")]
    Blur(String),

    #[error("配置错误：{0}")]
    InvalidConfig(String),

    #[error("状态锁异常：{0}")]
    StatePoisoned(String),
}

impl BackdropError {
    /// 稳定错误码，供宿主侧诊断与埋点使用。
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidGeometry { .. } => "E_GEOMETRY",
            Self::NotVisible => "E_NOT_VISIBLE",
            Self::Cancelled => "E_CANCELLED",
            Self::Capture(_) => "E_CAPTURE",
            Self::Resample(_) => "E_RESAMPLE",
            Self::Blur(_) => "E_BLUR",
            Self::InvalidConfig(_) => "E_CONFIG",
            Self::StatePoisoned(_) => "E_STATE",
        }
    }

    /// 出错所处的流水线阶段。
    pub fn stage(&self) -> &'static str {
        match self {
            Self::InvalidGeometry { .. } => "geometry",
            Self::NotVisible | Self::Capture(_) => "capture",
            Self::Resample(_) => "resample",
            Self::Blur(_) => "blur",
            Self::InvalidConfig(_) => "config",
            Self::Cancelled | Self::StatePoisoned(_) => "controller",
        }
    }

    /// 是否需要上报给宿主。
    pub fn is_escalated(&self) -> bool {
        matches!(self, Self::InvalidGeometry { .. })
    }
}

impl From<BackdropError> for String {
    fn from(error: BackdropError) -> Self {
        error.to_string()
    }
}
