//! 统一错误类型模块
//!
//! # 设计思路
//!
//! `backdrop` 内部使用细分的 `BackdropError`（带错误码与阶段）；
//! 库的外围入口（设置文件、命令行预览）统一返回 `AppError`。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 为 `BackdropError`、`std::io::Error`、`image::ImageError` 提供 `From` 转换，无需手动 map。

use crate::backdrop::BackdropError;

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 背景模糊流水线错误
    #[error("{0}")]
    Backdrop(#[from] BackdropError),

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),

    /// 图片读写或编解码失败
    #[error("图片编解码失败: {0}")]
    Image(#[from] image::ImageError),

    /// 设置文件解析或序列化失败
    #[error("设置文件错误: {0}")]
    Settings(String),

    /// 命令行参数错误
    #[error("参数错误: {0}")]
    Usage(String),
}
