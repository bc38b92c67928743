//! # 毛玻璃背景 — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 宿主（对话框 / 窗口 / 预览工具）            │
//! │                                                          │
//! │  CaptureSource ── InsetProvider ── OverlayHost           │
//! │       ↕                 ↕               ↑                │
//! └───────┼─────────────────┼───────────────┼────────────────┘
//!         ↕                 ↕               │ Weak 引用，单次投递
//! ┌───────┼─────────────────┼───────────────┼────────────────┐
//! │       ↕            backdrop             │                │
//! │                                                          │
//! │  BackdropOverlay ── 生命周期 + 首次绘制等待               │
//! │       │                                                  │
//! │  BlurTaskController ── spawn_blocking + CAS 取消          │
//! │       │                                                  │
//! │  BackdropCompositor ── geometry → resize → BlurFilter    │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`backdrop`] | 几何计算、降采样、模糊、后台任务与 overlay 生命周期 |
//! | [`error`] | 应用级错误 `AppError`，汇总模糊、I/O、图片编解码与设置错误 |
//! | [`settings`] | `BlurSettings` 的 JSON 读写，缺省时回退默认配置 |

pub mod backdrop;
pub mod error;
pub mod settings;
