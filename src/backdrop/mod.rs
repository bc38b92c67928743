//! # 毛玻璃背景模块（backdrop）
//!
//! ## 设计思路
//!
//! 模态界面弹出时，截取下方画面，裁掉系统栏与（可选的）标题栏，降采样后模糊，
//! 作为半透明 overlay 的背景展示。整条链路按职责拆分：
//!
//! - `config`：不可变配置、性能档位与可序列化的外部形态
//! - `error`：错误分类（错误码 + 阶段），只有几何错误需要上报
//! - `source`：截图 `Frame`、占位 `Insets`、结果 `BackdropImage`
//! - `host`：宿主接入的三个 trait
//! - `signal`：一次性“首次绘制完成”信号与 RAII 订阅凭证
//! - `geometry`：纯函数的裁剪区域与目标尺寸计算
//! - `blur`：可替换的模糊滤镜
//! - `pipeline`：同步合成（裁剪 → 降采样 → 模糊 → 打包）
//! - `controller`：后台任务调度、取消与单次投递
//! - `overlay`：把宿主生命周期事件转换为启动 / 取消
//!
//! ## 实现思路
//!
//! 宿主只与 `BackdropOverlay` 和三个 trait 打交道；
//! `BackdropCompositor` 可以脱离调度单独使用（例如命令行预览）。
//!
//! ## 调用链
//!
//! ```text
//! 宿主 on_show / on_show_retained
//!    ↓
//! overlay.rs（挂载检查；未绘制则订阅首次绘制）
//!    ↓  capture_current_frame + Insets::from_provider
//! controller.rs（取消旧任务 → spawn_blocking）
//!    ↓
//! pipeline.rs（统一编排 + 阶段耗时日志）
//!    ├─ geometry.rs（裁剪区域 + 目标尺寸）
//!    ├─ fast_image_resize（裁剪 + 缩放）
//!    └─ blur.rs（BlurFilter）
//!    ↓
//! controller.rs（CAS 完成 / 取消，二选一）
//!    ↓
//! OverlayHost::on_backdrop_ready / on_backdrop_discarded
//! ```
//!
//! 宿主 `on_dismiss` / `on_detach` 会取消任务，并在已有背景时回调
//! `OverlayHost::on_backdrop_removed`。

mod blur;
mod config;
mod controller;
mod error;
pub mod geometry;
mod host;
mod overlay;
mod pipeline;
mod signal;
mod source;

pub use blur::{BlurFilter, BoxBlur, GaussianBlur};
pub use config::{
    BlurConfig, BlurProfile, BlurSettings, DEFAULT_ANIMATION_DURATION_MS, DEFAULT_BLUR_CHROME,
    DEFAULT_BLUR_RADIUS, DEFAULT_DIM, DEFAULT_DOWNSCALE_FACTOR,
};
pub use controller::{BlurRequest, BlurTaskController, OverlayId, TaskState};
pub use error::BackdropError;
pub use geometry::{CropRect, GeometryPlan};
pub use host::{CaptureSource, InsetProvider, OverlayHost};
pub use overlay::BackdropOverlay;
pub use pipeline::BackdropCompositor;
pub use signal::{DrawSubscription, FirstDrawSignal};
pub use source::{BackdropImage, Frame, Gravity, Insets, ScaleHint};
