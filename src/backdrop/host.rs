//! # 宿主协作接口
//!
//! 宿主（对话框、窗口等）通过以下三个 trait 接入：
//! - `CaptureSource`：截取当前画面，订阅“首次绘制完成”通知
//! - `InsetProvider`：查询标题栏、状态栏、底部系统栏高度
//! - `OverlayHost`：接收模糊结果、丢弃通知与移除请求
//!
//! 回调可能在后台线程上触发，宿主需要自行切回 UI 线程。
//! `on_backdrop_ready` 期间同一 overlay 的关闭与新任务会等待其返回，
//! 因此回调内不要同步调用该 overlay 的生命周期方法。

use super::signal::DrawSubscription;
use super::{BackdropError, BackdropImage, Frame};

/// 画面来源。
pub trait CaptureSource: Send + Sync {
    /// 截取当前可见画面。界面从未绘制过时返回 `BackdropError::NotVisible`。
    fn capture_current_frame(&self) -> Result<Frame, BackdropError>;

    /// 被截取视图的尺寸（宽、高）。
    fn view_size(&self) -> (u32, u32);

    /// 订阅一次性的“首次绘制完成”通知。
    ///
    /// 若界面已经绘制过，实现可以立即调用 `callback`。
    fn subscribe_first_draw(&self, callback: Box<dyn FnOnce() + Send>) -> DrawSubscription;
}

/// 系统栏/标题栏尺寸查询，全部为对宿主环境的纯查询。
pub trait InsetProvider: Send + Sync {
    fn chrome_height(&self) -> u32;

    fn status_bar_height(&self) -> u32;

    fn is_status_bar_translucent(&self) -> bool;

    fn is_fullscreen(&self) -> bool {
        false
    }

    fn bottom_bar_height(&self) -> u32;
}

/// 结果接收方。
pub trait OverlayHost: Send + Sync {
    /// 投递前检查。返回 `false` 时结果被静默丢弃。
    fn is_attached(&self) -> bool {
        true
    }

    fn on_backdrop_ready(&self, backdrop: BackdropImage);

    fn on_backdrop_discarded(&self);

    /// 仅在几何参数非法时调用，每次失败调用一次。
    fn on_backdrop_failed(&self, _error: &BackdropError) {}

    /// 请求移除已展示的背景，`fade_out_ms` 为退场动画时长。
    fn on_backdrop_removed(&self, _fade_out_ms: u64) {}
}
