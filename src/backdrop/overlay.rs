//! # Overlay 生命周期
//!
//! ## 设计思路
//!
//! `BackdropOverlay` 对应一个模态界面实例，负责把宿主的生命周期事件
//! （显示 / 关闭 / 分离 / 重新挂载）转换为控制器上的启动与取消。
//!
//! 所有权单向：overlay 持有控制器；控制器与宿主之间只保留 `Weak` 引用，
//! overlay 在分离或销毁时主动取消任务，打破循环引用。
//!
//! ## 实现思路
//!
//! - overlay 自身实现 `OverlayHost`，作为控制器的投递目标，
//!   在转发给真正的宿主前再次检查“已挂载且未关闭”，并记录背景是否已展示。
//! - 界面尚未绘制时订阅一次性的首次绘制信号，信号到达后只重试一次截图。
//! - 状态锁内不调用任何外部回调。
//! - 向宿主转发结果时持有投递锁，关闭 / 分离先拿投递锁再改状态：
//!   要么结果在关闭前送达（随后收到移除请求），要么在关闭后被丢弃。

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use super::controller::{BlurRequest, BlurTaskController, OverlayId};
use super::host::{CaptureSource, InsetProvider, OverlayHost};
use super::signal::DrawSubscription;
use super::{BackdropError, BackdropImage, BlurConfig, Frame, Insets};

struct OverlayState {
    attached: bool,
    dismissed: bool,
    backdrop_shown: bool,
    pending_draw: Option<DrawSubscription>,
}

struct OverlayInner {
    id: OverlayId,
    config: BlurConfig,
    controller: Arc<BlurTaskController>,
    capture: Arc<dyn CaptureSource>,
    insets: Arc<dyn InsetProvider>,
    host: Weak<dyn OverlayHost>,
    state: Mutex<OverlayState>,
    delivery: Mutex<()>,
    this: Weak<OverlayInner>,
}

/// 模态界面的毛玻璃背景。
pub struct BackdropOverlay {
    inner: Arc<OverlayInner>,
}

impl BackdropOverlay {
    /// 创建 overlay。`config` 在整个生命周期内保持不变。
    pub fn new(
        controller: Arc<BlurTaskController>,
        capture: Arc<dyn CaptureSource>,
        insets: Arc<dyn InsetProvider>,
        host: Weak<dyn OverlayHost>,
        config: BlurConfig,
    ) -> Self {
        let inner = Arc::new_cyclic(|this| OverlayInner {
            id: OverlayId::next(),
            config,
            controller,
            capture,
            insets,
            host,
            state: Mutex::new(OverlayState {
                attached: true,
                dismissed: false,
                backdrop_shown: false,
                pending_draw: None,
            }),
            delivery: Mutex::new(()),
            this: this.clone(),
        });
        Self { inner }
    }

    pub fn id(&self) -> OverlayId {
        self.inner.id
    }

    pub fn config(&self) -> &BlurConfig {
        &self.inner.config
    }

    /// 界面显示：尚无背景时启动模糊。
    pub fn on_show(&self) -> Result<(), BackdropError> {
        self.inner.show(false)
    }

    /// 界面恢复（实例被保留）：即使已有背景也重新模糊。
    pub fn on_show_retained(&self) -> Result<(), BackdropError> {
        self.inner.show(true)
    }

    /// 界面关闭：取消任务，并请求以退场动画移除已展示的背景。
    pub fn on_dismiss(&self) -> Result<(), BackdropError> {
        self.inner.teardown(true)
    }

    /// 界面与宿主分离：取消任务，立即移除背景，之后不再投递任何结果。
    pub fn on_detach(&self) -> Result<(), BackdropError> {
        self.inner.teardown(false)
    }

    /// 重新挂载到宿主。
    pub fn on_attach(&self) -> Result<(), BackdropError> {
        let mut state = self.inner.lock_state()?;
        state.attached = true;
        log::debug!("🔗 overlay#{} 重新挂载", self.inner.id.get());
        Ok(())
    }

    /// 是否正在等待首次绘制。
    pub fn is_waiting_for_draw(&self) -> bool {
        self.inner
            .lock_state()
            .map(|state| state.pending_draw.as_ref().is_some_and(DrawSubscription::is_pending))
            .unwrap_or(false)
    }

    /// 宿主当前是否展示着本 overlay 投递的背景。
    pub fn has_backdrop(&self) -> bool {
        self.inner
            .lock_state()
            .map(|state| state.backdrop_shown)
            .unwrap_or(false)
    }
}

impl Drop for BackdropOverlay {
    fn drop(&mut self) {
        if let Err(err) = self.inner.controller.forget(self.inner.id) {
            log::warn!("⚠️ overlay#{} 销毁时清理任务失败：{}", self.inner.id.get(), err);
        }
    }
}

impl OverlayInner {
    fn lock_state(&self) -> Result<MutexGuard<'_, OverlayState>, BackdropError> {
        self.state
            .lock()
            .map_err(|_| BackdropError::StatePoisoned("overlay 状态锁已中毒".to_string()))
    }

    fn show(&self, force_refresh: bool) -> Result<(), BackdropError> {
        let stale_subscription = {
            let mut state = self.lock_state()?;
            if !state.attached {
                log::debug!("overlay#{} 未挂载，忽略显示请求", self.id.get());
                return Ok(());
            }
            if state.backdrop_shown && !force_refresh {
                log::debug!("overlay#{} 已有背景，跳过模糊", self.id.get());
                return Ok(());
            }
            state.dismissed = false;
            state.pending_draw.take()
        };
        drop(stale_subscription);

        match self.capture.capture_current_frame() {
            Ok(frame) => self.start_blur(frame),
            Err(BackdropError::NotVisible) => {
                log::debug!("⏳ overlay#{} 界面尚未绘制，等待首次绘制", self.id.get());
                let this = self.this.clone();
                let subscription = self.capture.subscribe_first_draw(Box::new(move || {
                    if let Some(inner) = this.upgrade() {
                        inner.on_first_draw();
                    }
                }));

                if subscription.is_pending() {
                    let replaced = {
                        let mut state = self.lock_state()?;
                        state.pending_draw.replace(subscription)
                    };
                    drop(replaced);
                }
                Ok(())
            }
            Err(err) => {
                log::warn!("⚠️ overlay#{} 截图失败：{}", self.id.get(), err);
                Err(err)
            }
        }
    }

    fn on_first_draw(&self) {
        let (subscription, proceed) = match self.state.lock() {
            Ok(mut state) => (state.pending_draw.take(), state.attached && !state.dismissed),
            Err(_) => (None, false),
        };
        drop(subscription);

        if !proceed {
            log::debug!("overlay#{} 在首次绘制前已关闭，放弃模糊", self.id.get());
            return;
        }

        match self.capture.capture_current_frame() {
            Ok(frame) => {
                if let Err(err) = self.start_blur(frame) {
                    log::warn!("⚠️ overlay#{} 启动模糊失败：{}", self.id.get(), err);
                }
            }
            Err(err) => {
                log::warn!("⚠️ overlay#{} 首次绘制后截图仍失败，放弃本次模糊：{}", self.id.get(), err);
                if let Some(host) = self.host.upgrade() {
                    host.on_backdrop_discarded();
                }
            }
        }
    }

    fn start_blur(&self, frame: Frame) -> Result<(), BackdropError> {
        let (view_width, view_height) = self.capture.view_size();
        let insets = Insets::from_provider(self.insets.as_ref());
        let target: Weak<dyn OverlayHost> = self.this.clone();

        self.controller.start(
            self.id,
            target,
            BlurRequest {
                frame,
                view_width,
                view_height,
                insets,
                config: self.config.clone(),
            },
        )?;
        Ok(())
    }

    /// `animate` 为 `true` 时按配置时长播放退场动画，否则立即移除。
    fn teardown(&self, animate: bool) -> Result<(), BackdropError> {
        let (subscription, had_backdrop) = {
            let _delivery = self.enter_delivery();
            let mut state = self.lock_state()?;
            if animate {
                state.dismissed = true;
            } else {
                state.attached = false;
            }
            let had_backdrop = std::mem::replace(&mut state.backdrop_shown, false);
            (state.pending_draw.take(), had_backdrop)
        };
        drop(subscription);

        let cancelled = self.controller.cancel(self.id)?;
        log::debug!(
            "🧹 overlay#{} {} - 取消运行中任务={} 移除背景={}",
            self.id.get(),
            if animate { "关闭" } else { "分离" },
            cancelled,
            had_backdrop
        );

        if had_backdrop {
            if let Some(host) = self.host.upgrade() {
                let fade_out_ms = if animate {
                    self.config.animation_duration_ms()
                } else {
                    0
                };
                host.on_backdrop_removed(fade_out_ms);
            }
        }
        Ok(())
    }

    fn enter_delivery(&self) -> MutexGuard<'_, ()> {
        self.delivery.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn accepts_delivery(state: &OverlayState) -> bool {
        state.attached && !state.dismissed
    }
}

impl OverlayHost for OverlayInner {
    fn is_attached(&self) -> bool {
        let accepts = self
            .state
            .lock()
            .map(|state| Self::accepts_delivery(&state))
            .unwrap_or(false);
        accepts && self.host.upgrade().is_some_and(|host| host.is_attached())
    }

    fn on_backdrop_ready(&self, backdrop: BackdropImage) {
        let Some(host) = self.host.upgrade() else {
            return;
        };

        let delivery = self.enter_delivery();
        let accepted = match self.state.lock() {
            Ok(mut state) if Self::accepts_delivery(&state) => {
                state.backdrop_shown = true;
                true
            }
            _ => false,
        };

        if accepted {
            host.on_backdrop_ready(backdrop);
        } else {
            drop(delivery);
            host.on_backdrop_discarded();
        }
    }

    fn on_backdrop_discarded(&self) {
        if let Some(host) = self.host.upgrade() {
            host.on_backdrop_discarded();
        }
    }

    fn on_backdrop_failed(&self, error: &BackdropError) {
        if let Some(host) = self.host.upgrade() {
            host.on_backdrop_failed(error);
        }
    }
}
