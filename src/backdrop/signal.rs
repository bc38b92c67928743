//! # 首次绘制信号
//!
//! ## 设计思路
//!
//! 宿主界面尚未绘制时无法截图，需要等待“首次绘制完成”再启动模糊。
//! 这里把监听器模式收敛为一次性订阅：
//! - `FirstDrawSignal::notify` 只生效一次，之后的调用为空操作
//! - 每个回调最多被消费一次（`FnOnce`）
//! - `DrawSubscription` 采用 RAII：`cancel` 或 `Drop` 时注销尚未触发的回调
//!
//! ## 实现思路
//!
//! 回调在锁外执行，允许回调内部再次订阅或截图而不会死锁。

use std::sync::{Arc, Mutex, Weak};

type Listener = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct SignalState {
    fired: bool,
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
}

/// 一次性“首次绘制完成”信号，可供 `CaptureSource` 实现复用。
#[derive(Clone, Default)]
pub struct FirstDrawSignal {
    state: Arc<Mutex<SignalState>>,
}

impl FirstDrawSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// 是否已经触发过。
    pub fn has_fired(&self) -> bool {
        self.state.lock().map(|state| state.fired).unwrap_or(false)
    }

    /// 订阅信号。若信号已触发，回调立即在当前线程执行。
    pub fn subscribe(&self, callback: Box<dyn FnOnce() + Send>) -> DrawSubscription {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(_) => {
                log::warn!("⚠️ 首次绘制信号锁已中毒，订阅被忽略");
                return DrawSubscription::inert();
            }
        };

        if state.fired {
            drop(state);
            callback();
            return DrawSubscription::inert();
        }

        let id = state.next_id;
        state.next_id += 1;
        state.listeners.push((id, callback));

        DrawSubscription {
            id,
            state: Arc::downgrade(&self.state),
        }
    }

    /// 触发信号。仅第一次调用会执行回调。
    pub fn notify(&self) {
        let listeners = {
            let mut state = match self.state.lock() {
                Ok(state) => state,
                Err(_) => return,
            };
            if state.fired {
                return;
            }
            state.fired = true;
            std::mem::take(&mut state.listeners)
        };

        log::debug!("🖼️ 首次绘制完成，唤醒 {} 个订阅", listeners.len());
        for (_, listener) in listeners {
            listener();
        }
    }
}

/// 订阅凭证。取消或丢弃后，未触发的回调不会再执行。
#[must_use = "丢弃订阅凭证会立即注销回调"]
pub struct DrawSubscription {
    id: u64,
    state: Weak<Mutex<SignalState>>,
}

impl DrawSubscription {
    /// 不关联任何回调的凭证（回调已执行或无需等待时使用）。
    pub fn inert() -> Self {
        Self {
            id: 0,
            state: Weak::new(),
        }
    }

    /// 回调是否仍在等待触发。
    pub fn is_pending(&self) -> bool {
        let Some(state) = self.state.upgrade() else {
            return false;
        };
        state
            .lock()
            .map(|state| state.listeners.iter().any(|(id, _)| *id == self.id))
            .unwrap_or(false)
    }

    /// 注销回调。返回 `true` 表示回调尚未执行且已被移除。
    pub fn cancel(&mut self) -> bool {
        let Some(state) = self.state.upgrade() else {
            return false;
        };
        self.state = Weak::new();

        let Ok(mut state) = state.lock() else {
            return false;
        };
        let before = state.listeners.len();
        let id = self.id;
        state.listeners.retain(|(listener_id, _)| *listener_id != id);
        before != state.listeners.len()
    }
}

impl Drop for DrawSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}
