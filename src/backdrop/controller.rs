//! # 异步任务控制器
//!
//! ## 设计思路
//!
//! 合成是 CPU 密集操作，必须离开交互线程执行；同时要保证 overlay 消失后
//! 不会残留过期任务，也不会把结果投递给已经关闭的界面。
//!
//! - 每个 overlay 至多一个未结束的任务，新的 `start` 先取消旧任务再启动
//! - 取消是协作式的：合成在缩放与模糊之间检查取消标志
//! - 任务状态机 `Running → {Completed, Cancelled}` 用原子 CAS 推进，
//!   “完成”与“取消”只有一方能赢，被取消的任务永远不会投递结果
//! - 控制器只持有宿主的 `Weak` 引用，投递前检查是否仍然挂载
//!
//! ## 实现思路
//!
//! 任务表为 `Mutex<HashMap<OverlayId, TaskSlot>>`，锁内只做取消与登记，
//! 真正的合成通过 tokio `spawn_blocking` 在后台线程池执行。
//!
//! 每个 overlay 另有一把投递闸门：后台任务持有闸门完成
//! “CAS 完成 → 挂载检查 → `on_backdrop_ready`” 整个交接，
//! `start` / `cancel` / `forget` 先拿闸门再取消旧任务。
//! 因此 `start` 返回后旧任务不可能再投递；宿主回调内不得同步调用同一 overlay 的控制器方法。
//!
//! 所有错误（包括合成阶段的 panic）都在后台线程内转换为“丢弃”，不会跨线程抛出。

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Instant;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use super::host::OverlayHost;
use super::pipeline::BackdropCompositor;
use super::{BackdropError, BlurConfig, Frame, Insets};

/// overlay 实例标识。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OverlayId(u64);

impl OverlayId {
    /// 分配一个进程内唯一的标识。
    pub fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// 模糊任务状态。`Idle` 表示该 overlay 没有登记过任务。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    Running,
    Completed,
    Cancelled,
}

const STATE_RUNNING: u8 = 1;
const STATE_COMPLETED: u8 = 2;
const STATE_CANCELLED: u8 = 3;

struct TaskTicket {
    generation: u64,
    state: AtomicU8,
}

impl TaskTicket {
    fn new(generation: u64) -> Self {
        Self {
            generation,
            state: AtomicU8::new(STATE_RUNNING),
        }
    }

    fn state(&self) -> TaskState {
        match self.state.load(Ordering::SeqCst) {
            STATE_RUNNING => TaskState::Running,
            STATE_COMPLETED => TaskState::Completed,
            _ => TaskState::Cancelled,
        }
    }

    fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::SeqCst) == STATE_CANCELLED
    }

    fn transition(&self, to: u8) -> bool {
        self.state
            .compare_exchange(STATE_RUNNING, to, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// `Running → Cancelled`，返回是否由本次调用完成取消。
    fn cancel(&self) -> bool {
        self.transition(STATE_CANCELLED)
    }

    /// `Running → Completed`，失败说明任务已被取消。
    fn complete(&self) -> bool {
        self.transition(STATE_COMPLETED)
    }
}

struct TaskSlot {
    ticket: Arc<TaskTicket>,
    join: Option<JoinHandle<()>>,
}

/// 投递闸门。守护的是“交接过程”而不是数据，中毒后照常使用。
type DeliveryGate = Arc<Mutex<()>>;

fn enter_gate(gate: &Mutex<()>) -> MutexGuard<'_, ()> {
    gate.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 一次模糊所需的全部输入。
#[derive(Debug, Clone)]
pub struct BlurRequest {
    pub frame: Frame,
    pub view_width: u32,
    pub view_height: u32,
    pub insets: Insets,
    pub config: BlurConfig,
}

/// 模糊任务控制器。可被多个 overlay 共享，按 `OverlayId` 隔离任务。
pub struct BlurTaskController {
    runtime: Handle,
    compositor: Arc<BackdropCompositor>,
    tasks: Mutex<HashMap<OverlayId, TaskSlot>>,
    gates: Mutex<HashMap<OverlayId, DeliveryGate>>,
    generations: AtomicU64,
}

impl BlurTaskController {
    /// 使用默认合成器（多趟盒式模糊）创建控制器。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use frosted_backdrop::backdrop::BlurTaskController;
    ///
    /// let runtime = tokio::runtime::Runtime::new()?;
    /// let controller = BlurTaskController::new(runtime.handle().clone());
    /// # Ok::<(), std::io::Error>(())
    /// ```
    pub fn new(runtime: Handle) -> Self {
        Self::with_compositor(runtime, BackdropCompositor::default())
    }

    /// 注入自定义合成器（例如替换模糊滤镜）。
    pub fn with_compositor(runtime: Handle, compositor: BackdropCompositor) -> Self {
        Self {
            runtime,
            compositor: Arc::new(compositor),
            tasks: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
            generations: AtomicU64::new(0),
        }
    }

    fn lock_tasks(&self) -> Result<MutexGuard<'_, HashMap<OverlayId, TaskSlot>>, BackdropError> {
        self.tasks
            .lock()
            .map_err(|_| BackdropError::StatePoisoned("模糊任务表锁已中毒".to_string()))
    }

    fn gate(&self, overlay: OverlayId) -> Result<DeliveryGate, BackdropError> {
        let mut gates = self
            .gates
            .lock()
            .map_err(|_| BackdropError::StatePoisoned("投递闸门表锁已中毒".to_string()))?;
        Ok(Arc::clone(gates.entry(overlay).or_default()))
    }

    /// 为 overlay 启动模糊任务，返回任务序号。
    ///
    /// 若该 overlay 还有未结束的任务，会先请求取消（不等待合成退出）。
    /// 旧任务正处于投递交接中时，等待交接结束后再返回。
    pub fn start(
        &self,
        overlay: OverlayId,
        host: Weak<dyn OverlayHost>,
        request: BlurRequest,
    ) -> Result<u64, BackdropError> {
        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let ticket = Arc::new(TaskTicket::new(generation));

        let gate = self.gate(overlay)?;
        let _delivery = enter_gate(&gate);
        let mut tasks = self.lock_tasks()?;
        if let Some(previous) = tasks.remove(&overlay) {
            if previous.ticket.cancel() {
                log::debug!(
                    "⏭️ overlay#{} 的任务 #{} 被任务 #{} 取代",
                    overlay.get(),
                    previous.ticket.generation,
                    generation
                );
            }
        }

        log::info!(
            "🚀 启动背景模糊任务 #{} - overlay#{} 帧 {}x{} 视图 {}x{}",
            generation,
            overlay.get(),
            request.frame.width(),
            request.frame.height(),
            request.view_width,
            request.view_height
        );

        let compositor = Arc::clone(&self.compositor);
        let task_ticket = Arc::clone(&ticket);
        let task_gate = Arc::clone(&gate);
        let join = self.runtime.spawn_blocking(move || {
            run_task(&compositor, &task_ticket, &task_gate, overlay, &host, request)
        });

        tasks.insert(
            overlay,
            TaskSlot {
                ticket,
                join: Some(join),
            },
        );

        Ok(generation)
    }

    /// 取消 overlay 当前的任务。返回 `true` 表示有运行中的任务被取消。
    ///
    /// 返回 `false` 时，结果要么从未产生，要么已在本次调用返回前投递完毕。
    pub fn cancel(&self, overlay: OverlayId) -> Result<bool, BackdropError> {
        let gate = self.gate(overlay)?;
        let _delivery = enter_gate(&gate);
        let tasks = self.lock_tasks()?;

        let cancelled = tasks
            .get(&overlay)
            .is_some_and(|slot| slot.ticket.cancel());
        if cancelled {
            log::debug!("⏹️ 已请求取消 overlay#{} 的模糊任务", overlay.get());
        }
        Ok(cancelled)
    }

    /// 查询 overlay 最近一次任务的状态。
    pub fn state(&self, overlay: OverlayId) -> Result<TaskState, BackdropError> {
        let tasks = self.lock_tasks()?;
        Ok(tasks
            .get(&overlay)
            .map_or(TaskState::Idle, |slot| slot.ticket.state()))
    }

    /// 取消并移除 overlay 的任务记录（overlay 销毁时调用）。
    pub fn forget(&self, overlay: OverlayId) -> Result<(), BackdropError> {
        let gate = self.gate(overlay)?;
        {
            let _delivery = enter_gate(&gate);
            let mut tasks = self.lock_tasks()?;
            if let Some(slot) = tasks.remove(&overlay) {
                slot.ticket.cancel();
            }
        }

        if let Ok(mut gates) = self.gates.lock() {
            gates.remove(&overlay);
        }
        Ok(())
    }

    /// 等待 overlay 当前任务的后台执行结束（结果已投递或已丢弃）。
    pub async fn join(&self, overlay: OverlayId) -> Result<(), BackdropError> {
        let join = {
            let mut tasks = self.lock_tasks()?;
            tasks.get_mut(&overlay).and_then(|slot| slot.join.take())
        };

        match join {
            Some(join) => join
                .await
                .map_err(|e| BackdropError::StatePoisoned(format!("模糊任务异常退出：{}", e))),
            None => Ok(()),
        }
    }
}

/// 后台线程上执行单个任务，并把结果转换为一次投递或一次丢弃。
fn run_task(
    compositor: &BackdropCompositor,
    ticket: &TaskTicket,
    gate: &Mutex<()>,
    overlay: OverlayId,
    host: &Weak<dyn OverlayHost>,
    request: BlurRequest,
) {
    let start = Instant::now();
    let BlurRequest {
        frame,
        view_width,
        view_height,
        insets,
        config,
    } = request;

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        compositor.composite_with_cancel(
            frame,
            view_width,
            view_height,
            &insets,
            &config,
            || ticket.is_cancelled(),
        )
    }))
    .unwrap_or_else(|payload| {
        Err(BackdropError::Blur(format!(
            "合成阶段 panic：{}",
            panic_message(payload.as_ref())
        )))
    });

    let Some(host) = host.upgrade() else {
        let _ = ticket.complete();
        log::debug!("🗑️ overlay#{} 已释放，丢弃任务 #{} 的结果", overlay.get(), ticket.generation);
        return;
    };

    match result {
        Ok(backdrop) => {
            let delivery = enter_gate(gate);
            if !ticket.complete() {
                drop(delivery);
                log::debug!("🗑️ 任务 #{} 已取消，丢弃结果", ticket.generation);
                host.on_backdrop_discarded();
                return;
            }

            if host.is_attached() {
                log::info!(
                    "✅ 背景模糊任务 #{} 完成 - {}x{} total={}ms",
                    ticket.generation,
                    backdrop.width(),
                    backdrop.height(),
                    start.elapsed().as_millis()
                );
                host.on_backdrop_ready(backdrop);
            } else {
                drop(delivery);
                log::debug!("🗑️ overlay#{} 已分离，丢弃任务 #{} 的结果", overlay.get(), ticket.generation);
                host.on_backdrop_discarded();
            }
        }
        Err(BackdropError::Cancelled) => {
            let _ = ticket.cancel();
            log::debug!("⏹️ 任务 #{} 在合成途中被取消", ticket.generation);
            host.on_backdrop_discarded();
        }
        Err(err) => {
            let escalate = ticket.complete() && err.is_escalated();
            log::warn!(
                "⚠️ 背景模糊任务 #{} 失败 - code={} stage={}：{}",
                ticket.generation,
                err.code(),
                err.stage(),
                err
            );
            if escalate {
                host.on_backdrop_failed(&err);
            }
            host.on_backdrop_discarded();
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("未知原因")
}
