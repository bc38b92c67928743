use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use frosted_backdrop::backdrop::{
    BackdropCompositor, BackdropError, BackdropImage, BackdropOverlay, BlurConfig, BlurFilter,
    BlurRequest, BlurTaskController, BoxBlur, CaptureSource, DrawSubscription, FirstDrawSignal,
    Frame, InsetProvider, Insets, OverlayHost, OverlayId,
};
use tokio::runtime::Runtime;

const WAIT: Duration = Duration::from_secs(10);
const QUIET: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Ready {
        width: u32,
        height: u32,
        top_margin: u32,
    },
    Discarded,
    Failed(&'static str),
    Removed(u64),
    StartReturned,
}

struct RecordingHost {
    tx: Mutex<Sender<Event>>,
    attach_delay: Duration,
    ready_delay: Duration,
}

impl RecordingHost {
    fn new() -> (Arc<Self>, Receiver<Event>) {
        Self::slow(Duration::ZERO, Duration::ZERO)
    }

    /// 模拟繁忙的 UI 线程：挂载检查与接收结果都要等待一段时间。
    fn slow(attach_delay: Duration, ready_delay: Duration) -> (Arc<Self>, Receiver<Event>) {
        let (tx, rx) = mpsc::channel();
        (
            Arc::new(Self {
                tx: Mutex::new(tx),
                attach_delay,
                ready_delay,
            }),
            rx,
        )
    }

    fn send(&self, event: Event) {
        if let Ok(tx) = self.tx.lock() {
            let _ = tx.send(event);
        }
    }
}

impl OverlayHost for RecordingHost {
    fn is_attached(&self) -> bool {
        thread::sleep(self.attach_delay);
        true
    }

    fn on_backdrop_ready(&self, backdrop: BackdropImage) {
        thread::sleep(self.ready_delay);
        self.send(Event::Ready {
            width: backdrop.width(),
            height: backdrop.height(),
            top_margin: backdrop.top_margin(),
        });
    }

    fn on_backdrop_discarded(&self) {
        self.send(Event::Discarded);
    }

    fn on_backdrop_failed(&self, error: &BackdropError) {
        self.send(Event::Failed(error.code()));
    }

    fn on_backdrop_removed(&self, fade_out_ms: u64) {
        self.send(Event::Removed(fade_out_ms));
    }
}

/// 模拟手机画面：1080x1920 截图，视图高 1800。
struct PhoneScreen {
    frame: Frame,
    visible: AtomicBool,
    captures: AtomicUsize,
    first_draw: FirstDrawSignal,
}

impl PhoneScreen {
    fn new(visible: bool) -> Arc<Self> {
        let mut pixels = Vec::with_capacity(1080 * 1920 * 4);
        for y in 0..1920u32 {
            let shade = (y % 256) as u8;
            for _ in 0..1080 {
                pixels.extend_from_slice(&[shade, 128, 255 - shade, 255]);
            }
        }

        Arc::new(Self {
            frame: Frame::from_rgba(1080, 1920, pixels).expect("valid frame"),
            visible: AtomicBool::new(visible),
            captures: AtomicUsize::new(0),
            first_draw: FirstDrawSignal::new(),
        })
    }

    fn draw(&self) {
        self.visible.store(true, Ordering::SeqCst);
        self.first_draw.notify();
    }

    fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }
}

impl CaptureSource for PhoneScreen {
    fn capture_current_frame(&self) -> Result<Frame, BackdropError> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        if self.visible.load(Ordering::SeqCst) {
            Ok(self.frame.clone())
        } else {
            Err(BackdropError::NotVisible)
        }
    }

    fn view_size(&self) -> (u32, u32) {
        (1080, 1800)
    }

    fn subscribe_first_draw(&self, callback: Box<dyn FnOnce() + Send>) -> DrawSubscription {
        self.first_draw.subscribe(callback)
    }
}

struct PhoneInsets {
    translucent: bool,
}

impl InsetProvider for PhoneInsets {
    fn chrome_height(&self) -> u32 {
        56
    }

    fn status_bar_height(&self) -> u32 {
        24
    }

    fn is_status_bar_translucent(&self) -> bool {
        self.translucent
    }

    fn bottom_bar_height(&self) -> u32 {
        0
    }
}

/// 模拟低端设备：进入模糊阶段后阻塞，直到测试放行。
struct GatedBlur {
    entered: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
}

impl GatedBlur {
    fn new() -> (Arc<Self>, Receiver<()>, Sender<()>) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        (
            Arc::new(Self {
                entered: Mutex::new(entered_tx),
                release: Mutex::new(release_rx),
            }),
            entered_rx,
            release_tx,
        )
    }
}

impl BlurFilter for GatedBlur {
    fn name(&self) -> &'static str {
        "gated"
    }

    fn apply(&self, pixels: &mut [u8], width: u32, height: u32, radius: u32) -> Result<(), BackdropError> {
        if let Ok(entered) = self.entered.lock() {
            let _ = entered.send(());
        }
        if let Ok(release) = self.release.lock() {
            let _ = release.recv_timeout(WAIT);
        }
        BoxBlur::with_passes(1).apply(pixels, width, height, radius)
    }
}

fn overlay_with(
    controller: Arc<BlurTaskController>,
    screen: &Arc<PhoneScreen>,
    host: &Arc<RecordingHost>,
    translucent: bool,
    config: BlurConfig,
) -> BackdropOverlay {
    let host: Arc<dyn OverlayHost> = host.clone();
    BackdropOverlay::new(
        controller,
        screen.clone(),
        Arc::new(PhoneInsets { translucent }),
        Arc::downgrade(&host),
        config,
    )
}

fn drain(rx: &Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.recv_timeout(QUIET) {
        events.push(event);
    }
    events
}

/// 收集事件直到满足 `done`，再收尾剩余事件。
fn collect_until(rx: &Receiver<Event>, done: impl Fn(&Event) -> bool) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.recv_timeout(WAIT) {
        let finished = done(&event);
        events.push(event);
        if finished {
            break;
        }
    }
    events.extend(drain(rx));
    events
}

fn square_request(size: u32) -> BlurRequest {
    BlurRequest {
        frame: Frame::from_rgba(size, size, vec![77; (size * size * 4) as usize]).expect("valid frame"),
        view_width: size,
        view_height: size,
        insets: Insets::default(),
        config: BlurConfig::default().with_blur_radius(2),
    }
}

fn is_ready_with_width(event: &Event, expected: u32) -> bool {
    matches!(event, Event::Ready { width, .. } if *width == expected)
}

#[test]
fn scenario_a_excludes_chrome_and_status_bar() {
    let runtime = Runtime::new().expect("runtime init failed");
    let controller = Arc::new(BlurTaskController::new(runtime.handle().clone()));
    let screen = PhoneScreen::new(true);
    let (host, rx) = RecordingHost::new();
    let overlay = overlay_with(controller, &screen, &host, false, BlurConfig::default());

    overlay.on_show().expect("show should succeed");

    assert_eq!(
        rx.recv_timeout(WAIT),
        Ok(Event::Ready {
            width: 178,
            height: 430,
            top_margin: 56
        })
    );
    assert!(overlay.has_backdrop());
}

#[test]
fn scenario_b_blur_chrome_moves_backdrop_to_top() {
    let runtime = Runtime::new().expect("runtime init failed");
    let controller = Arc::new(BlurTaskController::new(runtime.handle().clone()));
    let screen = PhoneScreen::new(true);
    let (host, rx) = RecordingHost::new();
    let config = BlurConfig::new(4.0, 8, true);
    let overlay = overlay_with(controller, &screen, &host, false, config);

    overlay.on_show().expect("show should succeed");

    // height = (1800 - 24) / 4, width = ceil(1080 * 444 / 1800 - 24)
    assert_eq!(
        rx.recv_timeout(WAIT),
        Ok(Event::Ready {
            width: 243,
            height: 444,
            top_margin: 0
        })
    );
}

#[test]
fn scenario_c_translucent_status_bar_is_ignored() {
    let runtime = Runtime::new().expect("runtime init failed");
    let controller = Arc::new(BlurTaskController::new(runtime.handle().clone()));
    let screen = PhoneScreen::new(true);
    let (host, rx) = RecordingHost::new();
    let overlay = overlay_with(controller, &screen, &host, true, BlurConfig::default());

    overlay.on_show().expect("show should succeed");

    // height = (1800 - 56) / 4, width = ceil(1080 * 436 / 1800 - 56)
    assert_eq!(
        rx.recv_timeout(WAIT),
        Ok(Event::Ready {
            width: 206,
            height: 436,
            top_margin: 56
        })
    );
}

#[test]
fn scenario_d_dismiss_during_compositing_discards_once() {
    let runtime = Runtime::new().expect("runtime init failed");
    let (gate, entered, release) = GatedBlur::new();
    let controller = Arc::new(BlurTaskController::with_compositor(
        runtime.handle().clone(),
        BackdropCompositor::new(gate),
    ));
    let screen = PhoneScreen::new(true);
    let (host, rx) = RecordingHost::new();
    let overlay = overlay_with(controller, &screen, &host, false, BlurConfig::default());

    overlay.on_show().expect("show should succeed");
    entered.recv_timeout(WAIT).expect("blur should start");

    overlay.on_dismiss().expect("dismiss should succeed");
    release.send(()).expect("gate open");

    assert_eq!(drain(&rx), vec![Event::Discarded]);
    assert!(!overlay.has_backdrop());
}

#[test]
fn second_start_supersedes_running_task() {
    let runtime = Runtime::new().expect("runtime init failed");
    let (gate, entered, release) = GatedBlur::new();
    let controller = BlurTaskController::with_compositor(
        runtime.handle().clone(),
        BackdropCompositor::new(gate),
    );
    let (host, rx) = RecordingHost::new();
    let host: Arc<dyn OverlayHost> = host;
    let overlay = OverlayId::next();

    let request = || BlurRequest {
        frame: Frame::from_rgba(64, 64, vec![77; 64 * 64 * 4]).expect("valid frame"),
        view_width: 64,
        view_height: 64,
        insets: Insets::default(),
        config: BlurConfig::default().with_blur_radius(2),
    };

    let first = controller
        .start(overlay, Arc::downgrade(&host), request())
        .expect("start should succeed");
    entered.recv_timeout(WAIT).expect("first blur should start");

    let second = controller
        .start(overlay, Arc::downgrade(&host), request())
        .expect("start should succeed");
    assert!(second > first);
    entered.recv_timeout(WAIT).expect("second blur should start");

    release.send(()).expect("gate open");
    release.send(()).expect("gate open");

    let events = drain(&rx);
    let ready = events.iter().filter(|e| matches!(e, Event::Ready { .. })).count();
    let discarded = events.iter().filter(|e| **e == Event::Discarded).count();
    assert_eq!((ready, discarded), (1, 1), "events: {events:?}");
}

#[test]
fn dropped_overlay_never_delivers() {
    let runtime = Runtime::new().expect("runtime init failed");
    let (gate, entered, release) = GatedBlur::new();
    let controller = Arc::new(BlurTaskController::with_compositor(
        runtime.handle().clone(),
        BackdropCompositor::new(gate),
    ));
    let screen = PhoneScreen::new(true);
    let (host, rx) = RecordingHost::new();
    let overlay = overlay_with(controller, &screen, &host, false, BlurConfig::default());

    overlay.on_show().expect("show should succeed");
    entered.recv_timeout(WAIT).expect("blur should start");
    drop(overlay);
    release.send(()).expect("gate open");

    assert!(drain(&rx).is_empty());
}

#[test]
fn first_draw_defers_capture_until_visible() {
    let runtime = Runtime::new().expect("runtime init failed");
    let controller = Arc::new(BlurTaskController::new(runtime.handle().clone()));
    let screen = PhoneScreen::new(false);
    let (host, rx) = RecordingHost::new();
    let overlay = overlay_with(controller, &screen, &host, false, BlurConfig::default());

    overlay.on_show().expect("show should succeed");
    assert!(overlay.is_waiting_for_draw());
    assert!(rx.recv_timeout(QUIET).is_err());

    screen.draw();

    assert!(matches!(rx.recv_timeout(WAIT), Ok(Event::Ready { height: 430, .. })));
    assert_eq!(screen.captures(), 2);
}

#[test]
fn first_draw_retries_capture_only_once() {
    let runtime = Runtime::new().expect("runtime init failed");
    let controller = Arc::new(BlurTaskController::new(runtime.handle().clone()));
    let screen = PhoneScreen::new(false);
    let (host, rx) = RecordingHost::new();
    let overlay = overlay_with(controller, &screen, &host, false, BlurConfig::default());

    overlay.on_show().expect("show should succeed");
    // 信号触发但画面仍不可截取
    screen.first_draw.notify();

    assert_eq!(drain(&rx), vec![Event::Discarded]);
    assert_eq!(screen.captures(), 2);
    assert!(!overlay.is_waiting_for_draw());
}

#[test]
fn invalid_geometry_reports_failure_then_discard() {
    let runtime = Runtime::new().expect("runtime init failed");
    let controller = BlurTaskController::new(runtime.handle().clone());
    let (host, rx) = RecordingHost::new();
    let host: Arc<dyn OverlayHost> = host;

    controller
        .start(
            OverlayId::next(),
            Arc::downgrade(&host),
            BlurRequest {
                frame: Frame::from_rgba(32, 32, vec![0; 32 * 32 * 4]).expect("valid frame"),
                view_width: 32,
                view_height: 32,
                insets: Insets::new(30, 10, 0),
                config: BlurConfig::default(),
            },
        )
        .expect("start should succeed");

    assert_eq!(drain(&rx), vec![Event::Failed("E_GEOMETRY"), Event::Discarded]);
}

#[test]
fn dismiss_after_ready_fades_out_with_configured_duration() {
    let runtime = Runtime::new().expect("runtime init failed");
    let controller = Arc::new(BlurTaskController::new(runtime.handle().clone()));
    let screen = PhoneScreen::new(true);
    let (host, rx) = RecordingHost::new();
    let config = BlurConfig::loading_dialog().with_animation_duration_ms(450);
    let overlay = overlay_with(controller, &screen, &host, false, config);

    overlay.on_show().expect("show should succeed");
    assert!(matches!(rx.recv_timeout(WAIT), Ok(Event::Ready { .. })));

    overlay.on_dismiss().expect("dismiss should succeed");
    assert_eq!(drain(&rx), vec![Event::Removed(450)]);
}

#[test]
fn superseded_task_in_handoff_never_delivers_after_start_returns() {
    let runtime = Runtime::new().expect("runtime init failed");
    let controller = BlurTaskController::new(runtime.handle().clone());
    let (host, rx) = RecordingHost::slow(Duration::from_millis(400), Duration::ZERO);
    let host_dyn: Arc<dyn OverlayHost> = host.clone();
    let overlay = OverlayId::next();

    // 64px 帧 -> 16px 背景，32px 帧 -> 8px 背景
    controller
        .start(overlay, Arc::downgrade(&host_dyn), square_request(64))
        .expect("start should succeed");
    thread::sleep(Duration::from_millis(150));
    controller
        .start(overlay, Arc::downgrade(&host_dyn), square_request(32))
        .expect("start should succeed");
    host.send(Event::StartReturned);

    let events = collect_until(&rx, |e| is_ready_with_width(e, 8));
    let returned = events
        .iter()
        .position(|e| *e == Event::StartReturned)
        .expect("start marker recorded");

    assert!(
        events[returned..].iter().all(|e| !is_ready_with_width(e, 16)),
        "superseded task delivered late: {events:?}"
    );
    assert_eq!(events.iter().filter(|e| is_ready_with_width(e, 8)).count(), 1);
    assert!(events.iter().filter(|e| is_ready_with_width(e, 16)).count() <= 1);
}

#[test]
fn dismiss_during_handoff_removes_after_ready() {
    let runtime = Runtime::new().expect("runtime init failed");
    let controller = Arc::new(BlurTaskController::new(runtime.handle().clone()));
    let screen = PhoneScreen::new(true);
    let (host, rx) = RecordingHost::slow(Duration::ZERO, Duration::from_millis(300));
    let overlay = overlay_with(controller, &screen, &host, false, BlurConfig::default());

    overlay.on_show().expect("show should succeed");
    let deadline = Instant::now() + WAIT;
    while !overlay.has_backdrop() {
        assert!(Instant::now() < deadline, "backdrop never reached the host");
        thread::sleep(Duration::from_millis(1));
    }
    overlay.on_dismiss().expect("dismiss should succeed");

    let events = collect_until(&rx, |e| matches!(e, Event::Removed(_)));
    assert_eq!(
        events,
        vec![
            Event::Ready {
                width: 178,
                height: 430,
                top_margin: 56
            },
            Event::Removed(300),
        ]
    );
}

struct PanickingBlur;

impl BlurFilter for PanickingBlur {
    fn name(&self) -> &'static str {
        "panicking"
    }

    fn apply(&self, _pixels: &mut [u8], _width: u32, _height: u32, _radius: u32) -> Result<(), BackdropError> {
        panic!("filter exploded");
    }
}

#[test]
fn panicking_filter_is_converted_to_discard() {
    let runtime = Runtime::new().expect("runtime init failed");
    let controller = BlurTaskController::with_compositor(
        runtime.handle().clone(),
        BackdropCompositor::new(Arc::new(PanickingBlur)),
    );
    let (host, rx) = RecordingHost::new();
    let host: Arc<dyn OverlayHost> = host;
    let overlay = OverlayId::next();

    controller
        .start(overlay, Arc::downgrade(&host), square_request(64))
        .expect("start should succeed");

    assert_eq!(collect_until(&rx, |e| *e == Event::Discarded), vec![Event::Discarded]);
    runtime
        .block_on(controller.join(overlay))
        .expect("task should not surface the panic");
}

#[test]
fn huge_blur_radius_from_settings_still_delivers() {
    let runtime = Runtime::new().expect("runtime init failed");
    let controller = Arc::new(BlurTaskController::new(runtime.handle().clone()));
    let screen = PhoneScreen::new(true);
    let (host, rx) = RecordingHost::new();
    let config = BlurConfig::default().with_blur_radius(i32::MAX);
    let overlay = overlay_with(controller, &screen, &host, false, config);

    overlay.on_show().expect("show should succeed");

    assert!(matches!(
        rx.recv_timeout(WAIT),
        Ok(Event::Ready {
            width: 178,
            height: 430,
            ..
        })
    ));
}
