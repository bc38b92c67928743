//! # 毛玻璃背景预览 — 命令行入口
//!
//! 读取一张截图，按设置文件与给定占位生成模糊背景并保存为 PNG。
//! 走的是与真实宿主相同的 overlay → 控制器 → 合成链路，便于调参与排查。
//!
//! ```text
//! backdrop-preview <input> <output.png> [settings.json] [--chrome N] [--status N] [--bottom N] [--translucent]
//! ```

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use frosted_backdrop::backdrop::{
    BackdropError, BackdropImage, BackdropOverlay, BlurConfig, BlurTaskController, CaptureSource,
    DrawSubscription, FirstDrawSignal, Frame, InsetProvider, OverlayHost,
};
use frosted_backdrop::error::AppError;
use frosted_backdrop::settings;

const USAGE: &str = "用法: backdrop-preview <input> <output.png> [settings.json] [--chrome N] [--status N] [--bottom N] [--translucent]";

#[derive(Debug, Default)]
struct PreviewArgs {
    input: PathBuf,
    output: PathBuf,
    settings: Option<PathBuf>,
    chrome_height: u32,
    status_bar_height: u32,
    bottom_bar_height: u32,
    translucent: bool,
}

impl PreviewArgs {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self, AppError> {
        let mut parsed = Self::default();
        let mut positional = Vec::new();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--chrome" => parsed.chrome_height = Self::pixels(&arg, args.next())?,
                "--status" => parsed.status_bar_height = Self::pixels(&arg, args.next())?,
                "--bottom" => parsed.bottom_bar_height = Self::pixels(&arg, args.next())?,
                "--translucent" => parsed.translucent = true,
                "-h" | "--help" => return Err(AppError::Usage(USAGE.to_string())),
                _ => positional.push(PathBuf::from(arg)),
            }
        }

        let mut positional = positional.into_iter();
        match (positional.next(), positional.next()) {
            (Some(input), Some(output)) => {
                parsed.input = input;
                parsed.output = output;
            }
            _ => return Err(AppError::Usage(USAGE.to_string())),
        }
        parsed.settings = positional.next();

        if positional.next().is_some() {
            return Err(AppError::Usage(USAGE.to_string()));
        }
        Ok(parsed)
    }

    fn pixels(flag: &str, value: Option<String>) -> Result<u32, AppError> {
        value
            .as_deref()
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| AppError::Usage(format!("{} 需要一个非负整数像素值", flag)))
    }
}

/// 静态截图：始终可见，首次绘制信号在构造时即已触发。
struct StillCapture {
    frame: Frame,
    first_draw: FirstDrawSignal,
}

impl StillCapture {
    fn new(frame: Frame) -> Self {
        let first_draw = FirstDrawSignal::new();
        first_draw.notify();
        Self { frame, first_draw }
    }
}

impl CaptureSource for StillCapture {
    fn capture_current_frame(&self) -> Result<Frame, BackdropError> {
        Ok(self.frame.clone())
    }

    fn view_size(&self) -> (u32, u32) {
        (self.frame.width(), self.frame.height())
    }

    fn subscribe_first_draw(&self, callback: Box<dyn FnOnce() + Send>) -> DrawSubscription {
        self.first_draw.subscribe(callback)
    }
}

struct FixedInsets {
    chrome_height: u32,
    status_bar_height: u32,
    bottom_bar_height: u32,
    translucent: bool,
}

impl InsetProvider for FixedInsets {
    fn chrome_height(&self) -> u32 {
        self.chrome_height
    }

    fn status_bar_height(&self) -> u32 {
        self.status_bar_height
    }

    fn is_status_bar_translucent(&self) -> bool {
        self.translucent
    }

    fn bottom_bar_height(&self) -> u32 {
        self.bottom_bar_height
    }
}

#[derive(Default)]
struct PreviewHost {
    backdrop: Mutex<Option<BackdropImage>>,
    failure: Mutex<Option<BackdropError>>,
}

impl OverlayHost for PreviewHost {
    fn on_backdrop_ready(&self, backdrop: BackdropImage) {
        if let Ok(mut slot) = self.backdrop.lock() {
            *slot = Some(backdrop);
        }
    }

    fn on_backdrop_discarded(&self) {
        log::debug!("背景结果已丢弃");
    }

    fn on_backdrop_failed(&self, error: &BackdropError) {
        if let Ok(mut slot) = self.failure.lock() {
            *slot = Some(error.clone());
        }
    }
}

impl PreviewHost {
    fn take_result(&self) -> Result<BackdropImage, AppError> {
        if let Some(backdrop) = self.backdrop.lock().ok().and_then(|mut slot| slot.take()) {
            return Ok(backdrop);
        }
        match self.failure.lock().ok().and_then(|mut slot| slot.take()) {
            Some(error) => Err(error.into()),
            None => Err(BackdropError::Cancelled.into()),
        }
    }
}

async fn run() -> Result<(), AppError> {
    let args = PreviewArgs::parse(std::env::args().skip(1))?;

    let config = match &args.settings {
        Some(path) => settings::load_blur_settings(path)?,
        None => BlurConfig::default(),
    };
    log::info!(
        "⚙️ 模糊配置 - profile={} factor={} radius={} blur_chrome={}",
        config.infer_profile().as_str(),
        config.downscale_factor(),
        config.blur_radius(),
        config.blur_chrome()
    );

    let image = image::open(&args.input)?;
    let capture = Arc::new(StillCapture::new(Frame::new(image)));
    let insets = Arc::new(FixedInsets {
        chrome_height: args.chrome_height,
        status_bar_height: args.status_bar_height,
        bottom_bar_height: args.bottom_bar_height,
        translucent: args.translucent,
    });

    let host = Arc::new(PreviewHost::default());
    let host_dyn: Arc<dyn OverlayHost> = host.clone();
    let controller = Arc::new(BlurTaskController::new(tokio::runtime::Handle::current()));
    let overlay = BackdropOverlay::new(
        Arc::clone(&controller),
        capture,
        insets,
        Arc::downgrade(&host_dyn),
        config,
    );

    overlay.on_show()?;
    controller.join(overlay.id()).await?;

    let backdrop = host.take_result()?;
    backdrop.image().save(&args.output)?;
    log::info!(
        "💾 背景已保存 {} - {}x{} top_margin={}",
        args.output.display(),
        backdrop.width(),
        backdrop.height(),
        backdrop.top_margin()
    );

    overlay.on_dismiss()?;
    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run().await {
        log::error!("❌ 预览失败: {err}");
        std::process::exit(1);
    }
}
