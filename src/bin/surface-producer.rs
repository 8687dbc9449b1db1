use std::fs::File;
use std::io::{BufReader, Write as _};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use surface_producer::{
    InMemoryBufferQueue, InMemoryQueueOpts, LockedSurface, NativeWindow as _, ProducerError,
    QueryOp, Rect, SlotId, StaticComposer, StatusCode, Surface, SurfaceOpts,
};

#[derive(Parser, Debug)]
#[command(name = "surface-producer", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Draw frames through a software surface into an in-memory queue, one JSON line per frame.
    Simulate(SimulateArgs),
}

#[derive(Parser, Debug)]
struct SimulateArgs {
    /// Number of frames to draw.
    #[arg(long, default_value_t = 8)]
    frames: u32,

    /// Requested buffer width (0 uses the queue default).
    #[arg(long, default_value_t = 0)]
    width: u32,

    /// Requested buffer height (0 uses the queue default).
    #[arg(long, default_value_t = 0)]
    height: u32,

    /// JSON file with `surface` and `queue` options.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Only latch a queued frame when the producer would otherwise block.
    #[arg(long)]
    no_consume: bool,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SimConfig {
    surface: SurfaceOpts,
    queue: InMemoryQueueOpts,
}

#[derive(Debug, serde::Serialize)]
struct FrameReport {
    frame: u32,
    slot: Option<SlotId>,
    dirty: Rect,
    copied_area: u64,
    pending: usize,
    running_behind: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Simulate(args) => cmd_simulate(args),
    }
}

fn read_config(path: &Path) -> anyhow::Result<SimConfig> {
    let f = File::open(path).with_context(|| format!("open config '{}'", path.display()))?;
    let cfg = serde_json::from_reader(BufReader::new(f)).with_context(|| "parse config JSON")?;
    Ok(cfg)
}

fn lock_frame(
    surface: &Surface,
    queue: &InMemoryBufferQueue,
    dirty: Rect,
) -> anyhow::Result<LockedSurface> {
    loop {
        match surface.lock(Some(dirty)) {
            Err(ProducerError::Remote(StatusCode::WOULD_BLOCK)) if queue.consume().is_some() => {
                tracing::debug!("producer blocked, latched a queued frame");
            }
            other => return Ok(other?),
        }
    }
}

fn cmd_simulate(args: SimulateArgs) -> anyhow::Result<()> {
    let mut cfg = match &args.config {
        Some(path) => read_config(path)?,
        None => SimConfig::default(),
    };
    if args.no_consume {
        cfg.queue.auto_consume = false;
    }

    let (w, h) = if args.width > 0 && args.height > 0 {
        (args.width, args.height)
    } else {
        (cfg.queue.default_width, cfg.queue.default_height)
    };

    let queue = Arc::new(InMemoryBufferQueue::new(cfg.queue));
    let surface = Surface::with_opts(queue.clone(), Arc::new(StaticComposer(true)), cfg.surface);
    if args.width > 0 || args.height > 0 {
        let width = i32::try_from(args.width).context("width out of range")?;
        let height = i32::try_from(args.height).context("height out of range")?;
        surface.session().set_buffers_dimensions(width, height)?;
    }

    let band = (h / 8).max(1);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for frame in 0..args.frames {
        let top = i32::try_from((frame * band) % h.max(1)).context("band offset out of range")?;
        let dirty = Rect::from_size(w, band);
        let dirty = Rect::new(0, top, dirty.right, top + dirty.bottom);

        let locked = lock_frame(&surface, &queue, dirty)?;
        let shade = (frame.wrapping_mul(37) & 0xff) as u8;
        let bpp = locked.bytes_per_pixel()?;
        let pixel: Vec<u8> = (0..bpp).map(|i| if i + 1 == bpp { 0xff } else { shade }).collect();
        locked.fill_rect(locked.dirty_bounds, &pixel)?;
        let report_dirty = locked.dirty_bounds;
        let copied_area = locked.copied_back.area();
        drop(locked);
        surface.unlock_and_post()?;

        let running_behind = surface.query(QueryOp::ConsumerRunningBehind)? != 0;
        let report = FrameReport {
            frame,
            slot: queue.last_frame().map(|f| f.slot),
            dirty: report_dirty,
            copied_area,
            pending: queue.pending(),
            running_behind,
        };
        serde_json::to_writer(&mut out, &report)?;
        writeln!(out)?;
    }
    Ok(())
}
