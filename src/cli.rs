// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Simulating a panorama sweep end to end
//! - Showing and initialising the configuration

use image::{Rgba, RgbaImage};
use pano_capture::backends::stitcher::{SimulatedStitcher, SimulationPlan, SweepAxis};
use pano_capture::config::{PanoGeometry, PanoramaConfig};
use pano_capture::media::conversions::Orientation;
use pano_capture::pipelines::panorama::{
    FrameProcessor, OrientationTracker, PanoController, SessionEvent, SessionOutcome,
    SessionServices,
};
use pano_capture::storage::DiskMediaStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// How long to wait for the session outcome after the last frame
const OUTCOME_TIMEOUT: Duration = Duration::from_secs(60);

pub struct SimulateOptions {
    pub width: u32,
    pub height: u32,
    pub frames: usize,
    pub vertical: bool,
    pub step: i32,
    pub source: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub cancel_after: Option<usize>,
}

/// Scene the virtual camera pans across
enum Scene {
    Synthetic,
    Image(RgbaImage),
}

impl Scene {
    /// Camera frame whose top-left corner sits at `(x, y)` in the scene
    ///
    /// Image scenes wrap around at their edges.
    fn frame_at(&self, x: i64, y: i64, width: u32, height: u32) -> RgbaImage {
        match self {
            Scene::Synthetic => RgbaImage::from_fn(width, height, |px, py| {
                synthetic_pixel(x + px as i64, y + py as i64)
            }),
            Scene::Image(img) => {
                let (w, h) = (img.width() as i64, img.height() as i64);
                RgbaImage::from_fn(width, height, |px, py| {
                    let sx = (x + px as i64).rem_euclid(w) as u32;
                    let sy = (y + py as i64).rem_euclid(h) as u32;
                    *img.get_pixel(sx, sy)
                })
            }
        }
    }
}

/// Colour bands with a checker overlay so motion is visible in both axes
fn synthetic_pixel(x: i64, y: i64) -> Rgba<u8> {
    let band = x.rem_euclid(768);
    let r = (band.min(255)) as u8;
    let g = ((band - 256).clamp(0, 255)) as u8;
    let b = ((band - 512).clamp(0, 255)) as u8;
    let checker = ((x.div_euclid(40) + y.div_euclid(40)) & 1) == 0;
    let shade = if checker { 0 } else { 48 };
    Rgba([
        r.saturating_add(shade),
        g.saturating_add(shade),
        b.saturating_add(shade),
        255,
    ])
}

/// Sweep a scene through the full pipeline and save the result
pub fn simulate(options: SimulateOptions) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = PanoramaConfig::load(options.config.as_deref())?;
    if let Some(dir) = options.output {
        config.output_dir = Some(dir);
    }

    let (width, height) = (options.width, options.height);
    let geometry = PanoGeometry::from_config(&config, (width, height), (width, height));

    let scene = match &options.source {
        Some(path) => {
            println!("Loading scene from {}", path.display());
            Scene::Image(image::open(path)?.to_rgba8())
        }
        None => Scene::Synthetic,
    };

    // Engine positions move against the sweep: a rightward pan reports
    // decreasing x
    let axis = if options.vertical {
        SweepAxis::Vertical
    } else {
        SweepAxis::Horizontal
    };
    let engine = Arc::new(SimulatedStitcher::new(SimulationPlan::sweep(
        axis,
        -options.step,
    )));
    let output_dir = config.output_dir();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<SessionEvent>();

    let services = SessionServices {
        engine: engine.clone(),
        store: Arc::new(DiskMediaStore::new(&output_dir)),
        listener: Arc::new(tx),
    };
    let controller = PanoController::new(
        config,
        geometry,
        OrientationTracker::new(Orientation::Deg0, Orientation::Deg0),
        services,
    )?;
    let processor = FrameProcessor::start(controller)?;

    // Set up Ctrl+C handler
    let cancel_flag = Arc::new(AtomicBool::new(false));
    let cancel_flag_clone = Arc::clone(&cancel_flag);
    ctrlc::set_handler(move || {
        cancel_flag_clone.store(true, Ordering::SeqCst);
    })?;

    // Camera pixels the scene moves per frame
    let shift = (options.step as f32 / geometry.preview_ratio).round() as i64;

    println!(
        "Simulating {} sweep: {}x{} frames, preview {}x{}, {} px per frame",
        if options.vertical { "vertical" } else { "horizontal" },
        width,
        height,
        geometry.thumb_width,
        geometry.thumb_height,
        options.step
    );
    println!("Press Ctrl+C to cancel");

    let start = Instant::now();
    processor.change_pano_status(true, false);

    let mut fed = 0;
    for n in 0..options.frames {
        if cancel_flag.load(Ordering::SeqCst) || options.cancel_after == Some(n) {
            println!("Cancelling...");
            wait_idle(&processor);
            processor.change_pano_status(false, true);
            break;
        }

        wait_idle(&processor);
        if !processor.is_active() {
            break;
        }

        let offset = n as i64 * shift;
        let frame = if options.vertical {
            scene.frame_at(0, offset, width, height)
        } else {
            scene.frame_at(offset, 0, width, height)
        };
        if processor.submit_frame(frame) {
            fed += 1;
        }
    }

    wait_idle(&processor);
    if processor.is_active() {
        println!("Out of frames, finishing panorama");
        processor.change_pano_status(false, false);
    }

    if engine.counts().init == 0 {
        println!("Cancelled before the session started");
        return Ok(());
    }

    let rt = tokio::runtime::Runtime::new()?;
    let event = rt.block_on(async { tokio::time::timeout(OUTCOME_TIMEOUT, rx.recv()).await })?;
    drop(processor);

    let Some(event) = event else {
        return Err("Session ended without an outcome".into());
    };

    let counts = engine.counts();
    println!();
    println!("Session {}", event.session);
    println!("Frames fed: {}", fed);
    println!("Key frames registered: {}", counts.key_frames);
    println!("Elapsed: {:.2}s", start.elapsed().as_secs_f64());

    match event.outcome {
        SessionOutcome::Saved { media, thumbnail } => {
            println!("Panorama saved: {}", media.path.display());
            println!(
                "Size: {} bytes, advertised {}x{}, rotation {}",
                media.bytes, media.width, media.height, media.rotation
            );
            if let Some(thumb) = thumbnail {
                println!("Thumbnail: {}x{}", thumb.width(), thumb.height());
            }
            Ok(())
        }
        SessionOutcome::Cancelled { message } => {
            println!("Cancelled: {}", message);
            Ok(())
        }
        SessionOutcome::Failed { message } => Err(message.into()),
    }
}

/// Let the processor finish the frame in flight
fn wait_idle(processor: &FrameProcessor) {
    while processor.is_busy() {
        std::thread::sleep(Duration::from_millis(1));
    }
}

/// Print the effective configuration, optionally writing it out
pub fn show_config(path: Option<PathBuf>, init: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = PanoramaConfig::load(path.as_deref())?;
    println!("{}", config.to_json()?);

    if init {
        let target = match path.or_else(PanoramaConfig::default_path) {
            Some(p) => p,
            None => return Err("No config directory available".into()),
        };
        config.save(&target)?;
        println!("Wrote {}", target.display());
    }

    Ok(())
}
