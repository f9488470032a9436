use anyhow::{Context, bail};
use clap::Parser;
use image::{Rgba, RgbaImage};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use waldo_zones::core_modules::utils::image_helper::image_helper;
use waldo_zones::{EngineConfig, Frame, MotionEngine, NormRect, ZoneId, ZoneSnapshot};

const FRAME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

const TRIGGERED: Rgba<u8> = Rgba([255, 48, 48, 255]);
const IDLE: Rgba<u8> = Rgba([48, 220, 96, 255]);
const DISABLED: Rgba<u8> = Rgba([128, 128, 128, 255]);

/// Replays a directory of still frames through the motion engine.
#[derive(Parser, Debug)]
#[command(author, version, about = "Replay frames through waldo_zones", long_about = None)]
struct Args {
    /// Directory holding the input frames, processed in file-name order.
    input_dir: PathBuf,

    /// Directory for diagnostic images. Nothing is written when omitted.
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// JSON session file with the engine configuration and zone list.
    #[arg(short, long)]
    session: Option<PathBuf>,

    /// Capture rate used to timestamp transitions.
    #[arg(long, default_value_t = 30.0)]
    fps: f64,
}

/// A zone as written in a session file.
#[derive(Debug, Deserialize)]
struct ZoneSpec {
    id: ZoneId,
    rect: NormRect,
    #[serde(default)]
    fill_threshold: Option<f32>,
    #[serde(default = "enabled_by_default")]
    enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

/// Engine configuration plus the zones to register.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Session {
    engine: EngineConfig,
    zones: Vec<ZoneSpec>,
}

impl Session {
    fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading session file {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing session file {}", path.display()))
    }

    /// Builds the engine; without any zones a single full-frame zone is watched.
    fn build(self) -> anyhow::Result<MotionEngine> {
        let mut engine = MotionEngine::new(self.engine)?;
        if self.zones.is_empty() {
            engine.register_silent("full", NormRect::full(), None)?;
        }
        for zone in self.zones {
            let id = zone.id.clone();
            engine.register_silent(zone.id, zone.rect, zone.fill_threshold)?;
            if !zone.enabled {
                engine.zones_mut().set_enabled(id, false)?;
            }
        }
        Ok(engine)
    }
}

fn frame_paths(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("listing {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        })
        .collect();
    paths.sort();
    Ok(paths)
}

/// Draws a one-pixel outline for every zone: red when triggered, green when idle,
/// gray when disabled. Degenerate zones are skipped.
fn draw_zones(canvas: &mut RgbaImage, zones: &[ZoneSnapshot]) {
    let (width, height) = canvas.dimensions();
    for zone in zones {
        let Some(bounds) = zone.rect.pixel_bounds(width, height) else {
            continue;
        };
        let color = match (zone.is_enabled, zone.is_movement_detected) {
            (false, _) => DISABLED,
            (true, true) => TRIGGERED,
            (true, false) => IDLE,
        };
        let (right, bottom) = (bounds.x1 - 1, bounds.y1 - 1);
        for x in bounds.x0..bounds.x1 {
            canvas.put_pixel(x, bounds.y0, color);
            canvas.put_pixel(x, bottom, color);
        }
        for y in bounds.y0..bounds.y1 {
            canvas.put_pixel(bounds.x0, y, color);
            canvas.put_pixel(right, y, color);
        }
    }
}

fn save_diagnostics(engine: &MotionEngine, dir: &Path, index: usize) -> anyhow::Result<()> {
    image_helper::save_gray(dir.join(format!("{index:05}_difference.png")), &engine.difference_frame().to_gray_image())?;
    image_helper::save_gray(dir.join(format!("{index:05}_threshold.png")), &engine.threshold_frame().to_gray_image())?;
    if let Some(background) = engine.background_frame() {
        image_helper::save_rgba(dir.join(format!("{index:05}_background.png")), &background.to_rgba_image())?;
    }
    if let Some(current) = engine.current_frame() {
        let mut overlay = current.to_rgba_image();
        draw_zones(&mut overlay, &engine.zones().snapshots());
        image_helper::save_rgba(dir.join(format!("{index:05}_zones.png")), &overlay)?;
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if !(args.fps.is_finite() && args.fps > 0.0) {
        bail!("--fps must be a positive number, got {}", args.fps);
    }

    let session = match &args.session {
        Some(path) => Session::load(path)?,
        None => Session::default(),
    };
    let mut engine = session.build()?;

    let paths = frame_paths(&args.input_dir)?;
    if paths.is_empty() {
        warn!(dir = %args.input_dir.display(), "no frames found");
        return Ok(());
    }
    if let Some(dir) = &args.output_dir {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    for (index, path) in paths.iter().enumerate() {
        let image = image::open(path).with_context(|| format!("decoding {}", path.display()))?;
        let elapsed = Duration::from_secs_f64(index as f64 / args.fps);
        let report = engine.tick_at(Frame::from(&image), elapsed)?;
        if report.has_transitions() {
            println!("{}", serde_json::to_string(&report)?);
        }
        if let Some(dir) = &args.output_dir {
            save_diagnostics(&engine, dir, index)?;
        }
    }

    info!(frames = engine.frame_count(), "replay complete");
    for zone in engine.zones().iter() {
        info!(zone = %zone.id(), active = zone.is_movement_detected(), fill = zone.fill_factor(), "final state");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_file_registers_zones() {
        let session: Session = serde_json::from_str(
            r#"{
                "engine": { "mode": "static", "threshold": 0.2 },
                "zones": [
                    { "id": 1, "rect": { "x": 0.0, "y": 0.0, "w": 0.5, "h": 0.5 } },
                    { "id": "door", "rect": { "x": 0.5, "y": 0.0, "w": 0.5, "h": 1.0 },
                      "fill_threshold": 0.3, "enabled": false }
                ]
            }"#,
        )
        .unwrap();
        let engine = session.build().unwrap();

        assert_eq!(engine.config().threshold, 0.2);
        assert_eq!(engine.zones().len(), 2);
        assert!(engine.zone(1).unwrap().is_enabled());
        let door = engine.zone("door").unwrap();
        assert!(!door.is_enabled());
        assert_eq!(door.fill_threshold_override(), Some(0.3));
    }

    fn snapshot(rect: NormRect, enabled: bool, triggered: bool) -> ZoneSnapshot {
        ZoneSnapshot {
            id: ZoneId::from("z"),
            rect,
            is_enabled: enabled,
            is_movement_detected: triggered,
            is_changed: false,
            fill_factor: 0.0,
            fill_threshold: 0.02,
            has_threshold_override: false,
            changed_at: None,
        }
    }

    #[test]
    fn zone_outlines_follow_state() {
        let mut canvas = RgbaImage::new(10, 10);
        let left = NormRect::new(0.0, 0.0, 0.5, 0.5).unwrap();
        let right = NormRect::new(0.6, 0.6, 0.3, 0.3).unwrap();
        let flat = NormRect::new(0.2, 0.8, 0.5, 0.0).unwrap();
        draw_zones(
            &mut canvas,
            &[
                snapshot(left, true, true),
                snapshot(right, false, false),
                snapshot(flat, true, false),
            ],
        );

        assert_eq!(*canvas.get_pixel(0, 0), TRIGGERED);
        assert_eq!(*canvas.get_pixel(5, 5), TRIGGERED);
        assert_eq!(*canvas.get_pixel(2, 2), Rgba([0, 0, 0, 0]));
        assert_eq!(*canvas.get_pixel(6, 6), DISABLED);
        assert_eq!(*canvas.get_pixel(4, 8), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn empty_session_watches_the_whole_frame() {
        let engine = Session::default().build().unwrap();
        assert_eq!(engine.zone("full").unwrap().rect(), NormRect::full());
    }
}
