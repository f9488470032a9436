// This file is an example of how to use the `waldo_zones` library.
// It lays out a row of eight zones, sweeps a synthetic bright square across them on
// an engine running on its own task, and prints each transition as it is broadcast.

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;
use waldo_zones::async_pipeline;
use waldo_zones::{EngineConfig, Frame, MotionEngine, NormRect, PixelFormat};

const WIDTH: u32 = 96;
const HEIGHT: u32 = 48;
const SQUARE: u32 = 8;
const ZONES: usize = 8;

/// A dark frame with a bright square whose left edge sits at `x`.
fn synthetic_frame(x: u32) -> anyhow::Result<Frame> {
    let top = HEIGHT / 8;
    let mut samples = vec![0.05; (WIDTH * HEIGHT) as usize];
    for row in top..top + SQUARE {
        for col in x..(x + SQUARE).min(WIDTH) {
            samples[(row * WIDTH + col) as usize] = 0.95;
        }
    }
    Ok(Frame::from_normalized(WIDTH, HEIGHT, PixelFormat::Luma, samples)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("Waldo Zones Engine - Example Runner");

    let mut engine = MotionEngine::new(EngineConfig::default())?;

    let padding = 0.01;
    let (zone_width, zone_height) = (0.09, 0.1);
    let h_offset = (1.0 - (ZONES as f32 * zone_width + (ZONES - 1) as f32 * padding)) / 2.0;
    let v_offset = 0.15;
    for i in 0..ZONES {
        let rect = NormRect::new(
            h_offset + i as f32 * (zone_width + padding),
            v_offset,
            zone_width,
            zone_height,
        )?;
        engine.register(i, rect, None, |zone, _| {
            info!(zone = %zone.id, fill = zone.fill_factor, active = zone.is_movement_detected, "zone changed");
        })?;
    }

    let handle = async_pipeline::spawn(engine, 4);
    let mut events = handle.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(zone) = events.recv().await {
            let state = if zone.is_movement_detected { "ON " } else { "off" };
            println!("zone {:>2} {state} fill {:.3}", zone.id, zone.fill_factor);
        }
    });

    for step in 0..(WIDTH / 2) {
        handle.submit(synthetic_frame(step * 2)?).await?;
    }

    let engine = handle.shutdown().await?;
    printer.await.context("event printer task failed")?;

    for zone in engine.zones().iter() {
        let target = zone.rect().to_target(0.0, 0.0, WIDTH as f32, HEIGHT as f32);
        println!(
            "zone {:>2} at ({:.1}, {:.1}) {:.1}x{:.1}: active={}",
            zone.id(),
            target.x,
            target.y,
            target.w,
            target.h,
            zone.is_movement_detected()
        );
    }
    println!("Processed {} frames.", engine.frame_count());
    Ok(())
}
