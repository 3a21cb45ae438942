//! Headless host: loads a JSONL drawing, renders every tile covering it and
//! reports what the renderer produced.
//!
//! Usage: `scribe <drawing.jsonl> [config.json] [zoom]`

use std::fs::File;
use std::io::BufReader;
use std::process::ExitCode;
use std::time::Duration;

use renderer::TileEvent;
use scribe::{EngineConfig, InkEngine};
use tracing_subscriber::EnvFilter;

const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn run(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let Some(drawing_path) = args.first() else {
        return Err("usage: scribe <drawing.jsonl> [config.json] [zoom]".into());
    };
    let config = match args.get(1) {
        Some(path) => EngineConfig::from_json_str(&std::fs::read_to_string(path)?)?,
        None => EngineConfig::default(),
    };
    let zoom: f64 = match args.get(2) {
        Some(text) => text.parse()?,
        None => 1.0,
    };

    let mut engine = InkEngine::start(&config)?;
    let events = engine.tile_events();
    let mut reader = BufReader::new(File::open(drawing_path)?);
    engine.load_drawing(&mut reader)?;

    let drawing = engine.current_drawing();
    let bounds = drawing
        .strokes()
        .iter()
        .filter_map(|stroke| rasterizer::stroke_bounds(stroke, &config.renderer.raster, zoom))
        .reduce(|left, right| left.union(&right));
    let Some(visible) = bounds else {
        tracing::info!(strokes = drawing.len(), "drawing paints nothing");
        return Ok(());
    };

    let summary = engine.update_viewport(visible, zoom)?;
    tracing::info!(
        zoom_bucket = summary.zoom_bucket,
        tiles = summary.needed,
        dispatched = summary.dispatched,
        "rendering drawing"
    );
    if !engine.wait_for_idle(IDLE_TIMEOUT) {
        return Err("timed out waiting for tile renders".into());
    }

    let mut ready = 0usize;
    let mut inked = 0usize;
    for event in events.try_iter() {
        if let TileEvent::Ready { bitmap, .. } = event {
            ready += 1;
            if !bitmap.is_blank() {
                inked += 1;
            }
        }
    }
    println!(
        "{} strokes, {ready} tiles rendered at {}% ({inked} with ink)",
        drawing.len(),
        summary.zoom_bucket
    );
    Ok(())
}

fn main() -> ExitCode {
    init_logging();
    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(%error, "scribe failed");
            ExitCode::FAILURE
        }
    }
}
