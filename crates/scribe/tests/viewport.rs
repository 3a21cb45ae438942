use std::time::Duration;

use driver::RawPointerInput;
use model::{DrawingRect, Edit, Sample, Stroke, StrokeId, StrokeStyle};
use renderer::{ManualDispatcher, RendererConfig, TileEvent};
use scribe::{EngineConfig, InkEngine, PointerDeviceKind, PointerEventPhase, TilePhase};
use tiles::TileKey;

const TILE: u32 = 64;

fn config() -> EngineConfig {
    EngineConfig {
        renderer: RendererConfig {
            tile_size: TILE,
            cache_capacity: 16,
            padding_tiles: 0,
            ..RendererConfig::default()
        },
        ..EngineConfig::default()
    }
}

fn horizontal_stroke(y: f64, from_x: f64, to_x: f64) -> Stroke {
    let samples = (0..=6)
        .map(|step| {
            let t = step as f64 / 6.0;
            Sample::capture((from_x + (to_x - from_x) * t, y), 0.7, None, None, t, 3.0)
        })
        .collect();
    Stroke::new(StrokeId::new_random(), samples, StrokeStyle::default())
}

fn settle(engine: &mut InkEngine<ManualDispatcher>) {
    engine.renderer_mut().dispatcher_mut().complete_all();
    engine.pump();
}

fn ink_at(engine: &InkEngine<ManualDispatcher>, key: TileKey) -> bool {
    let bitmap = engine.displayed_tile(&key).expect("tile shown");
    !bitmap.is_blank()
}

#[test]
fn edits_rerender_only_the_tiles_they_touch() {
    let mut engine = InkEngine::with_dispatcher(&config(), ManualDispatcher::new())
        .expect("create engine");
    let left = TileKey::new(0, 0, 100);
    let right = TileKey::new(1, 0, 100);

    let summary = engine
        .update_viewport(DrawingRect::new(0.0, 0.0, 128.0, 64.0), 1.0)
        .expect("update viewport");
    assert_eq!(summary.needed, 2);
    settle(&mut engine);
    assert!(!ink_at(&engine, left));
    assert!(!ink_at(&engine, right));

    engine.apply_edit(Edit::add_stroke(horizontal_stroke(30.0, 10.0, 40.0)));
    assert_eq!(engine.tile_phase(&left), TilePhase::Rendering);
    assert_eq!(engine.tile_phase(&right), TilePhase::Displayed);
    assert_eq!(engine.renderer().dispatcher().pending_len(), 1);
    settle(&mut engine);
    assert!(ink_at(&engine, left));

    engine.undo().expect("undo stroke");
    assert_eq!(engine.tile_phase(&left), TilePhase::Rendering);
    assert!(ink_at(&engine, left), "stale bitmap stays until the new one lands");
    settle(&mut engine);
    assert!(!ink_at(&engine, left));
    assert_eq!(engine.tile_phase(&right), TilePhase::Displayed);
}

#[test]
fn undoing_clear_restores_ink() {
    let mut engine = InkEngine::with_dispatcher(&config(), ManualDispatcher::new())
        .expect("create engine");
    let key = TileKey::new(0, 0, 100);
    engine.apply_edit(Edit::add_stroke(horizontal_stroke(20.0, 5.0, 50.0)));
    engine
        .update_viewport(DrawingRect::new(0.0, 0.0, 64.0, 64.0), 1.0)
        .expect("update viewport");
    settle(&mut engine);
    assert!(ink_at(&engine, key));

    engine.apply_edit(Edit::clear());
    settle(&mut engine);
    assert!(!ink_at(&engine, key));

    engine.undo().expect("undo clear");
    settle(&mut engine);
    assert!(ink_at(&engine, key));
}

#[test]
fn pen_stroke_renders_on_worker_pool() {
    let mut engine = InkEngine::start(&config()).expect("start engine");
    let events = engine.tile_events();
    let key = TileKey::new(0, 0, 100);

    for (index, phase) in [
        PointerEventPhase::Down,
        PointerEventPhase::Move,
        PointerEventPhase::Move,
        PointerEventPhase::Up,
    ]
    .into_iter()
    .enumerate()
    {
        engine
            .handle_pointer_event(RawPointerInput {
                pointer_id: 1,
                device_kind: PointerDeviceKind::Mouse,
                phase,
                timestamp: index as f64 * 0.016,
                canvas_x: 8.0 + index as f64 * 12.0,
                canvas_y: 24.0,
                pressure: None,
                azimuth_radians: None,
                altitude_radians: None,
            })
            .expect("pointer event");
    }
    assert_eq!(engine.current_drawing().len(), 1);

    engine
        .update_viewport(DrawingRect::new(0.0, 0.0, 64.0, 64.0), 1.0)
        .expect("update viewport");
    assert!(engine.wait_for_idle(Duration::from_secs(10)));
    assert_eq!(engine.tile_phase(&key), TilePhase::Displayed);
    let bitmap = engine.displayed_tile(&key).expect("tile shown");
    assert_eq!((bitmap.width(), bitmap.height()), (TILE, TILE));
    assert!(!bitmap.is_blank());

    engine.handle_memory_warning();
    assert_eq!(engine.tile_phase(&key), TilePhase::Unrendered);
    let released = events
        .try_iter()
        .filter(|event| matches!(event, TileEvent::Released { key: released } if *released == key))
        .count();
    assert_eq!(released, 1);
}
