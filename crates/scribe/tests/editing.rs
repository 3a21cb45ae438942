use std::io::{BufReader, Seek, SeekFrom};
use std::sync::Arc;

use driver::{RawPointerInput, StrokeOutcome};
use model::{Edit, Rgba8, Sample, Stroke, StrokeId, StrokeStyle};
use renderer::ManualDispatcher;
use scribe::{EngineConfig, HistoryState, InkEngine, PointerDeviceKind, PointerEventPhase};

fn engine() -> InkEngine<ManualDispatcher> {
    InkEngine::with_dispatcher(&EngineConfig::default(), ManualDispatcher::new())
        .expect("create engine")
}

fn pointer(phase: PointerEventPhase, timestamp: f64, x: f64, y: f64) -> RawPointerInput {
    RawPointerInput {
        pointer_id: 7,
        device_kind: PointerDeviceKind::Pen,
        phase,
        timestamp,
        canvas_x: x,
        canvas_y: y,
        pressure: Some(0.5),
        azimuth_radians: None,
        altitude_radians: Some(1.2),
    }
}

fn draw_line(engine: &mut InkEngine<ManualDispatcher>, y: f64) -> StrokeOutcome {
    engine
        .handle_pointer_event(pointer(PointerEventPhase::Down, 0.0, 10.0, y))
        .expect("pointer down");
    for step in 1..4 {
        engine
            .handle_pointer_event(pointer(
                PointerEventPhase::Move,
                step as f64 * 0.01,
                10.0 + step as f64 * 10.0,
                y,
            ))
            .expect("pointer move");
    }
    engine
        .handle_pointer_event(pointer(PointerEventPhase::Up, 0.05, 60.0, y))
        .expect("pointer up")
}

fn stroke(offset: f64) -> Stroke {
    let samples = (0..4)
        .map(|index| {
            Sample::capture(
                (offset + index as f64 * 5.0, offset),
                0.3,
                None,
                None,
                index as f64,
                2.0,
            )
        })
        .collect();
    Stroke::new(StrokeId::new_random(), samples, StrokeStyle::default())
}

#[test]
fn pointer_stroke_becomes_undoable_edit() {
    let mut engine = engine();
    let history = engine.history_events();

    assert_eq!(draw_line(&mut engine, 20.0), StrokeOutcome::Committed);

    let drawing = engine.current_drawing();
    assert_eq!(drawing.len(), 1);
    assert_eq!(drawing.strokes()[0].samples().len(), 5);
    assert!(engine.can_undo());
    assert_eq!(
        history.try_iter().collect::<Vec<_>>(),
        vec![HistoryState {
            can_undo: true,
            can_redo: false,
            revision: 1,
        }]
    );

    let undone = engine.undo().expect("undo stroke");
    assert!(undone.is_empty());
    let redone = engine.redo().expect("redo stroke");
    assert_eq!(redone.len(), 1);
    assert_eq!(
        history.try_iter().collect::<Vec<_>>(),
        vec![HistoryState {
            can_undo: true,
            can_redo: false,
            revision: 3,
        }]
    );
}

#[test]
fn unread_history_keeps_only_latest_state() {
    let mut engine = engine();
    let history = engine.history_events();
    for offset in 0..20 {
        engine.apply_edit(Edit::add_stroke(stroke(offset as f64)));
    }
    engine.undo().expect("undo");

    let pending: Vec<HistoryState> = history.try_iter().collect();
    assert_eq!(
        pending,
        vec![HistoryState {
            can_undo: true,
            can_redo: true,
            revision: 21,
        }]
    );
}

#[test]
fn cancelled_stroke_is_not_committed() {
    let mut engine = engine();
    engine
        .handle_pointer_event(pointer(PointerEventPhase::Down, 0.0, 0.0, 0.0))
        .expect("pointer down");
    engine
        .handle_pointer_event(pointer(PointerEventPhase::Move, 0.01, 5.0, 5.0))
        .expect("pointer move");
    let outcome = engine
        .handle_pointer_event(pointer(PointerEventPhase::Cancel, 0.02, 5.0, 5.0))
        .expect("pointer cancel");

    assert_eq!(outcome, StrokeOutcome::Discarded);
    assert!(engine.current_drawing().is_empty());
    assert!(!engine.can_undo());
}

#[test]
fn two_strokes_undo_past_start_then_redo() {
    let mut engine = engine();
    let a = stroke(0.0);
    let b = stroke(30.0);
    let expected = vec![a.id(), b.id()];
    engine.apply_edit(Edit::add_stroke(a));
    engine.apply_edit(Edit::add_stroke(b));
    let original = engine.current_drawing();

    assert!(engine.undo().is_some());
    assert!(engine.undo().is_some());
    assert!(engine.undo().is_none());
    assert!(engine.redo().is_some());
    let drawing = engine.redo().expect("second redo");

    let ids: Vec<StrokeId> = drawing.strokes().iter().map(|stroke| stroke.id()).collect();
    assert_eq!(ids, expected);
    assert_eq!(drawing, original);
    assert!(!engine.can_redo());
}

#[test]
fn new_edit_after_undo_clears_redo() {
    let mut engine = engine();
    engine.apply_edit(Edit::add_stroke(stroke(0.0)));
    engine.apply_edit(Edit::add_stroke(stroke(10.0)));
    engine.undo().expect("undo");
    assert!(engine.can_redo());

    engine.apply_edit(Edit::clear());
    assert!(!engine.can_redo());
    assert!(engine.current_drawing().is_empty());
    assert_eq!(engine.undo().expect("undo clear").len(), 1);
}

#[test]
fn set_drawing_resets_history() {
    let mut engine = engine();
    let history = engine.history_events();
    engine.apply_edit(Edit::add_stroke(stroke(0.0)));

    let loaded = model::Drawing::from_strokes(vec![Arc::new(stroke(5.0)), Arc::new(stroke(9.0))]);
    engine.set_drawing(loaded);

    assert_eq!(engine.current_drawing().len(), 2);
    assert!(!engine.can_undo());
    let last = history.try_iter().last().expect("history published");
    assert!(!last.can_undo && !last.can_redo);
    assert_eq!(last.revision, engine.history_state().revision);
}

#[test]
fn style_change_applies_to_next_stroke() {
    let mut engine = engine();
    let eraser = StrokeStyle {
        color: Rgba8::TRANSPARENT,
        base_width: 12.0,
        is_eraser: true,
    };
    draw_line(&mut engine, 10.0);
    engine.set_stroke_style(eraser);
    draw_line(&mut engine, 30.0);

    let drawing = engine.current_drawing();
    assert!(!drawing.strokes()[0].is_eraser());
    assert!(drawing.strokes()[1].is_eraser());
    assert_eq!(drawing.strokes()[1].base_width(), 12.0);
    assert_eq!(engine.stroke_style(), eraser);
}

#[test]
fn drawing_survives_save_and_load() {
    let mut engine = engine();
    draw_line(&mut engine, 10.0);
    engine.apply_edit(Edit::add_stroke(stroke(40.0)));
    let saved = engine.current_drawing();

    let mut file = tempfile::tempfile().expect("create temp file");
    engine.save_drawing(&mut file).expect("save drawing");
    file.seek(SeekFrom::Start(0)).expect("rewind");

    let mut restored = self::engine();
    restored
        .load_drawing(&mut BufReader::new(file))
        .expect("load drawing");
    assert_eq!(restored.current_drawing(), saved);
    assert!(!restored.can_undo());
}

#[test]
fn malformed_pointer_samples_do_not_break_saving() {
    let mut engine = engine();
    let inputs = [
        pointer(PointerEventPhase::Down, 0.0, 0.0, 0.0),
        pointer(PointerEventPhase::Move, 0.01, f64::NAN, 5.0),
        RawPointerInput {
            azimuth_radians: Some(f32::NAN),
            ..pointer(PointerEventPhase::Move, 0.02, 5.0, 5.0)
        },
        pointer(PointerEventPhase::Up, 0.03, 10.0, 0.0),
    ];
    let mut outcome = StrokeOutcome::Ignored;
    for input in inputs {
        outcome = engine.handle_pointer_event(input).expect("pointer event");
    }
    assert_eq!(outcome, StrokeOutcome::Committed);
    let saved = engine.current_drawing();
    assert_eq!(saved.strokes()[0].samples().len(), 3);

    let mut bytes = Vec::new();
    engine.save_drawing(&mut bytes).expect("save drawing");
    let mut restored = self::engine();
    restored
        .load_drawing(&mut bytes.as_slice())
        .expect("reload drawing with dropped samples");
    assert_eq!(restored.current_drawing(), saved);
}
