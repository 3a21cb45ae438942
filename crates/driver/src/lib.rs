use std::fmt;

use model::{Sample, Stroke, StrokeBuilder, StrokeStyle};
use serde::Deserialize;

pub type PointerId = u64;
pub type EventTimestampSeconds = f64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerDeviceKind {
    Mouse,
    Pen,
    Touch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEventPhase {
    Hover,
    Down,
    Move,
    Up,
    Cancel,
}

/// Pointer event already mapped into drawing coordinates by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawPointerInput {
    pub pointer_id: PointerId,
    pub device_kind: PointerDeviceKind,
    pub phase: PointerEventPhase,
    pub timestamp: EventTimestampSeconds,
    pub canvas_x: f64,
    pub canvas_y: f64,
    pub pressure: Option<f32>,
    pub azimuth_radians: Option<f32>,
    pub altitude_radians: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub commit_queue_capacity: usize,
    /// Used when the device reports no pressure (mouse, most touch screens).
    pub default_pressure: f32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            commit_queue_capacity: 64,
            default_pressure: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverConfigError {
    ZeroCommitQueueCapacity,
    DefaultPressureOutOfRange,
}

impl fmt::Display for DriverConfigError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverConfigError::ZeroCommitQueueCapacity => {
                write!(formatter, "driver commit queue capacity must be at least 1")
            }
            DriverConfigError::DefaultPressureOutOfRange => {
                write!(formatter, "driver default pressure must be within [0, 1]")
            }
        }
    }
}

impl std::error::Error for DriverConfigError {}

impl DriverConfig {
    pub fn validate(&self) -> Result<(), DriverConfigError> {
        if self.commit_queue_capacity == 0 {
            return Err(DriverConfigError::ZeroCommitQueueCapacity);
        }
        if !(0.0..=1.0).contains(&self.default_pressure) {
            return Err(DriverConfigError::DefaultPressureOutOfRange);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitQueuePushError {
    Full,
}

#[derive(Debug)]
pub struct CommittedStrokeSender {
    producer: rtrb::Producer<Stroke>,
}

#[derive(Debug)]
pub struct CommittedStrokeReceiver {
    consumer: rtrb::Consumer<Stroke>,
}

impl CommittedStrokeSender {
    pub fn push_stroke(&mut self, stroke: Stroke) -> Result<(), CommitQueuePushError> {
        self.producer
            .push(stroke)
            .map_err(|_| CommitQueuePushError::Full)
    }
}

impl CommittedStrokeReceiver {
    pub fn pop_stroke(&mut self) -> Option<Stroke> {
        self.consumer.pop().ok()
    }

    pub fn pending(&self) -> usize {
        self.consumer.slots()
    }
}

pub fn create_committed_stroke_queue(
    capacity: usize,
) -> Result<(CommittedStrokeSender, CommittedStrokeReceiver), DriverConfigError> {
    if capacity == 0 {
        return Err(DriverConfigError::ZeroCommitQueueCapacity);
    }
    let (producer, consumer) = rtrb::RingBuffer::new(capacity);
    Ok((
        CommittedStrokeSender { producer },
        CommittedStrokeReceiver { consumer },
    ))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEventError {
    StrokeAlreadyActive,
    NoActiveStroke,
    PointerIdMismatch,
    CommitQueueFull,
}

impl fmt::Display for DriverEventError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverEventError::StrokeAlreadyActive => {
                write!(formatter, "pointer down while a stroke is already active")
            }
            DriverEventError::NoActiveStroke => {
                write!(formatter, "pointer event requires an active stroke")
            }
            DriverEventError::PointerIdMismatch => {
                write!(formatter, "pointer id does not match the active stroke")
            }
            DriverEventError::CommitQueueFull => {
                write!(formatter, "committed stroke queue is full")
            }
        }
    }
}

impl std::error::Error for DriverEventError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrokeOutcome {
    Continued,
    Committed,
    Discarded,
    Ignored,
}

#[derive(Debug, Clone, Copy)]
struct ActiveStroke {
    pointer_id: PointerId,
    last_timestamp: EventTimestampSeconds,
}

/// Turns pointer down/move/up into finalized strokes.
///
/// Committed strokes are queued for the thread that owns the drawing; the
/// driver never edits a drawing itself.
pub struct DriverEngine {
    config: DriverConfig,
    style: StrokeStyle,
    builder: StrokeBuilder,
    active_stroke: Option<ActiveStroke>,
    committed: CommittedStrokeSender,
}

impl DriverEngine {
    pub fn new(
        config: DriverConfig,
        style: StrokeStyle,
    ) -> Result<(Self, CommittedStrokeReceiver), DriverConfigError> {
        config.validate()?;
        let (committed, receiver) = create_committed_stroke_queue(config.commit_queue_capacity)?;
        Ok((
            Self {
                config,
                style,
                builder: StrokeBuilder::new(),
                active_stroke: None,
                committed,
            },
            receiver,
        ))
    }

    pub fn style(&self) -> StrokeStyle {
        self.style
    }

    /// Applies from the next pointer down; an active stroke keeps its style.
    pub fn set_style(&mut self, style: StrokeStyle) {
        self.style = style;
    }

    pub fn is_stroke_active(&self) -> bool {
        self.active_stroke.is_some()
    }

    pub fn handle_pointer_event(
        &mut self,
        input: RawPointerInput,
    ) -> Result<StrokeOutcome, DriverEventError> {
        match input.phase {
            PointerEventPhase::Down => self.handle_pointer_down(input),
            PointerEventPhase::Move => self.handle_pointer_move(input),
            PointerEventPhase::Up => self.handle_pointer_up(input),
            PointerEventPhase::Cancel => self.handle_pointer_cancel(input),
            PointerEventPhase::Hover => Ok(StrokeOutcome::Ignored),
        }
    }

    fn handle_pointer_down(
        &mut self,
        input: RawPointerInput,
    ) -> Result<StrokeOutcome, DriverEventError> {
        if self.active_stroke.is_some() {
            return Err(DriverEventError::StrokeAlreadyActive);
        }
        self.builder.begin_stroke(self.style);
        let last_timestamp = if has_finite_geometry(&input) {
            self.builder.append_sample(self.capture(input));
            input.timestamp
        } else {
            log_non_finite_input(&input);
            f64::NEG_INFINITY
        };
        self.active_stroke = Some(ActiveStroke {
            pointer_id: input.pointer_id,
            last_timestamp,
        });
        Ok(StrokeOutcome::Continued)
    }

    fn handle_pointer_move(
        &mut self,
        input: RawPointerInput,
    ) -> Result<StrokeOutcome, DriverEventError> {
        self.append_input(input)?;
        Ok(StrokeOutcome::Continued)
    }

    fn handle_pointer_up(
        &mut self,
        input: RawPointerInput,
    ) -> Result<StrokeOutcome, DriverEventError> {
        self.append_input(input)?;
        self.active_stroke = None;
        let Some(stroke) = self.builder.finalize_stroke() else {
            return Err(DriverEventError::NoActiveStroke);
        };
        if stroke.is_degenerate() {
            tracing::debug!(
                stroke_id = %stroke.id(),
                samples = stroke.samples().len(),
                "discarding degenerate stroke"
            );
            return Ok(StrokeOutcome::Discarded);
        }
        self.committed
            .push_stroke(stroke)
            .map_err(|_| DriverEventError::CommitQueueFull)?;
        Ok(StrokeOutcome::Committed)
    }

    fn handle_pointer_cancel(
        &mut self,
        input: RawPointerInput,
    ) -> Result<StrokeOutcome, DriverEventError> {
        let active = self
            .active_stroke
            .ok_or(DriverEventError::NoActiveStroke)?;
        if active.pointer_id != input.pointer_id {
            return Err(DriverEventError::PointerIdMismatch);
        }
        self.active_stroke = None;
        self.builder.cancel_stroke();
        Ok(StrokeOutcome::Discarded)
    }

    fn append_input(&mut self, input: RawPointerInput) -> Result<(), DriverEventError> {
        let active = self
            .active_stroke
            .as_mut()
            .ok_or(DriverEventError::NoActiveStroke)?;
        if active.pointer_id != input.pointer_id {
            return Err(DriverEventError::PointerIdMismatch);
        }
        if !has_finite_geometry(&input) {
            log_non_finite_input(&input);
            return Ok(());
        }
        if input.timestamp < active.last_timestamp {
            tracing::debug!(
                pointer_id = input.pointer_id,
                timestamp = input.timestamp,
                last_timestamp = active.last_timestamp,
                "dropping sample with non-monotonic timestamp"
            );
            return Ok(());
        }
        active.last_timestamp = input.timestamp;
        let sample = self.capture(input);
        self.builder.append_sample(sample);
        Ok(())
    }

    fn capture(&self, input: RawPointerInput) -> Sample {
        let base_width = self.builder.style().unwrap_or(self.style).base_width;
        Sample::capture(
            (input.canvas_x, input.canvas_y),
            input.pressure.unwrap_or(self.config.default_pressure),
            input.azimuth_radians,
            input.altitude_radians,
            input.timestamp,
            base_width,
        )
    }
}

/// Position and timestamp must be finite to be stored and saved.
fn has_finite_geometry(input: &RawPointerInput) -> bool {
    input.canvas_x.is_finite() && input.canvas_y.is_finite() && input.timestamp.is_finite()
}

fn log_non_finite_input(input: &RawPointerInput) {
    tracing::debug!(
        pointer_id = input.pointer_id,
        canvas_x = input.canvas_x,
        canvas_y = input.canvas_y,
        timestamp = input.timestamp,
        "dropping sample with non-finite position or timestamp"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::Rgba8;

    fn test_pointer_input(
        phase: PointerEventPhase,
        timestamp: f64,
        pointer_id: u64,
        x: f64,
        y: f64,
    ) -> RawPointerInput {
        RawPointerInput {
            pointer_id,
            device_kind: PointerDeviceKind::Pen,
            phase,
            timestamp,
            canvas_x: x,
            canvas_y: y,
            pressure: Some(0.5),
            azimuth_radians: Some(0.25),
            altitude_radians: None,
        }
    }

    fn create_driver() -> (DriverEngine, CommittedStrokeReceiver) {
        DriverEngine::new(DriverConfig::default(), StrokeStyle::default()).expect("create driver")
    }

    #[test]
    fn down_move_up_commits_one_stroke() {
        let (mut driver, mut receiver) = create_driver();
        driver
            .handle_pointer_event(test_pointer_input(PointerEventPhase::Down, 0.0, 1, 0.0, 0.0))
            .expect("down");
        driver
            .handle_pointer_event(test_pointer_input(PointerEventPhase::Move, 0.01, 1, 5.0, 0.0))
            .expect("move");
        let outcome = driver
            .handle_pointer_event(test_pointer_input(PointerEventPhase::Up, 0.02, 1, 10.0, 0.0))
            .expect("up");

        assert_eq!(outcome, StrokeOutcome::Committed);
        let stroke = receiver.pop_stroke().expect("committed stroke");
        assert_eq!(stroke.samples().len(), 3);
        assert_eq!(stroke.samples()[0].azimuth, Some(0.25));
        assert!((stroke.samples()[1].width - 2.0 * 1.225).abs() < 1e-6);
        assert!(receiver.pop_stroke().is_none());
    }

    #[test]
    fn move_without_down_is_rejected() {
        let (mut driver, _receiver) = create_driver();
        let error = driver
            .handle_pointer_event(test_pointer_input(PointerEventPhase::Move, 0.0, 1, 0.0, 0.0))
            .expect_err("move without down should fail");
        assert_eq!(error, DriverEventError::NoActiveStroke);
    }

    #[test]
    fn second_down_while_active_is_rejected() {
        let (mut driver, _receiver) = create_driver();
        driver
            .handle_pointer_event(test_pointer_input(PointerEventPhase::Down, 0.0, 1, 0.0, 0.0))
            .expect("down");
        let error = driver
            .handle_pointer_event(test_pointer_input(PointerEventPhase::Down, 0.0, 2, 0.0, 0.0))
            .expect_err("second down should fail");
        assert_eq!(error, DriverEventError::StrokeAlreadyActive);
    }

    #[test]
    fn cancel_discards_the_stroke() {
        let (mut driver, mut receiver) = create_driver();
        driver
            .handle_pointer_event(test_pointer_input(PointerEventPhase::Down, 0.0, 1, 0.0, 0.0))
            .expect("down");
        driver
            .handle_pointer_event(test_pointer_input(PointerEventPhase::Move, 0.01, 1, 4.0, 4.0))
            .expect("move");
        let outcome = driver
            .handle_pointer_event(test_pointer_input(PointerEventPhase::Cancel, 0.02, 1, 4.0, 4.0))
            .expect("cancel");
        assert_eq!(outcome, StrokeOutcome::Discarded);
        assert!(!driver.is_stroke_active());
        assert!(receiver.pop_stroke().is_none());
    }

    #[test]
    fn tap_without_movement_is_discarded() {
        let (mut driver, mut receiver) = create_driver();
        driver
            .handle_pointer_event(test_pointer_input(PointerEventPhase::Down, 0.0, 1, 3.0, 3.0))
            .expect("down");
        let up = RawPointerInput {
            timestamp: -1.0,
            ..test_pointer_input(PointerEventPhase::Up, 0.0, 1, 3.0, 3.0)
        };
        let outcome = driver.handle_pointer_event(up).expect("up");
        assert_eq!(outcome, StrokeOutcome::Discarded);
        assert!(receiver.pop_stroke().is_none());
    }

    #[test]
    fn non_finite_samples_are_dropped() {
        let (mut driver, mut receiver) = create_driver();
        driver
            .handle_pointer_event(test_pointer_input(PointerEventPhase::Down, 0.0, 1, 0.0, 0.0))
            .expect("down");
        driver
            .handle_pointer_event(test_pointer_input(PointerEventPhase::Move, 0.01, 1, f64::NAN, 5.0))
            .expect("move with nan x");
        driver
            .handle_pointer_event(test_pointer_input(
                PointerEventPhase::Move,
                f64::INFINITY,
                1,
                4.0,
                4.0,
            ))
            .expect("move with infinite timestamp");
        let outcome = driver
            .handle_pointer_event(test_pointer_input(PointerEventPhase::Up, 0.02, 1, 10.0, 0.0))
            .expect("up");

        assert_eq!(outcome, StrokeOutcome::Committed);
        let stroke = receiver.pop_stroke().expect("committed stroke");
        let positions: Vec<(f64, f64)> =
            stroke.samples().iter().map(|sample| sample.position).collect();
        assert_eq!(positions, vec![(0.0, 0.0), (10.0, 0.0)]);
    }

    #[test]
    fn non_finite_down_still_starts_stroke() {
        let (mut driver, mut receiver) = create_driver();
        driver
            .handle_pointer_event(test_pointer_input(
                PointerEventPhase::Down,
                0.0,
                1,
                f64::INFINITY,
                0.0,
            ))
            .expect("down");
        assert!(driver.is_stroke_active());
        driver
            .handle_pointer_event(test_pointer_input(PointerEventPhase::Move, 0.01, 1, 1.0, 1.0))
            .expect("move");
        driver
            .handle_pointer_event(test_pointer_input(PointerEventPhase::Up, 0.02, 1, 2.0, 2.0))
            .expect("up");

        let stroke = receiver.pop_stroke().expect("committed stroke");
        assert_eq!(stroke.samples().len(), 2);
        assert!(stroke.samples().iter().all(|sample| sample.x().is_finite()));
    }

    #[test]
    fn non_finite_angles_are_recorded_as_absent() {
        let (mut driver, mut receiver) = create_driver();
        for (phase, timestamp, x) in [
            (PointerEventPhase::Down, 0.0, 0.0),
            (PointerEventPhase::Up, 0.01, 8.0),
        ] {
            driver
                .handle_pointer_event(RawPointerInput {
                    azimuth_radians: Some(f32::NAN),
                    altitude_radians: Some(f32::INFINITY),
                    ..test_pointer_input(phase, timestamp, 1, x, 0.0)
                })
                .expect("pointer event");
        }

        let stroke = receiver.pop_stroke().expect("committed stroke");
        assert!(
            stroke
                .samples()
                .iter()
                .all(|sample| sample.azimuth.is_none() && sample.altitude.is_none())
        );
    }

    #[test]
    fn style_change_applies_to_next_stroke() {
        let (mut driver, mut receiver) = create_driver();
        driver
            .handle_pointer_event(test_pointer_input(PointerEventPhase::Down, 0.0, 1, 0.0, 0.0))
            .expect("down");
        let eraser = StrokeStyle {
            color: Rgba8::TRANSPARENT,
            base_width: 12.0,
            is_eraser: true,
        };
        driver.set_style(eraser);
        driver
            .handle_pointer_event(test_pointer_input(PointerEventPhase::Up, 0.1, 1, 8.0, 0.0))
            .expect("up");
        let first = receiver.pop_stroke().expect("first stroke");
        assert!(!first.is_eraser());
        assert_eq!(first.base_width(), StrokeStyle::default().base_width);

        driver
            .handle_pointer_event(test_pointer_input(PointerEventPhase::Down, 0.2, 1, 0.0, 0.0))
            .expect("down");
        driver
            .handle_pointer_event(test_pointer_input(PointerEventPhase::Up, 0.3, 1, 8.0, 0.0))
            .expect("up");
        let second = receiver.pop_stroke().expect("second stroke");
        assert!(second.is_eraser());
        assert_eq!(second.base_width(), 12.0);
    }

    #[test]
    fn mismatched_pointer_keeps_stroke_active() {
        let (mut driver, _receiver) = create_driver();
        driver
            .handle_pointer_event(test_pointer_input(PointerEventPhase::Down, 0.0, 1, 0.0, 0.0))
            .expect("down");
        let error = driver
            .handle_pointer_event(test_pointer_input(PointerEventPhase::Up, 0.1, 9, 1.0, 0.0))
            .expect_err("foreign pointer up should fail");
        assert_eq!(error, DriverEventError::PointerIdMismatch);
        assert!(driver.is_stroke_active());
    }

    #[test]
    fn full_commit_queue_reports_error() {
        let (mut driver, _receiver) = DriverEngine::new(
            DriverConfig {
                commit_queue_capacity: 1,
                ..DriverConfig::default()
            },
            StrokeStyle::default(),
        )
        .expect("create driver");
        for stroke_index in 0..2 {
            let base = stroke_index as f64;
            driver
                .handle_pointer_event(test_pointer_input(PointerEventPhase::Down, base, 1, 0.0, 0.0))
                .expect("down");
            let result = driver.handle_pointer_event(test_pointer_input(
                PointerEventPhase::Up,
                base + 0.5,
                1,
                6.0,
                0.0,
            ));
            if stroke_index == 0 {
                assert_eq!(result, Ok(StrokeOutcome::Committed));
            } else {
                assert_eq!(result, Err(DriverEventError::CommitQueueFull));
            }
        }
    }

    #[test]
    fn config_validation_rejects_zero_capacity() {
        let config = DriverConfig {
            commit_queue_capacity: 0,
            ..DriverConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(DriverConfigError::ZeroCommitQueueCapacity)
        );
    }
}
