use crate::{Sample, Stroke, StrokeId, StrokeStyle};

#[derive(Debug)]
struct PendingStroke {
    style: StrokeStyle,
    samples: Vec<Sample>,
}

/// Accumulates samples of one gesture and turns them into an immutable stroke.
///
/// The builder never touches the drawing, the undo stack or any cache; the
/// caller decides whether the finalized stroke is committed.
#[derive(Debug, Default)]
pub struct StrokeBuilder {
    pending: Option<PendingStroke>,
}

impl StrokeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.pending.is_some()
    }

    pub fn style(&self) -> Option<StrokeStyle> {
        self.pending.as_ref().map(|pending| pending.style)
    }

    pub fn sample_count(&self) -> usize {
        self.pending
            .as_ref()
            .map_or(0, |pending| pending.samples.len())
    }

    pub fn last_sample(&self) -> Option<&Sample> {
        self.pending
            .as_ref()
            .and_then(|pending| pending.samples.last())
    }

    /// Starts a new stroke, dropping any unfinished one.
    pub fn begin_stroke(&mut self, style: StrokeStyle) {
        self.pending = Some(PendingStroke {
            style,
            samples: Vec::new(),
        });
    }

    /// Appends to the active stroke; ignored when no stroke was begun.
    pub fn append_sample(&mut self, sample: Sample) {
        if let Some(pending) = self.pending.as_mut() {
            pending.samples.push(sample);
        }
    }

    pub fn finalize_stroke(&mut self) -> Option<Stroke> {
        let pending = self.pending.take()?;
        Some(Stroke::new(
            StrokeId::new_random(),
            pending.samples,
            pending.style,
        ))
    }

    pub fn cancel_stroke(&mut self) {
        self.pending = None;
    }
}
