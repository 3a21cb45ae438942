//! Ink engine facade.
//!
//! `InkEngine` lives on the interactive thread and owns the document (drawing
//! plus undo history), the pointer driver and the viewport renderer. Every
//! document change is turned into a dirty region and pushed to the renderer;
//! hosts observe results through two channels, tile events and history state.

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use document::{Document, DocumentChange};
use driver::{
    CommittedStrokeReceiver, DriverEngine, DriverEventError, RawPointerInput, StrokeOutcome,
};
use model::{Drawing, DrawingRect, Edit, StrokeStyle, read_drawing_jsonl, write_drawing_jsonl};
use rasterizer::Bitmap;
use renderer::{
    RasterDispatcher, TileEvent, UpdateSummary, ViewportError, ViewportRenderer,
    WorkerPoolDispatcher,
};
use tiles::TileKey;

mod config;

pub use config::{ConfigError, EngineConfig, EngineStartError};
pub use document::ChangeCause;
pub use driver::{PointerDeviceKind, PointerEventPhase};
pub use renderer::{DirtyRegion, TilePhase};

/// Published after every document change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryState {
    pub can_undo: bool,
    pub can_redo: bool,
    pub revision: u64,
}

pub struct InkEngine<D: RasterDispatcher = WorkerPoolDispatcher> {
    document: Document,
    driver: DriverEngine,
    committed_strokes: CommittedStrokeReceiver,
    renderer: ViewportRenderer<D>,
    history_sender: Sender<HistoryState>,
    history_receiver: Receiver<HistoryState>,
}

impl InkEngine<WorkerPoolDispatcher> {
    /// Validates `config` and starts the raster workers.
    pub fn start(config: &EngineConfig) -> Result<Self, EngineStartError> {
        config.validate()?;
        let dispatcher = WorkerPoolDispatcher::start(config.renderer.workers)?;
        Self::with_dispatcher(config, dispatcher)
    }
}

impl<D: RasterDispatcher> InkEngine<D> {
    pub fn with_dispatcher(config: &EngineConfig, dispatcher: D) -> Result<Self, EngineStartError> {
        config.validate()?;
        let renderer = ViewportRenderer::with_dispatcher(&config.renderer, dispatcher)
            .map_err(ConfigError::from)?;
        let (driver, committed_strokes) =
            DriverEngine::new(config.driver, config.stroke_style).map_err(ConfigError::from)?;
        let (history_sender, history_receiver) = crossbeam_channel::bounded(1);
        Ok(Self {
            document: Document::new(),
            driver,
            committed_strokes,
            renderer,
            history_sender,
            history_receiver,
        })
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn renderer(&self) -> &ViewportRenderer<D> {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut ViewportRenderer<D> {
        &mut self.renderer
    }

    /// Tile events for the host compositor.
    pub fn tile_events(&self) -> Receiver<TileEvent> {
        self.renderer.events()
    }

    /// Latest history state. Holds at most one message; an unread state is
    /// replaced by the newer one.
    pub fn history_events(&self) -> Receiver<HistoryState> {
        self.history_receiver.clone()
    }

    pub fn history_state(&self) -> HistoryState {
        HistoryState {
            can_undo: self.document.can_undo(),
            can_redo: self.document.can_redo(),
            revision: self.document.revision(),
        }
    }

    /// Replaces the drawing and clears undo history.
    pub fn set_drawing(&mut self, drawing: Drawing) {
        self.document.replace_drawing(drawing);
        self.renderer.set_drawing(Arc::new(self.document.snapshot()));
        self.publish_history();
    }

    pub fn current_drawing(&self) -> Drawing {
        self.document.snapshot()
    }

    pub fn load_drawing(&mut self, reader: &mut dyn BufRead) -> io::Result<()> {
        let drawing = read_drawing_jsonl(reader)?;
        self.set_drawing(drawing);
        Ok(())
    }

    pub fn save_drawing(&self, writer: &mut dyn Write) -> io::Result<()> {
        write_drawing_jsonl(writer, self.document.drawing())
    }

    /// Applies `edit` and returns the new revision.
    pub fn apply_edit(&mut self, edit: Edit) -> u64 {
        let change = self.document.apply(edit);
        let revision = change.revision;
        self.commit_change(change);
        revision
    }

    pub fn undo(&mut self) -> Option<Drawing> {
        let change = self.document.undo()?;
        self.commit_change(change);
        Some(self.document.snapshot())
    }

    pub fn redo(&mut self) -> Option<Drawing> {
        let change = self.document.redo()?;
        self.commit_change(change);
        Some(self.document.snapshot())
    }

    pub fn can_undo(&self) -> bool {
        self.document.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.document.can_redo()
    }

    pub fn update_viewport(
        &mut self,
        visible_rect: DrawingRect,
        zoom: f64,
    ) -> Result<UpdateSummary, ViewportError> {
        self.renderer.update_viewport(visible_rect, zoom)
    }

    /// Feeds one pointer event to the driver. A finished stroke is added to
    /// the drawing as an undoable edit before this returns.
    pub fn handle_pointer_event(
        &mut self,
        input: RawPointerInput,
    ) -> Result<StrokeOutcome, DriverEventError> {
        let outcome = self.driver.handle_pointer_event(input)?;
        while let Some(stroke) = self.committed_strokes.pop_stroke() {
            tracing::debug!(
                stroke_id = %stroke.id(),
                samples = stroke.samples().len(),
                "stroke committed"
            );
            self.apply_edit(Edit::add_stroke(stroke));
        }
        Ok(outcome)
    }

    pub fn stroke_style(&self) -> StrokeStyle {
        self.driver.style()
    }

    pub fn set_stroke_style(&mut self, style: StrokeStyle) {
        self.driver.set_style(style);
    }

    pub fn set_page_size(&mut self, page_size: Option<(f64, f64)>) -> Option<UpdateSummary> {
        self.renderer.set_page_size(page_size)
    }

    pub fn handle_memory_warning(&mut self) {
        self.renderer.handle_memory_warning();
    }

    /// Applies finished tile renders without blocking.
    pub fn pump(&mut self) -> usize {
        self.renderer.pump_completions()
    }

    pub fn wait_for_idle(&mut self, timeout: Duration) -> bool {
        self.renderer.wait_for_idle(timeout)
    }

    pub fn displayed_tile(&self, key: &TileKey) -> Option<Arc<Bitmap>> {
        self.renderer.displayed_tile(key)
    }

    pub fn tile_phase(&self, key: &TileKey) -> TilePhase {
        self.renderer.tile_phase(key)
    }

    fn commit_change(&mut self, change: DocumentChange) {
        let dirty = self.renderer.dirty_region_for(&change.affected_strokes);
        tracing::trace!(
            revision = change.revision,
            cause = ?change.cause,
            strokes = change.affected_strokes.len(),
            "document changed"
        );
        let snapshot = Arc::new(self.document.snapshot());
        self.renderer.invalidate(snapshot, &dirty);
        self.publish_history();
    }

    fn publish_history(&self) {
        while self.history_receiver.try_recv().is_ok() {}
        // Only this thread sends and the queue was just emptied.
        let _ = self.history_sender.try_send(self.history_state());
    }
}
