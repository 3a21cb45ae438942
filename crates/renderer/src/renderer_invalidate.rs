use std::sync::Arc;

use model::{Drawing, DrawingRect};
use tiles::TileKey;

use crate::{DirtyRegion, RasterDispatcher, TileState, UpdateSummary, ViewportRenderer};

impl<D: RasterDispatcher> ViewportRenderer<D> {
    /// Installs an unrelated drawing (page load). Everything cached or shown
    /// belongs to the old drawing, so it is all dropped and the last viewport
    /// is rendered again.
    pub fn set_drawing(&mut self, drawing: Arc<Drawing>) -> Option<UpdateSummary> {
        tracing::info!(strokes = drawing.len(), "renderer drawing replaced");
        self.drawing = drawing;
        self.reset_and_rerun()
    }

    /// Restricts tiles to `[0, width) x [0, height)`; `None` lifts the limit.
    pub fn set_page_size(&mut self, page_size: Option<(f64, f64)>) -> Option<UpdateSummary> {
        self.page_bounds =
            page_size.map(|(width, height)| DrawingRect::from_origin_size(0.0, 0.0, width, height));
        self.reset_and_rerun()
    }

    /// Accepts an edited drawing whose changes are confined to `dirty`.
    ///
    /// Cache entries of every bucket touching `dirty` are dropped. Needed
    /// tiles touching it are rendered again; their current bitmap stays on
    /// screen until the new one lands. Returns the number of jobs dispatched.
    pub fn invalidate(&mut self, drawing: Arc<Drawing>, dirty: &DirtyRegion) -> usize {
        self.drawing = drawing;
        if dirty.is_empty() {
            return 0;
        }
        let grid = self.grid;
        let evicted = self
            .cache
            .retain(|key, _| !dirty.intersects(&grid.tile_rect(*key)));

        let affected: Vec<TileKey> = self
            .needed
            .iter()
            .copied()
            .filter(|key| dirty.intersects(&grid.tile_rect(*key)))
            .collect();
        let mut dispatched = 0;
        for key in affected {
            let stale = match self.tiles.remove(&key) {
                Some(TileState::Displayed { bitmap }) => Some(bitmap),
                Some(TileState::Rendering { stale, .. }) => stale,
                Some(TileState::Unrendered | TileState::Deferred) | None => None,
            };
            if self.dispatch_tile(key, stale) {
                dispatched += 1;
            }
        }
        tracing::debug!(evicted, dispatched, "tiles invalidated");
        dispatched
    }

    /// Drops every cached tile and releases every shown bitmap. Nothing is
    /// re-rendered until the next viewport update.
    pub fn handle_memory_warning(&mut self) {
        let cached = self.cache.len();
        self.cache.clear();
        let released = self.release_all_tiles();
        tracing::info!(cached, released, "memory warning: tile cache cleared");
    }

    fn reset_and_rerun(&mut self) -> Option<UpdateSummary> {
        self.release_all_tiles();
        self.cache.clear();
        self.rerun_last_viewport()
    }
}
