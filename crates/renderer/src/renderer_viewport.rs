use std::collections::HashSet;
use std::sync::Arc;

use engine::DispatchError;
use model::DrawingRect;
use rasterizer::Bitmap;
use tiles::{TileGrid, TileKey};

use crate::{
    RasterDispatcher, RasterJob, TileEvent, TileState, UpdateSummary, ViewportError,
    ViewportRenderer, ViewportRequest,
};

impl<D: RasterDispatcher> ViewportRenderer<D> {
    /// Diffs the tile keys needed for `visible_rect` at `zoom` against the
    /// current ones. Cache hits are shown at once, misses are dispatched, and
    /// keys no longer needed are released without touching the cache.
    pub fn update_viewport(
        &mut self,
        visible_rect: DrawingRect,
        zoom: f64,
    ) -> Result<UpdateSummary, ViewportError> {
        validate_viewport(&visible_rect, zoom)?;
        let request = ViewportRequest { visible_rect, zoom };
        self.last_viewport = Some(request);
        Ok(self.apply_viewport(request))
    }

    pub(crate) fn rerun_last_viewport(&mut self) -> Option<UpdateSummary> {
        let request = self.last_viewport?;
        Some(self.apply_viewport(request))
    }

    fn apply_viewport(&mut self, request: ViewportRequest) -> UpdateSummary {
        let zoom_bucket = self.zoom_buckets.quantize(request.zoom);
        let needed = self.grid.keys_intersecting(
            &request.visible_rect,
            zoom_bucket,
            self.padding_tiles,
            self.page_bounds.as_ref(),
        );
        let needed_set: HashSet<TileKey> = needed.iter().copied().collect();

        let mut summary = UpdateSummary {
            zoom_bucket,
            needed: needed.len(),
            ..UpdateSummary::default()
        };

        let leaving: Vec<TileKey> = self
            .needed
            .iter()
            .copied()
            .filter(|key| !needed_set.contains(key))
            .collect();
        for key in leaving {
            if let Some(state) = self.tiles.remove(&key) {
                if state.shown_bitmap().is_some() {
                    self.emit(TileEvent::Released { key });
                }
                summary.hidden += 1;
            }
        }

        for key in &needed {
            match self.tiles.get(key) {
                Some(TileState::Rendering { .. }) | Some(TileState::Displayed { .. }) => {
                    summary.retained += 1;
                    continue;
                }
                Some(TileState::Unrendered | TileState::Deferred) | None => {}
            }
            if self.show_cached(*key) {
                summary.cache_hits += 1;
                continue;
            }
            if self.dispatch_tile(*key, None) {
                summary.dispatched += 1;
            } else {
                summary.deferred += 1;
            }
        }

        self.needed = needed;
        self.active_zoom_bucket = Some(zoom_bucket);
        tracing::trace!(
            zoom_bucket,
            needed = summary.needed,
            cache_hits = summary.cache_hits,
            dispatched = summary.dispatched,
            hidden = summary.hidden,
            "viewport updated"
        );
        summary
    }

    /// Dispatches needed tiles the queue refused earlier, in priority order,
    /// until the dispatcher refuses again. Returns how many tiles left the
    /// deferred state.
    pub(crate) fn retry_deferred_tiles(&mut self) -> usize {
        let deferred: Vec<TileKey> = self
            .needed
            .iter()
            .copied()
            .filter(|key| matches!(self.tiles.get(key), Some(TileState::Deferred)))
            .collect();
        let mut resumed = 0;
        for key in deferred {
            if self.show_cached(key) {
                resumed += 1;
                continue;
            }
            if !self.dispatch_tile(key, None) {
                break;
            }
            resumed += 1;
        }
        resumed
    }

    pub(crate) fn has_deferred_tiles(&self) -> bool {
        self.tiles
            .values()
            .any(|state| matches!(state, TileState::Deferred))
    }

    fn show_cached(&mut self, key: TileKey) -> bool {
        let Some(bitmap) = self.cache.get(&key).cloned() else {
            return false;
        };
        self.tiles.insert(
            key,
            TileState::Displayed {
                bitmap: Arc::clone(&bitmap),
            },
        );
        self.emit(TileEvent::Ready { key, bitmap });
        true
    }

    /// Sends a render job for `key`. On failure the tile is deferred and any
    /// `stale` bitmap is released. Returns whether a job was queued.
    pub(crate) fn dispatch_tile(
        &mut self,
        key: TileKey,
        stale: Option<Arc<Bitmap>>,
    ) -> bool {
        let job_id = self.allocate_job_id();
        let job = RasterJob {
            job_id,
            key,
            drawing: Arc::clone(&self.drawing),
            region: self.grid.tile_rect(key),
            scale: TileGrid::scale_for_bucket(key.zoom_bucket),
            tile_size: self.grid.tile_size(),
            options: self.raster_options,
        };
        match self.dispatcher.dispatch(job) {
            Ok(()) => {
                tracing::trace!(?key, job_id, "tile job dispatched");
                self.tiles.insert(key, TileState::Rendering { job_id, stale });
                true
            }
            Err(error) => {
                match error {
                    DispatchError::QueueFull => {
                        tracing::warn!(?key, job_id, "raster queue full, tile deferred")
                    }
                    DispatchError::Disconnected => {
                        tracing::warn!(?key, job_id, "raster workers gone, tile deferred")
                    }
                }
                if stale.is_some() {
                    self.emit(TileEvent::Released { key });
                }
                self.tiles.insert(key, TileState::Deferred);
                false
            }
        }
    }
}

fn validate_viewport(visible_rect: &DrawingRect, zoom: f64) -> Result<(), ViewportError> {
    if !zoom.is_finite() {
        return Err(ViewportError::NonFiniteZoom);
    }
    if zoom <= 0.0 {
        return Err(ViewportError::NonPositiveZoom);
    }
    if visible_rect.is_empty() {
        return Err(ViewportError::EmptyRect);
    }
    Ok(())
}
