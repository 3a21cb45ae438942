//! Tile scheduler and viewport renderer.
//!
//! `ViewportRenderer` owns the tile cache and per-tile scheduling state on the
//! interactive thread. Rendering happens elsewhere, behind `RasterDispatcher`.
//!
//! Internal layout:
//! - `config`: `RendererConfig` and its validation errors.
//! - `dispatch`: raster jobs, the dispatcher seam, and the worker-pool backend.
//! - `dirty`: dirty regions derived from changed strokes.
//! - `renderer_viewport`: viewport diffing and job dispatch.
//! - `renderer_invalidate`: drawing replacement, dirty invalidation, memory pressure.
//! - `renderer_completion`: applying finished jobs (check-then-commit).

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use model::{Drawing, DrawingRect, Stroke};
use rasterizer::{Bitmap, RasterOptions};
use tiles::{TileCache, TileGrid, TileKey, ZoomBuckets};

mod config;
mod dirty;
mod dispatch;
mod renderer_completion;
mod renderer_invalidate;
mod renderer_viewport;

pub use config::{RendererConfig, RendererConfigError, RendererStartError};
pub use dirty::{DirtyRegion, MAX_TRACKED_DIRTY_STROKES, dirty_region_for_strokes};
#[cfg(any(test, feature = "test-helpers"))]
pub use dispatch::ManualDispatcher;
pub use dispatch::{
    RasterCompletion, RasterDispatcher, RasterJob, WorkerPoolDispatcher, execute_raster_job,
};
pub use engine::DispatchError;

/// Outbound notifications for the host's compositor.
#[derive(Debug, Clone)]
pub enum TileEvent {
    /// Show `bitmap` at `key`'s tile rect, replacing whatever was shown there.
    Ready { key: TileKey, bitmap: Arc<Bitmap> },
    /// Stop showing `key`. Its cache entry, if any, stays.
    Released { key: TileKey },
}

/// Externally visible lifecycle of one tile key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TilePhase {
    Unrendered,
    Rendering,
    Displayed,
    /// Not needed by the viewport but still cached.
    Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateSummary {
    pub zoom_bucket: i32,
    pub needed: usize,
    pub cache_hits: usize,
    pub dispatched: usize,
    /// Needed keys that were already rendering or displayed.
    pub retained: usize,
    /// Keys that left the needed set.
    pub hidden: usize,
    /// Misses that could not be dispatched; retried on the next update.
    pub deferred: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewportError {
    NonFiniteZoom,
    NonPositiveZoom,
    EmptyRect,
}

impl fmt::Display for ViewportError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewportError::NonFiniteZoom => write!(formatter, "viewport zoom is not finite"),
            ViewportError::NonPositiveZoom => write!(formatter, "viewport zoom must be positive"),
            ViewportError::EmptyRect => write!(formatter, "viewport rect is empty"),
        }
    }
}

impl std::error::Error for ViewportError {}

#[derive(Debug, Clone)]
enum TileState {
    /// Needed but no job in flight: a dispatch failed, or its result was empty.
    Unrendered,
    /// The dispatcher refused the job; retried once capacity frees up.
    Deferred,
    /// Waiting for `job_id`. `stale` is the outdated bitmap still on screen.
    Rendering {
        job_id: u64,
        stale: Option<Arc<Bitmap>>,
    },
    Displayed {
        bitmap: Arc<Bitmap>,
    },
}

impl TileState {
    fn shown_bitmap(&self) -> Option<&Arc<Bitmap>> {
        match self {
            TileState::Unrendered | TileState::Deferred => None,
            TileState::Rendering { stale, .. } => stale.as_ref(),
            TileState::Displayed { bitmap } => Some(bitmap),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ViewportRequest {
    visible_rect: DrawingRect,
    zoom: f64,
}

pub struct ViewportRenderer<D: RasterDispatcher = WorkerPoolDispatcher> {
    grid: TileGrid,
    zoom_buckets: ZoomBuckets,
    padding_tiles: u32,
    raster_options: RasterOptions,
    cache: TileCache<Arc<Bitmap>>,
    dispatcher: D,
    drawing: Arc<Drawing>,
    page_bounds: Option<DrawingRect>,
    last_viewport: Option<ViewportRequest>,
    active_zoom_bucket: Option<i32>,
    /// Keys the current viewport needs, in dispatch priority order.
    needed: Vec<TileKey>,
    /// State of every needed key; no other key has an entry.
    tiles: HashMap<TileKey, TileState>,
    next_job_id: u64,
    event_sender: Sender<TileEvent>,
    event_receiver: Receiver<TileEvent>,
}

impl ViewportRenderer<WorkerPoolDispatcher> {
    /// Validates `config` and starts the raster worker pool.
    pub fn start(config: &RendererConfig) -> Result<Self, RendererStartError> {
        config.validate()?;
        let dispatcher = WorkerPoolDispatcher::start(config.workers)?;
        Ok(Self::with_dispatcher(config, dispatcher)?)
    }
}

impl<D: RasterDispatcher> ViewportRenderer<D> {
    pub fn with_dispatcher(config: &RendererConfig, dispatcher: D) -> Result<Self, RendererConfigError> {
        config.validate()?;
        let grid = TileGrid::new(config.tile_size).map_err(|_| RendererConfigError::ZeroTileSize)?;
        let cache =
            TileCache::new(config.cache_capacity).map_err(|_| RendererConfigError::ZeroCacheCapacity)?;
        let (event_sender, event_receiver) = crossbeam_channel::unbounded();
        Ok(Self {
            grid,
            zoom_buckets: config.zoom_buckets()?,
            padding_tiles: config.padding_tiles,
            raster_options: config.raster,
            cache,
            dispatcher,
            drawing: Arc::new(Drawing::new()),
            page_bounds: None,
            last_viewport: None,
            active_zoom_bucket: None,
            needed: Vec::new(),
            tiles: HashMap::new(),
            next_job_id: 0,
            event_sender,
            event_receiver,
        })
    }

    /// Receiver for tile events. All clones share one queue.
    pub fn events(&self) -> Receiver<TileEvent> {
        self.event_receiver.clone()
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    pub fn raster_options(&self) -> &RasterOptions {
        &self.raster_options
    }

    /// Scale of the smallest configured zoom bucket.
    pub fn min_scale(&self) -> f64 {
        let smallest = self
            .zoom_buckets
            .steps()
            .iter()
            .copied()
            .min()
            .unwrap_or(tiles::IDENTITY_ZOOM_BUCKET);
        TileGrid::scale_for_bucket(smallest)
    }

    /// Region touched by `strokes` in tiles of every configured bucket.
    pub fn dirty_region_for(&self, strokes: &[Arc<Stroke>]) -> DirtyRegion {
        dirty_region_for_strokes(strokes, &self.raster_options, self.min_scale())
    }

    pub fn drawing(&self) -> &Arc<Drawing> {
        &self.drawing
    }

    pub fn page_bounds(&self) -> Option<DrawingRect> {
        self.page_bounds
    }

    pub fn active_zoom_bucket(&self) -> Option<i32> {
        self.active_zoom_bucket
    }

    pub fn needed_keys(&self) -> &[TileKey] {
        &self.needed
    }

    pub fn cache(&self) -> &TileCache<Arc<Bitmap>> {
        &self.cache
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut D {
        &mut self.dispatcher
    }

    pub fn tile_phase(&self, key: &TileKey) -> TilePhase {
        match self.tiles.get(key) {
            Some(TileState::Unrendered | TileState::Deferred) => TilePhase::Unrendered,
            Some(TileState::Rendering { .. }) => TilePhase::Rendering,
            Some(TileState::Displayed { .. }) => TilePhase::Displayed,
            None if self.cache.contains(key) => TilePhase::Hidden,
            None => TilePhase::Unrendered,
        }
    }

    /// Bitmap currently shown for `key`, including a stale one awaiting refresh.
    pub fn displayed_tile(&self, key: &TileKey) -> Option<Arc<Bitmap>> {
        self.tiles.get(key)?.shown_bitmap().cloned()
    }

    fn emit(&self, event: TileEvent) {
        // The renderer holds a receiver itself, so the channel never disconnects.
        let _ = self.event_sender.send(event);
    }

    fn allocate_job_id(&mut self) -> u64 {
        self.next_job_id = self
            .next_job_id
            .checked_add(1)
            .expect("raster job id overflow");
        self.next_job_id
    }

    /// Drops scheduling state for every key, releasing shown bitmaps.
    ///
    /// Events the host has not read yet are discarded first so their bitmaps
    /// are freed; every key they mention is released again, since the host
    /// may still show an older bitmap for it.
    fn release_all_tiles(&mut self) -> usize {
        let mut to_release: Vec<TileKey> = Vec::new();
        let mut seen: HashSet<TileKey> = HashSet::new();
        for key in &self.needed {
            let shown = self
                .tiles
                .get(key)
                .is_some_and(|state| state.shown_bitmap().is_some());
            if shown && seen.insert(*key) {
                to_release.push(*key);
            }
        }
        let discarded = self.discard_queued_events();
        for key in discarded {
            if seen.insert(key) {
                to_release.push(key);
            }
        }
        self.tiles.clear();
        for key in &to_release {
            self.emit(TileEvent::Released { key: *key });
        }
        to_release.len()
    }

    fn discard_queued_events(&self) -> Vec<TileKey> {
        self.event_receiver
            .try_iter()
            .map(|event| match event {
                TileEvent::Ready { key, .. } | TileEvent::Released { key } => key,
            })
            .collect()
    }
}
