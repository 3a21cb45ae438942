use std::fmt;

use engine::{WorkerPoolConfig, WorkerPoolStartError};
use rasterizer::{RasterOptions, RasterOptionsError};
use serde::Deserialize;
use tiles::{
    DEFAULT_CACHE_CAPACITY, DEFAULT_TILE_SIZE, DEFAULT_ZOOM_BUCKETS, ZoomBuckets, ZoomBucketsError,
};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Tile edge in pixels.
    pub tile_size: u32,
    /// Cached tiles across all zoom buckets.
    pub cache_capacity: usize,
    /// Rings of offscreen tiles rendered around the visible ones.
    pub padding_tiles: u32,
    /// Zoom steps in percent.
    pub zoom_buckets: Vec<i32>,
    pub raster: RasterOptions,
    pub workers: WorkerPoolConfig,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            padding_tiles: 1,
            zoom_buckets: DEFAULT_ZOOM_BUCKETS.to_vec(),
            raster: RasterOptions::default(),
            workers: WorkerPoolConfig::default(),
        }
    }
}

impl RendererConfig {
    pub fn validate(&self) -> Result<(), RendererConfigError> {
        if self.tile_size == 0 {
            return Err(RendererConfigError::ZeroTileSize);
        }
        if self.cache_capacity == 0 {
            return Err(RendererConfigError::ZeroCacheCapacity);
        }
        self.zoom_buckets()?;
        self.raster.validate()?;
        self.workers.validate().map_err(|error| match error {
            WorkerPoolStartError::ZeroQueueCapacity => RendererConfigError::ZeroQueueCapacity,
            _ => RendererConfigError::ZeroWorkers,
        })?;
        Ok(())
    }

    pub fn zoom_buckets(&self) -> Result<ZoomBuckets, RendererConfigError> {
        Ok(ZoomBuckets::new(self.zoom_buckets.iter().copied())?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererConfigError {
    ZeroTileSize,
    ZeroCacheCapacity,
    ZeroWorkers,
    ZeroQueueCapacity,
    ZoomBuckets(ZoomBucketsError),
    Raster(RasterOptionsError),
}

impl fmt::Display for RendererConfigError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RendererConfigError::ZeroTileSize => write!(formatter, "tile size must be at least 1 px"),
            RendererConfigError::ZeroCacheCapacity => {
                write!(formatter, "tile cache capacity must be at least 1")
            }
            RendererConfigError::ZeroWorkers => {
                write!(formatter, "raster worker count must be at least 1")
            }
            RendererConfigError::ZeroQueueCapacity => {
                write!(formatter, "raster job queue capacity must be at least 1")
            }
            RendererConfigError::ZoomBuckets(error) => write!(formatter, "{error}"),
            RendererConfigError::Raster(error) => write!(formatter, "{error}"),
        }
    }
}

impl std::error::Error for RendererConfigError {}

impl From<ZoomBucketsError> for RendererConfigError {
    fn from(error: ZoomBucketsError) -> Self {
        Self::ZoomBuckets(error)
    }
}

impl From<RasterOptionsError> for RendererConfigError {
    fn from(error: RasterOptionsError) -> Self {
        Self::Raster(error)
    }
}

#[derive(Debug)]
pub enum RendererStartError {
    Config(RendererConfigError),
    WorkerPool(WorkerPoolStartError),
}

impl fmt::Display for RendererStartError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RendererStartError::Config(error) => write!(formatter, "invalid renderer config: {error}"),
            RendererStartError::WorkerPool(error) => {
                write!(formatter, "raster worker pool failed to start: {error}")
            }
        }
    }
}

impl std::error::Error for RendererStartError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RendererStartError::Config(error) => Some(error),
            RendererStartError::WorkerPool(error) => Some(error),
        }
    }
}

impl From<RendererConfigError> for RendererStartError {
    fn from(error: RendererConfigError) -> Self {
        Self::Config(error)
    }
}

impl From<WorkerPoolStartError> for RendererStartError {
    fn from(error: WorkerPoolStartError) -> Self {
        Self::WorkerPool(error)
    }
}
