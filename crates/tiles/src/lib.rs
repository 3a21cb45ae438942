use std::fmt;

mod cache;
mod grid;

pub use cache::{TileCache, TileCacheCreateError, TileCacheInvariantError};
pub use grid::{DEFAULT_ZOOM_BUCKETS, TileGrid, TileGridError, TileRange, ZoomBuckets, ZoomBucketsError};

/// Reference cache size, in entries.
pub const DEFAULT_CACHE_CAPACITY: usize = 150;
/// Tile edge in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 256;
/// Zoom bucket of an unscaled (1.0x) view, in percent.
pub const IDENTITY_ZOOM_BUCKET: i32 = 100;

/// Cache key: tile coordinate within the grid of one zoom bucket.
///
/// The same drawing area maps to different coordinates in different buckets
/// because the tile extent in drawing units shrinks as the zoom grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    pub tile_x: i32,
    pub tile_y: i32,
    pub zoom_bucket: i32,
}

impl TileKey {
    pub const fn new(tile_x: i32, tile_y: i32, zoom_bucket: i32) -> Self {
        Self {
            tile_x,
            tile_y,
            zoom_bucket,
        }
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "({}, {})@{}%",
            self.tile_x, self.tile_y, self.zoom_bucket
        )
    }
}
