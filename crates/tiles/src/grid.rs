use std::fmt;

use model::DrawingRect;

use crate::TileKey;

/// Zoom steps in percent. 100 renders one drawing unit per pixel.
pub const DEFAULT_ZOOM_BUCKETS: [i32; 4] = [100, 150, 200, 300];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomBucketsError {
    Empty,
    NonPositive { bucket: i32 },
}

impl fmt::Display for ZoomBucketsError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoomBucketsError::Empty => write!(formatter, "zoom bucket list is empty"),
            ZoomBucketsError::NonPositive { bucket } => {
                write!(formatter, "zoom bucket {bucket}% must be positive")
            }
        }
    }
}

impl std::error::Error for ZoomBucketsError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoomBuckets {
    steps: Vec<i32>,
}

impl ZoomBuckets {
    pub fn new(steps: impl IntoIterator<Item = i32>) -> Result<Self, ZoomBucketsError> {
        let mut steps: Vec<i32> = steps.into_iter().collect();
        if steps.is_empty() {
            return Err(ZoomBucketsError::Empty);
        }
        if let Some(&bucket) = steps.iter().find(|bucket| **bucket <= 0) {
            return Err(ZoomBucketsError::NonPositive { bucket });
        }
        steps.sort_unstable();
        steps.dedup();
        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[i32] {
        &self.steps
    }

    /// Nearest step to `zoom` (1.0 == 100%). Ties go to the smaller step so a
    /// zoom halfway between two steps renders the cheaper tiles.
    pub fn quantize(&self, zoom: f64) -> i32 {
        let percent = zoom * 100.0;
        let mut best = self.steps[0];
        let mut best_distance = (percent - best as f64).abs();
        for &step in &self.steps[1..] {
            let distance = (percent - step as f64).abs();
            if distance < best_distance {
                best = step;
                best_distance = distance;
            }
        }
        best
    }
}

impl Default for ZoomBuckets {
    fn default() -> Self {
        Self {
            steps: DEFAULT_ZOOM_BUCKETS.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileGridError {
    ZeroTileSize,
}

impl fmt::Display for TileGridError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TileGridError::ZeroTileSize => write!(formatter, "tile size must be at least 1 px"),
        }
    }
}

impl std::error::Error for TileGridError {}

/// Inclusive span of tile indices within one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub start_x: i32,
    pub start_y: i32,
    pub end_x: i32,
    pub end_y: i32,
}

impl TileRange {
    pub fn contains(&self, tile_x: i32, tile_y: i32) -> bool {
        (self.start_x..=self.end_x).contains(&tile_x) && (self.start_y..=self.end_y).contains(&tile_y)
    }

    pub fn expand(&self, tiles: i32) -> TileRange {
        TileRange {
            start_x: self.start_x.saturating_sub(tiles),
            start_y: self.start_y.saturating_sub(tiles),
            end_x: self.end_x.saturating_add(tiles),
            end_y: self.end_y.saturating_add(tiles),
        }
    }

    pub fn intersection(&self, other: &TileRange) -> Option<TileRange> {
        let range = TileRange {
            start_x: self.start_x.max(other.start_x),
            start_y: self.start_y.max(other.start_y),
            end_x: self.end_x.min(other.end_x),
            end_y: self.end_y.min(other.end_y),
        };
        if range.start_x > range.end_x || range.start_y > range.end_y {
            return None;
        }
        Some(range)
    }

    fn push_keys(&self, zoom_bucket: i32, skip: Option<&TileRange>, keys: &mut Vec<TileKey>) {
        for tile_y in self.start_y..=self.end_y {
            for tile_x in self.start_x..=self.end_x {
                if skip.is_some_and(|inner| inner.contains(tile_x, tile_y)) {
                    continue;
                }
                keys.push(TileKey::new(tile_x, tile_y, zoom_bucket));
            }
        }
    }
}

/// Square tiles of `tile_size` pixels. At bucket `b` a tile covers
/// `tile_size * 100 / b` drawing units per side, with tile (0, 0) anchored at
/// the drawing origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    tile_size: u32,
}

impl TileGrid {
    pub fn new(tile_size: u32) -> Result<Self, TileGridError> {
        if tile_size == 0 {
            return Err(TileGridError::ZeroTileSize);
        }
        Ok(Self { tile_size })
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// Pixels per drawing unit for a bucket.
    pub fn scale_for_bucket(zoom_bucket: i32) -> f64 {
        zoom_bucket as f64 / 100.0
    }

    pub fn tile_extent(&self, zoom_bucket: i32) -> f64 {
        self.tile_size as f64 / Self::scale_for_bucket(zoom_bucket)
    }

    pub fn tile_rect(&self, key: TileKey) -> DrawingRect {
        let extent = self.tile_extent(key.zoom_bucket);
        DrawingRect::new(
            key.tile_x as f64 * extent,
            key.tile_y as f64 * extent,
            (key.tile_x as f64 + 1.0) * extent,
            (key.tile_y as f64 + 1.0) * extent,
        )
    }

    /// Tiles overlapping the half-open `rect`, or `None` when it is empty.
    pub fn tile_range(&self, rect: &DrawingRect, zoom_bucket: i32) -> Option<TileRange> {
        if rect.is_empty() {
            return None;
        }
        let extent = self.tile_extent(zoom_bucket);
        let start_x = (rect.min_x / extent).floor();
        let start_y = (rect.min_y / extent).floor();
        let end_x = (rect.max_x / extent).ceil() - 1.0;
        let end_y = (rect.max_y / extent).ceil() - 1.0;
        Some(TileRange {
            start_x: clamp_index(start_x),
            start_y: clamp_index(start_y),
            end_x: clamp_index(end_x.max(start_x)),
            end_y: clamp_index(end_y.max(start_y)),
        })
    }

    /// Keys for `rect` at `zoom_bucket`: visible tiles first, then a ring of
    /// `padding_tiles` around them, each group in row-major order. With
    /// `page_bounds` set, both groups are clipped to tiles touching the page.
    pub fn keys_intersecting(
        &self,
        rect: &DrawingRect,
        zoom_bucket: i32,
        padding_tiles: u32,
        page_bounds: Option<&DrawingRect>,
    ) -> Vec<TileKey> {
        let Some(visible) = self.tile_range(rect, zoom_bucket) else {
            return Vec::new();
        };
        let padding = i32::try_from(padding_tiles).unwrap_or(i32::MAX);
        let mut padded = visible.expand(padding);

        let mut visible = Some(visible);
        if let Some(page) = page_bounds {
            let Some(page_range) = self.tile_range(page, zoom_bucket) else {
                return Vec::new();
            };
            visible = visible.and_then(|range| range.intersection(&page_range));
            padded = match padded.intersection(&page_range) {
                Some(range) => range,
                None => return Vec::new(),
            };
        }

        let mut keys = Vec::new();
        if let Some(visible) = visible.as_ref() {
            visible.push_keys(zoom_bucket, None, &mut keys);
        }
        padded.push_keys(zoom_bucket, visible.as_ref(), &mut keys);
        keys
    }
}

impl Default for TileGrid {
    fn default() -> Self {
        Self {
            tile_size: crate::DEFAULT_TILE_SIZE,
        }
    }
}

fn clamp_index(value: f64) -> i32 {
    value.clamp(i32::MIN as f64, i32::MAX as f64) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_are_sorted_and_deduplicated() {
        let buckets = ZoomBuckets::new([200, 100, 200, 50]).expect("valid buckets");
        assert_eq!(buckets.steps(), &[50, 100, 200]);
    }

    #[test]
    fn bucket_validation_rejects_empty_and_non_positive() {
        assert_eq!(ZoomBuckets::new([]), Err(ZoomBucketsError::Empty));
        assert_eq!(
            ZoomBuckets::new([100, 0]),
            Err(ZoomBucketsError::NonPositive { bucket: 0 })
        );
    }

    #[test]
    fn quantize_picks_nearest_step_and_breaks_ties_downward() {
        let buckets = ZoomBuckets::default();
        assert_eq!(buckets.quantize(0.25), 100);
        assert_eq!(buckets.quantize(1.1), 100);
        assert_eq!(buckets.quantize(1.25), 100);
        assert_eq!(buckets.quantize(1.3), 150);
        assert_eq!(buckets.quantize(2.5), 200);
        assert_eq!(buckets.quantize(2.6), 300);
        assert_eq!(buckets.quantize(8.0), 300);
    }

    #[test]
    fn tile_extent_shrinks_with_zoom() {
        let grid = TileGrid::new(256).expect("grid");
        assert_eq!(grid.tile_extent(100), 256.0);
        assert_eq!(grid.tile_extent(200), 128.0);
        assert_eq!(
            grid.tile_rect(TileKey::new(1, 2, 200)),
            DrawingRect::new(128.0, 256.0, 256.0, 384.0)
        );
    }

    #[test]
    fn zero_tile_size_is_rejected() {
        assert_eq!(TileGrid::new(0), Err(TileGridError::ZeroTileSize));
    }

    #[test]
    fn tile_range_treats_max_edge_as_exclusive() {
        let grid = TileGrid::new(256).expect("grid");
        let range = grid
            .tile_range(&DrawingRect::new(0.0, 0.0, 256.0, 512.0), 100)
            .expect("range");
        assert_eq!(
            range,
            TileRange {
                start_x: 0,
                start_y: 0,
                end_x: 0,
                end_y: 1,
            }
        );
        assert_eq!(
            grid.tile_range(&DrawingRect::new(10.0, 0.0, 10.0, 5.0), 100),
            None
        );
    }

    #[test]
    fn negative_coordinates_map_to_negative_tiles() {
        let grid = TileGrid::new(100).expect("grid");
        let range = grid
            .tile_range(&DrawingRect::new(-150.0, -1.0, -50.0, 1.0), 100)
            .expect("range");
        assert_eq!((range.start_x, range.end_x), (-2, -1));
        assert_eq!((range.start_y, range.end_y), (-1, 0));
    }

    #[test]
    fn visible_tiles_come_before_padding_ring() {
        let grid = TileGrid::new(100).expect("grid");
        let keys =
            grid.keys_intersecting(&DrawingRect::new(100.0, 100.0, 200.0, 200.0), 100, 1, None);
        assert_eq!(keys.len(), 9);
        assert_eq!(keys[0], TileKey::new(1, 1, 100));
        assert_eq!(keys[1], TileKey::new(0, 0, 100));
        assert_eq!(keys[8], TileKey::new(2, 2, 100));
        assert!(!keys[1..].contains(&TileKey::new(1, 1, 100)));
    }

    #[test]
    fn page_bounds_clip_visible_and_padding_tiles() {
        let grid = TileGrid::new(100).expect("grid");
        let page = DrawingRect::new(0.0, 0.0, 200.0, 200.0);
        let keys = grid.keys_intersecting(
            &DrawingRect::new(0.0, 0.0, 100.0, 100.0),
            100,
            2,
            Some(&page),
        );
        assert_eq!(
            keys,
            vec![
                TileKey::new(0, 0, 100),
                TileKey::new(1, 0, 100),
                TileKey::new(0, 1, 100),
                TileKey::new(1, 1, 100),
            ]
        );

        let offscreen = grid.keys_intersecting(
            &DrawingRect::new(1000.0, 1000.0, 1100.0, 1100.0),
            100,
            1,
            Some(&page),
        );
        assert!(offscreen.is_empty());
    }
}
