use std::fmt;

use driver::{DriverConfig, DriverConfigError};
use engine::WorkerPoolStartError;
use model::StrokeStyle;
use rasterizer::RasterOptionsError;
use renderer::{RendererConfig, RendererConfigError};
use serde::Deserialize;
use tiles::ZoomBucketsError;

/// Complete engine configuration. Every field has a default, so a JSON
/// document only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub renderer: RendererConfig,
    pub driver: DriverConfig,
    pub stroke_style: StrokeStyle,
}

impl EngineConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.renderer.validate()?;
        self.driver.validate()?;
        let base_width = self.stroke_style.base_width;
        if !(base_width.is_finite() && base_width > 0.0) {
            return Err(ConfigError::NonPositiveBaseWidth { base_width });
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ZeroTileSize,
    ZeroCacheCapacity,
    ZeroWorkers,
    ZeroQueueCapacity,
    ZoomBuckets(ZoomBucketsError),
    SubdivisionsOutOfRange { subdivisions: u32 },
    NonPositiveBaseWidth { base_width: f32 },
    Driver(DriverConfigError),
    Json(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroTileSize => write!(formatter, "tile size must be at least 1 px"),
            ConfigError::ZeroCacheCapacity => {
                write!(formatter, "tile cache capacity must be at least 1")
            }
            ConfigError::ZeroWorkers => write!(formatter, "raster worker count must be at least 1"),
            ConfigError::ZeroQueueCapacity => {
                write!(formatter, "raster job queue capacity must be at least 1")
            }
            ConfigError::ZoomBuckets(error) => write!(formatter, "{error}"),
            ConfigError::SubdivisionsOutOfRange { subdivisions } => {
                write!(formatter, "curve subdivisions {subdivisions} out of range")
            }
            ConfigError::NonPositiveBaseWidth { base_width } => {
                write!(formatter, "stroke base width {base_width} must be positive")
            }
            ConfigError::Driver(error) => write!(formatter, "{error}"),
            ConfigError::Json(error) => write!(
                formatter,
                "config JSON invalid at line {} column {}: {error}",
                error.line(),
                error.column()
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Json(error) => Some(error),
            ConfigError::Driver(error) => Some(error),
            ConfigError::ZoomBuckets(error) => Some(error),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(error: serde_json::Error) -> Self {
        Self::Json(error)
    }
}

impl From<DriverConfigError> for ConfigError {
    fn from(error: DriverConfigError) -> Self {
        Self::Driver(error)
    }
}

impl From<RendererConfigError> for ConfigError {
    fn from(error: RendererConfigError) -> Self {
        match error {
            RendererConfigError::ZeroTileSize => Self::ZeroTileSize,
            RendererConfigError::ZeroCacheCapacity => Self::ZeroCacheCapacity,
            RendererConfigError::ZeroWorkers => Self::ZeroWorkers,
            RendererConfigError::ZeroQueueCapacity => Self::ZeroQueueCapacity,
            RendererConfigError::ZoomBuckets(error) => Self::ZoomBuckets(error),
            RendererConfigError::Raster(RasterOptionsError::SubdivisionsOutOfRange {
                subdivisions,
            }) => Self::SubdivisionsOutOfRange { subdivisions },
        }
    }
}

#[derive(Debug)]
pub enum EngineStartError {
    Config(ConfigError),
    WorkerPool(WorkerPoolStartError),
}

impl fmt::Display for EngineStartError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineStartError::Config(error) => write!(formatter, "invalid engine config: {error}"),
            EngineStartError::WorkerPool(error) => write!(formatter, "{error}"),
        }
    }
}

impl std::error::Error for EngineStartError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineStartError::Config(error) => Some(error),
            EngineStartError::WorkerPool(error) => Some(error),
        }
    }
}

impl From<ConfigError> for EngineStartError {
    fn from(error: ConfigError) -> Self {
        Self::Config(error)
    }
}

impl From<WorkerPoolStartError> for EngineStartError {
    fn from(error: WorkerPoolStartError) -> Self {
        Self::WorkerPool(error)
    }
}
