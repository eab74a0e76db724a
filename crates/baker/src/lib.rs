//! # Baker
//!
//! Turns detached recordings into evenly spaced animation assets.
//!
//! - [`Resampler`]: nearest-sample resampling to the export rate
//! - [`BakeQueue`]: one job per bake tick, deferred while an external context runs
//! - Sinks: log, serialized files (JSON / bincode), BVH

pub mod error;
pub mod metrics;
pub mod naming;
pub mod queue;
pub mod resample;
pub mod sinks;

pub use contracts::{AssetSink, BakeStatus, BakedAnimation};
pub use error::{BakeError, Result};
pub use metrics::{BakeMetrics, MetricsSnapshot};
pub use naming::{asset_name_at, default_asset_name, sanitize_asset_name};
pub use queue::{BakeJob, BakeOutcome, BakeQueue, DEFAULT_BAKE_INTERVAL};
pub use resample::{resample, Resampler, MAX_EXPORT_FPS, MIN_EXPORT_FPS};
pub use sinks::{
    create_sink, AssetFormat, BvhSink, BvhSinkConfig, ConfiguredSink, FileSink, FileSinkConfig,
    LogSink, SinkSet,
};
