//! Sink implementations
//!
//! Contains LogSink, FileSink and BvhSink, plus the config-driven fan-out
//! used by the bake queue.

mod bvh;
mod file;
mod log;

use std::path::Path;

use contracts::{AssetHandle, AssetSink, BakedAnimation, ContractError, SinkConfig, SinkType};
use tracing::{instrument, warn};

use crate::error::BakeError;

pub use self::bvh::{write_bvh, BvhSink, BvhSinkConfig};
pub use self::file::{AssetFormat, FileSink, FileSinkConfig};
pub use self::log::LogSink;

/// Any configured sink
pub enum ConfiguredSink {
    Log(LogSink),
    File(FileSink),
    Bvh(BvhSink),
}

impl AssetSink for ConfiguredSink {
    fn name(&self) -> &str {
        match self {
            Self::Log(s) => s.name(),
            Self::File(s) => s.name(),
            Self::Bvh(s) => s.name(),
        }
    }

    async fn commit(&mut self, asset: &BakedAnimation) -> Result<AssetHandle, ContractError> {
        match self {
            Self::Log(s) => s.commit(asset).await,
            Self::File(s) => s.commit(asset).await,
            Self::Bvh(s) => s.commit(asset).await,
        }
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        match self {
            Self::Log(s) => s.flush().await,
            Self::File(s) => s.flush().await,
            Self::Bvh(s) => s.flush().await,
        }
    }
}

/// Build a sink from configuration
///
/// `output_dir` overrides the `base_path` param of file-backed sinks.
#[instrument(
    name = "baker_create_sink",
    skip(config, output_dir),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
pub fn create_sink(
    config: &SinkConfig,
    output_dir: Option<&Path>,
) -> Result<ConfiguredSink, BakeError> {
    let mut params = config.params.clone();
    if let Some(dir) = output_dir {
        params.insert("base_path".to_string(), dir.display().to_string());
    }

    match config.sink_type {
        SinkType::Log => Ok(ConfiguredSink::Log(LogSink::new(&config.name))),
        SinkType::File => FileSink::from_params(&config.name, &params)
            .map(ConfiguredSink::File)
            .map_err(|e| BakeError::sink_creation(&config.name, e.to_string())),
        SinkType::Bvh => BvhSink::from_params(&config.name, &params)
            .map(ConfiguredSink::Bvh)
            .map_err(|e| BakeError::sink_creation(&config.name, e.to_string())),
    }
}

/// Fan-out over several sinks
///
/// A commit succeeds if at least one sink accepts the asset; per-sink
/// failures are logged and do not stop the others.
pub struct SinkSet {
    name: String,
    sinks: Vec<ConfiguredSink>,
}

impl SinkSet {
    pub fn new(sinks: Vec<ConfiguredSink>) -> Self {
        let name = sinks
            .iter()
            .map(|s| s.name())
            .collect::<Vec<_>>()
            .join("+");
        Self { name, sinks }
    }

    /// Build every configured sink; falls back to a single log sink when none are configured
    pub fn from_configs(configs: &[SinkConfig], output_dir: Option<&Path>) -> Result<Self, BakeError> {
        if configs.is_empty() {
            return Ok(Self::new(vec![ConfiguredSink::Log(LogSink::new("log"))]));
        }
        let sinks = configs
            .iter()
            .map(|c| create_sink(c, output_dir))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(sinks))
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl AssetSink for SinkSet {
    fn name(&self) -> &str {
        &self.name
    }

    async fn commit(&mut self, asset: &BakedAnimation) -> Result<AssetHandle, ContractError> {
        let mut first_ok: Option<AssetHandle> = None;
        let mut first_err: Option<ContractError> = None;

        for sink in &mut self.sinks {
            match sink.commit(asset).await {
                Ok(handle) => {
                    first_ok.get_or_insert(handle);
                }
                Err(e) => {
                    warn!(sink = %sink.name(), asset = %asset.name, error = %e, "sink commit failed");
                    first_err.get_or_insert(e);
                }
            }
        }

        match (first_ok, first_err) {
            (Some(handle), _) => Ok(handle),
            (None, Some(e)) => Err(e),
            (None, None) => Err(ContractError::sink_write(&self.name, "no sinks configured")),
        }
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        let mut result = Ok(());
        for sink in &mut self.sinks {
            if let Err(e) = sink.flush().await {
                warn!(sink = %sink.name(), error = %e, "sink flush failed");
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }
}
