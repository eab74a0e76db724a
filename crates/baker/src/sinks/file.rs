//! FileSink - serialized assets on disk
//!
//! Layout: `<base_path>/<asset_path>/<name>.{json,bin}`.

use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use contracts::{AssetHandle, AssetSink, BakedAnimation, ContractError};
use tracing::{debug, error, instrument};

use crate::naming::sanitize_asset_name;

/// Encoding of written assets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssetFormat {
    #[default]
    Json,
    Bincode,
}

impl AssetFormat {
    pub fn from_param(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "bincode" | "bin" => Some(Self::Bincode),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Bincode => "bin",
        }
    }
}

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Base output directory
    pub base_path: PathBuf,
    pub format: AssetFormat,
}

impl FileSinkConfig {
    /// Create config from params map (`base_path`, `format`)
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let base_path = params
            .get("base_path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./output"));
        let format = params
            .get("format")
            .and_then(|f| AssetFormat::from_param(f))
            .unwrap_or_default();

        Self { base_path, format }
    }
}

/// Map an asset namespace onto a directory below `base`
pub(crate) fn namespace_dir(base: &Path, asset_path: &str) -> PathBuf {
    asset_path
        .split('/')
        .filter(|seg| !seg.is_empty() && *seg != "." && *seg != "..")
        .fold(base.to_path_buf(), |dir, seg| dir.join(seg))
}

/// File for `name` directly inside `dir`; the name never adds path components
pub(crate) fn asset_file(dir: &Path, name: &str, extension: &str) -> PathBuf {
    dir.join(format!("{}.{extension}", sanitize_asset_name(name)))
}

/// Sink that writes serialized animations to disk
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
    created_dirs: HashSet<PathBuf>,
    written: Vec<PathBuf>,
}

impl FileSink {
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        fs::create_dir_all(&config.base_path)?;

        Ok(Self {
            name: name.into(),
            config,
            created_dirs: HashSet::new(),
            written: Vec::new(),
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        Self::new(name, FileSinkConfig::from_params(params))
    }

    /// Files written so far
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn write_asset(&mut self, asset: &BakedAnimation) -> std::io::Result<PathBuf> {
        let dir = namespace_dir(&self.config.base_path, &asset.asset_path);
        if !self.created_dirs.contains(&dir) {
            fs::create_dir_all(&dir)?;
            self.created_dirs.insert(dir.clone());
        }

        let path = asset_file(&dir, &asset.name, self.config.format.extension());
        let mut writer = BufWriter::new(File::create(&path)?);
        match self.config.format {
            AssetFormat::Json => serde_json::to_writer_pretty(&mut writer, asset)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?,
            AssetFormat::Bincode => bincode::serialize_into(&mut writer, asset)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?,
        }
        writer.flush()?;
        Ok(path)
    }
}

impl AssetSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_commit",
        skip(self, asset),
        fields(sink = %self.name, asset = %asset.name)
    )]
    async fn commit(&mut self, asset: &BakedAnimation) -> Result<AssetHandle, ContractError> {
        let path = self.write_asset(asset).map_err(|e| {
            error!(sink = %self.name, asset = %asset.name, error = %e, "write failed");
            ContractError::sink_write(&self.name, e.to_string())
        })?;
        debug!(path = %path.display(), "asset written");
        self.written.push(path.clone());
        Ok(AssetHandle {
            sink: self.name.clone(),
            location: path.display().to_string(),
        })
    }

    #[instrument(name = "file_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        debug!(sink = %self.name, files = self.written.len(), "FileSink flushed");
        Ok(())
    }
}
