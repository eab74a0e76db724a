//! LogSink - logs baked asset summaries via tracing

use contracts::{AssetHandle, AssetSink, BakedAnimation, ContractError};
use tracing::{info, instrument};

/// Sink that only logs what would have been written
pub struct LogSink {
    name: String,
    committed: usize,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            committed: 0,
        }
    }

    pub fn committed(&self) -> usize {
        self.committed
    }
}

impl AssetSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_commit",
        skip(self, asset),
        fields(sink = %self.name, asset = %asset.name)
    )]
    async fn commit(&mut self, asset: &BakedAnimation) -> Result<AssetHandle, ContractError> {
        self.committed += 1;
        info!(
            sink = %self.name,
            path = %asset.object_path(),
            bones = asset.tracks.len(),
            frames = asset.frame_count,
            fps = asset.frame_rate,
            duration_s = asset.duration(),
            "baked animation"
        );
        Ok(AssetHandle {
            sink: self.name.clone(),
            location: asset.object_path(),
        })
    }

    #[instrument(name = "log_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        // Nothing to flush for log sink
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::SkeletonDescriptor;

    #[tokio::test]
    async fn test_log_sink_commit() {
        let mut sink = LogSink::new("test_log");
        let asset = BakedAnimation {
            name: "Mocap_A".into(),
            asset_path: "/MocapCaptures".into(),
            skeleton: SkeletonDescriptor::single_bone("root"),
            frame_rate: 30,
            frame_count: 0,
            tracks: vec![],
        };

        let handle = sink.commit(&asset).await.unwrap();
        assert_eq!(handle.location, "/MocapCaptures/Mocap_A");
        assert_eq!(sink.committed(), 1);
        assert!(sink.flush().await.is_ok());
        assert_eq!(sink.name(), "test_log");
    }
}
