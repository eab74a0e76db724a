//! AssetSink trait - bake output interface
//!
//! Defines the abstract interface for baked animation sinks.

use crate::{AssetHandle, BakedAnimation, ContractError};

/// Baked asset output trait
///
/// All sink implementations must implement this trait.
#[trait_variant::make(AssetSink: Send)]
pub trait LocalAssetSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Persist one baked animation
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn commit(&mut self, asset: &BakedAnimation) -> Result<AssetHandle, ContractError>;

    /// Flush buffered writes; called once the bake queue drains
    async fn flush(&mut self) -> Result<(), ContractError>;
}
