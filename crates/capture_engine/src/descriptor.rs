//! Descriptor construction from a live skeleton

use contracts::{ActorId, SkeletonDescriptor, SkeletonProvider};
use tracing::debug;

use crate::error::{CaptureError, Result};

/// Snapshot the bone table of `actor`
///
/// # Errors
/// - actor has no skeleton
/// - provider failure while reading names / parents
/// - the live table is structurally invalid
pub fn build_descriptor<P>(provider: &P, actor: ActorId) -> Result<SkeletonDescriptor>
where
    P: SkeletonProvider + ?Sized,
{
    if !provider.has_skeleton(actor) {
        return Err(CaptureError::NoSkeleton { actor_id: actor });
    }

    let count = provider.bone_count(actor)?;
    let names = (0..count)
        .map(|bone| provider.bone_name(actor, bone))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let parents = (0..count)
        .map(|bone| provider.parent_index(actor, bone))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let descriptor = SkeletonDescriptor::new(names, parents)?;
    debug!(actor = %actor, bones = count, "skeleton descriptor built");
    Ok(descriptor)
}
