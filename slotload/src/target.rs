//! Display targets that receive decoded assets.

use crate::asset::{Asset, DecodeSpec};
use crate::task::SlotId;
use std::sync::Arc;

/// A UI slot that decoded assets are delivered into.
///
/// All methods except the dimension getters are called on the delivery
/// thread, one event at a time.
pub trait DisplayTarget: Send + Sync {
    /// Width in pixels, used to build the default [`DecodeSpec`].
    fn width(&self) -> u32;

    /// Height in pixels, used to build the default [`DecodeSpec`].
    fn height(&self) -> u32;

    /// Shows a decoded asset.
    fn deliver(&self, asset: Arc<Asset>);

    /// Starts playback of an animated asset after it was delivered.
    fn start_animation(&self, _asset: &Arc<Asset>) {}

    /// Stable slot identity.
    ///
    /// The default derives the slot from the target's address. An address
    /// is only unique while the target is alive: a new target allocated
    /// where a freed one lived gets the same slot and inherits its record,
    /// and every distinct address adds an entry to the slot map that is
    /// only cleared on terminate. Targets that are recycled (list rows
    /// rebound to new data) or short-lived should return an id of their
    /// own, drawn from a bounded set such as the row position.
    fn slot_id(&self) -> Option<SlotId> {
        None
    }
}

/// Resolves the slot a target loads into.
pub fn slot_of(target: &Arc<dyn DisplayTarget>) -> SlotId {
    target.slot_id().unwrap_or_else(|| SlotId::of(target))
}

/// Decode spec matching a target's current dimensions.
pub fn spec_for(target: &dyn DisplayTarget) -> DecodeSpec {
    DecodeSpec::new(target.width(), target.height())
}
