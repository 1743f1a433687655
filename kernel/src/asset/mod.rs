//! Assets: single staged files and the collections that gather them.

pub mod collection;
pub mod entry;

pub use collection::{dedupe_by_destination, AddOutcome, AssetCollection};
pub use entry::{AssetEntry, AssetSource};
