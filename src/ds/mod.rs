pub mod shard;
pub mod slot_arena;

pub use shard::{SegmentSelector, mix64};
pub use slot_arena::{SlotArena, SlotId};
