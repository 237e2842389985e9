//! Schedule core: time grid, conflict detection, layout and the selected-session store.

pub mod conflict;
pub mod export;
pub mod grid;
pub mod layout;
pub mod store;
mod types;

pub use conflict::{conflicts_on, find_conflict, ConflictReport};
pub use grid::{format_time, GridConfig, GridError, TimeGrid};
pub use layout::{layout_for, layout_view, Offset, Placement, SlotGeometry, ViewMode, Width};
pub use store::{
    JsonFileStorage, MemoryStorage, ScheduleEntry, ScheduleStorage, ScheduleStore, StorageError,
    PALETTE, STORAGE_KEY,
};
pub use types::*;
pub(crate) use types::null_as_empty;
