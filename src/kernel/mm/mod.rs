// src/kernel/mm/mod.rs
//! Demand-paged memory management: frame table, swap area, page faults.

pub mod frame;
pub mod page_fault;
pub mod swap;
pub mod types;

pub use frame::{FrameEntry, FrameTable};
pub use page_fault::{handle_page_fault, release_process_frames, touch_page};
pub use swap::SwapArea;
pub use types::PageTable;
