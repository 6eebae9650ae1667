//! 32-bit ARM Mach-O decoding.
//!
//! Parsing proceeds in layers: the [`MachHeader`], the load command table
//! (dispatched through [`decoder_for`]), then the [`MachOContext`] passes that
//! materialize segments, sections, the dylib table and symbols.

mod commands;
mod constants;
mod context;
pub mod events;
mod header;
pub mod structs;
mod symbol;

pub use commands::*;
pub use constants::*;
pub use context::*;
pub use events::{Event, EventSink, NullSink};
pub use header::*;
pub use symbol::*;
