//! Dyld compressed link-edit information.
//!
//! Images linked for dyld carry their binding tables as opcode streams
//! referenced from `LC_DYLD_INFO[_ONLY]`. This module interprets the bind,
//! weak-bind and lazy-bind streams. Rebase and export information is located
//! but not decoded.

pub mod bind;

pub use bind::*;
