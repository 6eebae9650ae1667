//! Progress events published while an image is built.
//!
//! The decoded model does not depend on anyone listening. Hosts that want to
//! observe the build as it happens (to tag content, feed analyzers, or show
//! progress) pass an [`EventSink`] to
//! [`MachOContext::parse_with_sink`](super::MachOContext::parse_with_sink).

use super::commands::LoadCommand;
use super::context::{Section, Segment};
use super::symbol::Symbol;

/// A build event. Payloads borrow from the image under construction.
#[derive(Debug, Clone, Copy)]
pub enum Event<'a> {
    /// A load command was decoded
    CommandDecoded(&'a LoadCommand),
    /// A segment and its file contents were materialized
    SegmentMaterialized(&'a Segment),
    /// A section was assigned its global index
    SectionMaterialized(&'a Section),
    /// A non-stab symbol was resolved and exposed
    SymbolMaterialized(&'a Symbol),
    /// An address resolved through the indirect symbol table
    IndirectSymbolResolved {
        /// Queried address
        address: u32,
        /// Symbol the address refers to
        symbol: &'a Symbol,
    },
}

impl Event<'_> {
    /// Stable event name, for hosts that dispatch on strings.
    pub fn name(&self) -> &'static str {
        match self {
            Event::CommandDecoded(_) => "macho_command_decoded",
            Event::SegmentMaterialized(_) => "segment_materialized",
            Event::SectionMaterialized(_) => "section_materialized",
            Event::SymbolMaterialized(_) => "symbol_materialized",
            Event::IndirectSymbolResolved { .. } => "macho_indirect_symbol_resolved",
        }
    }
}

/// Receiver for build events.
pub trait EventSink {
    /// Handles one event.
    fn publish(&mut self, event: Event<'_>);
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    #[inline]
    fn publish(&mut self, _event: Event<'_>) {}
}

impl<F> EventSink for F
where
    F: FnMut(Event<'_>),
{
    #[inline]
    fn publish(&mut self, event: Event<'_>) {
        self(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macho::symbol::{Desc, NType};

    #[test]
    fn test_closure_sink_receives_events() {
        let symbol = Symbol {
            name: "_main".into(),
            n_type: NType(0x0F),
            n_sect: 1,
            desc: Desc(0),
            value: 0x1000,
            section: Some(1),
            library: None,
        };

        let mut names = Vec::new();
        {
            let mut sink = |event: Event<'_>| names.push(event.name());
            sink.publish(Event::SymbolMaterialized(&symbol));
            sink.publish(Event::IndirectSymbolResolved {
                address: 0x2000,
                symbol: &symbol,
            });
            NullSink.publish(Event::SymbolMaterialized(&symbol));
        }
        assert_eq!(
            names,
            ["symbol_materialized", "macho_indirect_symbol_resolved"]
        );
    }
}
