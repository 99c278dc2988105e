//! Core domain modules for eventcat.
//!
//! Contains the event data model, filter/predicate construction, XML
//! parsing, windowing, and — on Windows — the Evt* API plumbing for batch
//! reads, channel enumeration, and live tailing.

#[cfg(windows)]
pub mod channels;
#[cfg(windows)]
pub(crate) mod event_format;
pub mod event_record;
#[cfg(windows)]
pub mod event_stream;
pub mod filter;
pub mod format;
pub mod source;
#[cfg(windows)]
pub mod tail;
pub mod window;
pub mod xml_parser;
