//! Unified error types for eventcat.
//!
//! All fallible operations throughout the codebase return `Result<T, EventCatError>`.
//! This ensures consistent error reporting and clean propagation via the `?` operator.

/// Unified error type used throughout eventcat.
///
/// Each variant captures enough context to produce an actionable message for
/// the user or for log output.
#[derive(Debug, thiserror::Error)]
pub enum EventCatError {
    /// Bad or contradictory command-line options. Detected before any source
    /// is opened; the caller prints the usage text and exits non-zero.
    #[error("{0}")]
    Config(String),

    /// A filter option could not be parsed (malformed date, bad level token).
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// A named channel or archive file could not be opened — missing,
    /// deleted, or access denied. Fatal for that source only.
    #[error("source '{source}' unavailable: {context} (HRESULT: 0x{hr:08X})")]
    SourceUnavailable {
        /// Channel name or file path of the source that failed to open.
        source: String,
        /// The raw HRESULT error code from the Windows API.
        hr: u32,
        /// Which operation triggered the failure.
        context: String,
    },

    /// A Windows API call failed mid-stream. `hr` is the raw HRESULT code
    /// and `context` describes which operation triggered the failure.
    #[error("Windows API error: {context} (HRESULT: 0x{hr:08X})")]
    WindowsApi {
        /// The raw HRESULT error code from the Windows API.
        hr: u32,
        /// Human-readable description of the operation that failed.
        context: String,
    },

    /// The live-tail subscription faulted (e.g. the channel was deleted
    /// while tailing). Terminates the tail session; no retry.
    #[error("subscription fault on '{channel}' (HRESULT: 0x{hr:08X})")]
    Subscription {
        /// The channel being tailed when the fault occurred.
        channel: String,
        /// The error code delivered by the subscription callback.
        hr: u32,
    },

    /// XML returned by `EvtRender` could not be parsed.
    #[error("XML parse error: {0}")]
    XmlParse(String),

    /// Channel enumeration via `EvtOpenChannelEnum` / `EvtNextChannelPath` failed.
    #[error("channel enumeration failed: {0}")]
    ChannelEnum(String),

    /// Catch-all for I/O errors. Sink write failures abort the run.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EventCatError>;

/// Convert a raw Windows `HRESULT` into an [`EventCatError::WindowsApi`]
/// with the given context string.
pub fn windows_err(hr: u32, context: impl Into<String>) -> EventCatError {
    EventCatError::WindowsApi {
        hr,
        context: context.into(),
    }
}
