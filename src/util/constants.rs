//! Application-wide constants for eventcat.
//!
//! Centralising magic numbers and configuration defaults here keeps the rest
//! of the codebase clean and makes tuning straightforward.

/// Number of event handles to request per `EvtNext` call.
/// Larger batches reduce API call overhead; 200 is a good balance between
/// memory and throughput.
pub const EVT_BATCH_SIZE: usize = 200;

/// Timeout in milliseconds passed to `EvtNext`. Using `INFINITE` (u32::MAX)
/// would block the pull loop; a finite timeout lets a stalled query finish.
pub const EVT_NEXT_TIMEOUT_MS: u32 = 1000;

/// Buffer size (in `u16` units) for `EvtRender` output.
/// 8 KB (16 KB raw) is enough for the vast majority of events; the buffer
/// grows on demand for larger events and the allocation is reused across
/// all events in a stream.
pub const EVT_RENDER_BUFFER_SIZE: usize = 8_192;

/// Buffer size (in `u16` units) for `EvtFormatMessage` output.
/// 2 KB (4 KB raw) covers most formatted message strings; the buffer
/// grows on demand and is reused across events.
pub const EVT_FORMAT_BUFFER_SIZE: usize = 2_048;

/// Substituted for the task name when the publisher metadata lookup fails.
pub const TASK_NAME_FALLBACK: &str = "---";

/// File extension of offline archive files picked up from a directory source.
pub const OFFLINE_LOG_EXTENSION: &str = "evtx";

/// File extension given to exported output files.
pub const OUTPUT_EXTENSION: &str = "txt";

/// How long the live-tail control loop waits on the record channel before
/// re-checking the cancellation token (milliseconds).
pub const TAIL_POLL_INTERVAL_MS: u64 = 200;

/// Application display name used in the usage text.
pub const APP_NAME: &str = "eventcat";

/// Application version string.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
