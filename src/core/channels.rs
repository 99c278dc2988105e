//! Channel enumeration via the Windows Evt* API.
//!
//! Discovers the event log channels configured on the system using
//! `EvtOpenChannelEnum` and `EvtNextChannelPath`, and reads each channel's
//! record count for the `list` and `readAll` commands.

use windows::core::PCWSTR;
use windows::Win32::System::EventLog::{
    EvtClose, EvtGetLogInfo, EvtLogNumberOfLogRecords, EvtNextChannelPath, EvtOpenChannelEnum,
    EvtOpenChannelPath, EvtOpenLog, EVT_VARIANT,
};

use crate::core::event_format::to_wide;
use crate::util::error::{EventCatError, Result};

/// One configured channel and how many records it currently holds.
#[derive(Debug, Clone)]
pub struct ChannelInfo {
    pub name: String,
    /// Number of records in the channel, or `-1` when the channel exists
    /// but cannot be opened (typically access denied).
    pub record_count: i64,
}

/// Enumerate all configured channels with their record counts.
///
/// Channels whose count cannot be read are still listed with a count of
/// `-1`; access errors surface later if the user tries to read them.
///
/// # Errors
/// Returns [`EventCatError::ChannelEnum`] if the enumeration handle cannot
/// be opened.
pub fn list_channels() -> Result<Vec<ChannelInfo>> {
    let channels = enumerate_channels()?;
    Ok(channels
        .into_iter()
        .map(|name| {
            let record_count = match channel_record_count(&name) {
                Ok(count) => count as i64,
                Err(e) => {
                    tracing::debug!("Cannot read record count for '{}': {}", name, e);
                    -1
                }
            };
            ChannelInfo { name, record_count }
        })
        .collect())
}

/// Enumerate all available event log channels on the local system.
///
/// Returns a sorted list of channel path strings.
pub fn enumerate_channels() -> Result<Vec<String>> {
    let mut channels = Vec::with_capacity(256);

    // SAFETY: EvtOpenChannelEnum with a null session handle opens a local
    // enumeration. The returned handle is valid until closed with EvtClose.
    let handle = unsafe { EvtOpenChannelEnum(None, 0) }
        .map_err(|e| EventCatError::ChannelEnum(format!("EvtOpenChannelEnum failed: {e}")))?;

    // Buffer for channel path strings (most are under 256 chars)
    let mut buffer = vec![0u16; 512];
    let mut used = 0u32;

    loop {
        // SAFETY: We pass a valid handle and a properly sized buffer.
        // EvtNextChannelPath writes the channel name as a null-terminated
        // UTF-16 string into the buffer.
        let result = unsafe { EvtNextChannelPath(handle, Some(buffer.as_mut_slice()), &mut used) };

        match result {
            Ok(()) => {
                // Convert UTF-16 to String. `used` includes the null terminator.
                let len = if used > 0 { used as usize - 1 } else { 0 };
                let name = String::from_utf16_lossy(&buffer[..len]);
                if !name.is_empty() {
                    channels.push(name);
                }
            }
            Err(e) => {
                let code = e.code().0 as u32;
                // ERROR_NO_MORE_ITEMS — HRESULT 0x80070103 = normal end of enumeration.
                if code == 0x80070103 {
                    break;
                }
                // ERROR_INSUFFICIENT_BUFFER — HRESULT 0x8007007A: grow buffer and retry.
                if code == 0x8007007A {
                    buffer.resize(used as usize + 64, 0);
                    continue;
                }
                // Any other error — log and break
                tracing::warn!("EvtNextChannelPath returned unexpected error: {e}");
                break;
            }
        }
    }

    // SAFETY: handle is valid and hasn't been closed yet.
    unsafe {
        let _ = EvtClose(handle);
    }

    // Sort alphabetically for presentation
    channels.sort_unstable_by_key(|a| a.to_lowercase());

    tracing::debug!("Enumerated {} event log channels", channels.len());
    Ok(channels)
}

/// Read the number of records currently stored in a channel.
fn channel_record_count(channel: &str) -> Result<u64> {
    let channel_wide = to_wide(channel);

    // SAFETY: channel_wide is a valid null-terminated UTF-16 string.
    let log = unsafe {
        EvtOpenLog(
            None,
            PCWSTR(channel_wide.as_ptr()),
            EvtOpenChannelPath.0 as u32,
        )
    }
    .map_err(|e| EventCatError::ChannelEnum(format!("EvtOpenLog on '{channel}': {e}")))?;

    let mut variant = EVT_VARIANT::default();
    let mut used = 0u32;

    // SAFETY: log handle is valid; the variant buffer is exactly the size
    // EvtGetLogInfo expects for a scalar property.
    let result = unsafe {
        EvtGetLogInfo(
            log,
            EvtLogNumberOfLogRecords,
            std::mem::size_of::<EVT_VARIANT>() as u32,
            Some(&mut variant as *mut EVT_VARIANT),
            &mut used,
        )
    };

    // SAFETY: log handle is valid and hasn't been closed yet.
    unsafe {
        let _ = EvtClose(log);
    }

    result
        .map_err(|e| EventCatError::ChannelEnum(format!("EvtGetLogInfo on '{channel}': {e}")))?;

    // SAFETY: EvtLogNumberOfLogRecords is documented to yield a UInt64 variant.
    Ok(unsafe { variant.Anonymous.UInt64Val })
}
