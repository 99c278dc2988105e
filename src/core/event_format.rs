//! Windows Event Log rendering and message resolution.
//!
//! Low-level helpers that call `EvtRender` (XML serialisation) and
//! `EvtFormatMessage` (display-name and description lookup) via the Windows
//! Evt* API. Publisher metadata handles are cached per stream in a
//! [`PublisherCache`] so repeated events from the same provider pay for the
//! lookup once.

use std::collections::HashMap;

use windows::core::PCWSTR;
use windows::Win32::System::EventLog::{
    EvtClose, EvtFormatMessage, EvtOpenPublisherMetadata, EvtRender, EvtRenderEventXml, EVT_HANDLE,
};

use crate::util::constants::{EVT_FORMAT_BUFFER_SIZE, EVT_RENDER_BUFFER_SIZE};
use crate::util::error::{windows_err, EventCatError};

/// Convert a `&str` to a null-terminated UTF-16 vector.
pub(crate) fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Quick extraction of the `Provider Name` attribute from raw event XML.
///
/// Avoids a full XML parse just to get the provider name for publisher
/// metadata lookup. Looks for `Provider Name="..."` in the string.
pub(crate) fn extract_provider_name(xml: &str) -> Option<String> {
    let marker = "Provider Name=\"";
    let start = xml.find(marker)? + marker.len();
    let end = xml[start..].find('"')? + start;
    Some(xml[start..end].to_string())
}

/// Cached publisher metadata handles, keyed by provider name.
///
/// A cached null handle records a provider whose metadata could not be
/// opened, so the failing lookup is not repeated per event. Every handle is
/// closed when the cache is dropped.
#[derive(Default)]
pub(crate) struct PublisherCache {
    handles: HashMap<String, EVT_HANDLE>,
}

impl PublisherCache {
    /// Open (or fetch the cached) publisher metadata handle for `provider`.
    /// Returns `None` when the metadata is unavailable on this machine.
    fn open(&mut self, provider: &str) -> Option<EVT_HANDLE> {
        match self.handles.get(provider) {
            Some(&h) if h.0 != 0 => Some(h),
            Some(_) => None, // Known failure
            None => {
                let provider_wide = to_wide(provider);
                // SAFETY: provider_wide is a valid null-terminated UTF-16 string.
                let result = unsafe {
                    EvtOpenPublisherMetadata(None, PCWSTR(provider_wide.as_ptr()), None, 0, 0)
                };
                match result {
                    Ok(h) => {
                        self.handles.insert(provider.to_string(), h);
                        Some(h)
                    }
                    Err(_) => {
                        self.handles.insert(provider.to_string(), EVT_HANDLE(0));
                        None
                    }
                }
            }
        }
    }
}

impl Drop for PublisherCache {
    fn drop(&mut self) {
        for (name, handle) in self.handles.drain() {
            if handle.0 != 0 {
                // SAFETY: handle is a valid publisher metadata handle that we
                // opened with EvtOpenPublisherMetadata.
                unsafe {
                    let _ = EvtClose(handle);
                }
                tracing::trace!("Closed publisher metadata for '{}'", name);
            }
        }
    }
}

/// Render a single event handle to an XML string via `EvtRender`.
///
/// Uses a caller-provided reusable buffer to avoid per-event heap
/// allocation. The buffer grows if needed and retains its size for
/// subsequent calls.
pub(crate) fn render_event_xml(
    event_handle: isize,
    buffer: &mut Vec<u16>,
) -> Result<String, EventCatError> {
    // Ensure minimum capacity; the buffer is reused across events.
    if buffer.len() < EVT_RENDER_BUFFER_SIZE {
        buffer.resize(EVT_RENDER_BUFFER_SIZE, 0);
    }
    let mut buffer_used = 0u32;
    let mut property_count = 0u32;

    // SAFETY: event_handle is valid, buffer is properly sized.
    // EvtRenderEventXml renders the event as a null-terminated UTF-16 string.
    let result = unsafe {
        EvtRender(
            None,
            EVT_HANDLE(event_handle),
            EvtRenderEventXml.0,
            (buffer.len() * 2) as u32,
            Some(buffer.as_mut_ptr() as *mut _),
            &mut buffer_used,
            &mut property_count,
        )
    };

    if let Err(e) = result {
        let code = e.code().0 as u32;
        // ERROR_INSUFFICIENT_BUFFER — HRESULT 0x8007007A: grow buffer and retry.
        // Note: windows-rs errors always surface as HRESULTs (0x8007xxxx);
        // the raw Win32 code 122 can never appear here, only the HRESULT form.
        if code == 0x8007007A {
            let needed = (buffer_used as usize / 2) + 1;
            buffer.resize(needed, 0);
            // SAFETY: retrying with larger buffer
            unsafe {
                EvtRender(
                    None,
                    EVT_HANDLE(event_handle),
                    EvtRenderEventXml.0,
                    (buffer.len() * 2) as u32,
                    Some(buffer.as_mut_ptr() as *mut _),
                    &mut buffer_used,
                    &mut property_count,
                )
            }
            .map_err(|e| windows_err(e.code().0 as u32, "EvtRender retry"))?;
        } else {
            return Err(windows_err(code, "EvtRender"));
        }
    }

    // Convert UTF-16 to String. buffer_used is in bytes.
    let used_u16 = buffer_used as usize / 2;
    let end = if used_u16 > 0 && buffer[used_u16 - 1] == 0 {
        used_u16 - 1 // strip null terminator
    } else {
        used_u16
    };

    Ok(String::from_utf16_lossy(&buffer[..end]))
}

/// Resolve one message string for an event via `EvtFormatMessage`.
///
/// `flag` selects what is resolved: the event description
/// (`EvtFormatMessageEvent`), the level display name
/// (`EvtFormatMessageLevel`) or the task display name
/// (`EvtFormatMessageTask`). Failures are returned as errors so the caller
/// can choose the field's fallback — the error message itself, for the
/// description. Uses a caller-provided reusable buffer.
pub(crate) fn resolve_message(
    event_handle: isize,
    provider: &str,
    flag: u32,
    cache: &mut PublisherCache,
    buffer: &mut Vec<u16>,
) -> Result<String, EventCatError> {
    let pub_handle = cache.open(provider).ok_or_else(|| {
        EventCatError::WindowsApi {
            hr: 0,
            context: format!("publisher metadata unavailable for '{provider}'"),
        }
    })?;

    if buffer.len() < EVT_FORMAT_BUFFER_SIZE {
        buffer.resize(EVT_FORMAT_BUFFER_SIZE, 0);
    }
    let mut used = 0u32;

    // SAFETY: pub_handle and event_handle are valid handles.
    let result = unsafe {
        EvtFormatMessage(
            pub_handle,
            EVT_HANDLE(event_handle),
            0,
            None,
            flag,
            Some(buffer.as_mut_slice()),
            &mut used,
        )
    };

    match result {
        Ok(()) => Ok(buffer_to_string(buffer, used)),
        Err(e) => {
            let code = e.code().0 as u32;
            // ERROR_INSUFFICIENT_BUFFER — HRESULT 0x8007007A: retry with larger buffer.
            if code == 0x8007007A {
                buffer.resize(used as usize + 1, 0);
                // SAFETY: retrying with larger buffer
                unsafe {
                    EvtFormatMessage(
                        pub_handle,
                        EVT_HANDLE(event_handle),
                        0,
                        None,
                        flag,
                        Some(buffer.as_mut_slice()),
                        &mut used,
                    )
                }
                .map_err(|e| {
                    windows_err(
                        e.code().0 as u32,
                        format!("EvtFormatMessage for provider '{provider}'"),
                    )
                })?;
                Ok(buffer_to_string(buffer, used))
            } else {
                Err(windows_err(
                    code,
                    format!("EvtFormatMessage for provider '{provider}'"),
                ))
            }
        }
    }
}

/// Trim a UTF-16 buffer holding `used` units (including the null terminator)
/// into a `String`.
fn buffer_to_string(buffer: &[u16], used: u32) -> String {
    let end = if used > 0 { used as usize - 1 } else { 0 };
    String::from_utf16_lossy(&buffer[..end]).trim().to_string()
}
