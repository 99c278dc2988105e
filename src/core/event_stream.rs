//! Batched pull over one event source via the Windows Evt* API.
//!
//! An [`EventStream`] wraps an `EvtQuery` handle over either a live channel
//! snapshot or an offline `.evtx` archive and yields parsed
//! [`EventRecord`]s oldest-first via batched `EvtNext` calls. Dropping the
//! stream — including mid-iteration, as a head window does — closes the
//! query handle, any event handles still pending, and the cached publisher
//! metadata handles.

use std::collections::VecDeque;
use std::path::Path;

use windows::core::PCWSTR;
use windows::Win32::System::EventLog::{
    EvtClose, EvtFormatMessageEvent, EvtFormatMessageLevel, EvtFormatMessageTask, EvtNext,
    EvtQuery, EvtQueryChannelPath, EvtQueryFilePath, EvtQueryForwardDirection, EVT_HANDLE,
};

use crate::core::event_format::{
    extract_provider_name, render_event_xml, resolve_message, to_wide, PublisherCache,
};
use crate::core::event_record::EventRecord;
use crate::core::xml_parser::parse_event_xml;
use crate::util::constants::{EVT_BATCH_SIZE, EVT_NEXT_TIMEOUT_MS};
use crate::util::error::{windows_err, EventCatError, Result};

/// A finite, ordered stream of event records from one source.
pub struct EventStream {
    query: EVT_HANDLE,
    /// Display label reported as each record's log.
    log_name: String,
    /// Channel name or file path, for error context.
    source: String,
    pending: VecDeque<isize>,
    render_buf: Vec<u16>,
    format_buf: Vec<u16>,
    publishers: PublisherCache,
    finished: bool,
}

impl EventStream {
    /// Open a snapshot read over a live channel. Finite: reflects only
    /// records present at read time.
    ///
    /// # Errors
    /// [`EventCatError::SourceUnavailable`] if the channel does not exist or
    /// access is denied.
    pub fn open_channel(channel: &str, query: &str) -> Result<Self> {
        Self::open(channel, channel.to_string(), query, EvtQueryChannelPath.0)
    }

    /// Open an offline archive file.
    ///
    /// # Errors
    /// [`EventCatError::SourceUnavailable`] if the file cannot be opened as
    /// an event log archive.
    pub fn open_file(path: &Path, query: &str) -> Result<Self> {
        let path_str = path.display().to_string();
        let log_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path_str.clone());
        Self::open(&path_str, log_name, query, EvtQueryFilePath.0)
    }

    fn open(source_path: &str, log_name: String, query: &str, path_flag: u32) -> Result<Self> {
        let path_wide = to_wide(source_path);
        let query_wide = to_wide(query);

        tracing::debug!("Querying '{}' with XPath: {}", source_path, query);

        // SAFETY: we pass properly null-terminated UTF-16 strings. The
        // session handle is None (local machine). Forward direction keeps
        // records oldest-to-newest as stored.
        let handle = unsafe {
            EvtQuery(
                None,
                PCWSTR(path_wide.as_ptr()),
                PCWSTR(query_wide.as_ptr()),
                path_flag | EvtQueryForwardDirection.0,
            )
        }
        .map_err(|e| EventCatError::SourceUnavailable {
            source: source_path.to_string(),
            hr: e.code().0 as u32,
            context: "EvtQuery".into(),
        })?;

        Ok(Self {
            query: handle,
            log_name,
            source: source_path.to_string(),
            pending: VecDeque::new(),
            render_buf: Vec::new(),
            format_buf: Vec::new(),
            publishers: PublisherCache::default(),
            finished: false,
        })
    }

    /// Pull the next batch of event handles from the query.
    ///
    /// Returns `Ok(true)` when handles were fetched, `Ok(false)` on normal
    /// end of stream, and `Err` on an unrecoverable query failure.
    fn fetch_batch(&mut self) -> Result<bool> {
        let mut handles = vec![0isize; EVT_BATCH_SIZE];
        let mut returned = 0u32;

        // SAFETY: query handle is valid, handles array has EVT_BATCH_SIZE
        // slots, returned receives the actual count.
        let result = unsafe {
            EvtNext(
                self.query,
                &mut handles,
                EVT_NEXT_TIMEOUT_MS,
                0,
                &mut returned,
            )
        };

        match result {
            Ok(()) if returned == 0 => Ok(false),
            Ok(()) => {
                self.pending.extend(&handles[..returned as usize]);
                Ok(true)
            }
            Err(e) => {
                let code = e.code().0 as u32;
                // ERROR_NO_MORE_ITEMS — HRESULT 0x80070103 = normal end.
                // ERROR_TIMEOUT — HRESULT 0x800705B4: nothing more is coming
                // for a snapshot query, treat as end.
                // Note: windows-rs errors always surface as HRESULTs
                // (0x8007xxxx); the raw Win32 codes 259/1460 can never
                // appear here.
                if code == 0x80070103 || code == 0x800705B4 {
                    Ok(false)
                } else {
                    Err(windows_err(code, format!("EvtNext on '{}'", self.source)))
                }
            }
        }
    }

    /// Render, parse, and resolve one delivered event handle.
    fn read_record(&mut self, event_handle: isize) -> Result<EventRecord> {
        let xml = render_event_xml(event_handle, &mut self.render_buf)?;
        let mut record = parse_event_xml(&xml, &self.log_name)?;

        if let Some(provider) = extract_provider_name(&xml) {
            // Description: a failed template lookup substitutes the error's
            // message text rather than dropping the record.
            match resolve_message(
                event_handle,
                &provider,
                EvtFormatMessageEvent.0,
                &mut self.publishers,
                &mut self.format_buf,
            ) {
                Ok(message) => record.description = message,
                Err(e) => record.description = e.to_string(),
            }

            record.level_name = resolve_message(
                event_handle,
                &provider,
                EvtFormatMessageLevel.0,
                &mut self.publishers,
                &mut self.format_buf,
            )
            .ok()
            .filter(|s| !s.is_empty());

            record.task_name = resolve_message(
                event_handle,
                &provider,
                EvtFormatMessageTask.0,
                &mut self.publishers,
                &mut self.format_buf,
            )
            .ok()
            .filter(|s| !s.is_empty());
        }

        Ok(record)
    }
}

impl Iterator for EventStream {
    type Item = Result<EventRecord>;

    /// Yield the next parsed record.
    ///
    /// Records that fail to render or parse are skipped (trace-logged), per
    /// the per-record recovery policy. A failing `EvtNext` is yielded once
    /// as `Err` — fatal for this source — after which the stream ends.
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(event_handle) = self.pending.pop_front() {
                let result = self.read_record(event_handle);
                // SAFETY: we are done with this event handle.
                unsafe {
                    let _ = EvtClose(EVT_HANDLE(event_handle));
                }
                match result {
                    Ok(record) => return Some(Ok(record)),
                    Err(e) => {
                        tracing::trace!("Skipping unreadable record: {}", e);
                        continue;
                    }
                }
            }

            if self.finished {
                return None;
            }

            match self.fetch_batch() {
                Ok(true) => continue,
                Ok(false) => {
                    self.finished = true;
                    return None;
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        // Event handles still pending when iteration stops early (head
        // window) must be closed individually.
        for event_handle in self.pending.drain(..) {
            // SAFETY: handle came from EvtNext and has not been closed.
            unsafe {
                let _ = EvtClose(EVT_HANDLE(event_handle));
            }
        }
        // SAFETY: query handle is valid and hasn't been closed yet.
        unsafe {
            let _ = EvtClose(self.query);
        }
        tracing::debug!("Closed event stream for '{}'", self.source);
    }
}
