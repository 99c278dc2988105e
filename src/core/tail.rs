//! Live tailing of a channel via a push subscription.
//!
//! [`tail_channel`] opens a standing `EvtSubscribe` subscription and prints
//! each newly-arrived matching record as a compact line until cancelled.
//! The subscription callback runs on a thread owned by the Event Log
//! service; it renders and formats each delivered record and hands the
//! finished line to the control loop over a `crossbeam_channel`. The control
//! loop owns the sink and the [`CancelToken`], so the only state shared with
//! the delivery path is the channel itself and the token.
//!
//! Cancellation is cooperative: `q` on stdin or Ctrl-C sets the token, the
//! control loop notices on its next poll, and the subscription guard closes
//! the handle. `EvtClose` on a subscription waits for an in-flight callback
//! to return, so no new lines can arrive once the guard is dropped.

use std::io::BufRead;
use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender};
use windows::core::PCWSTR;
use windows::Win32::System::EventLog::{
    EvtClose, EvtFormatMessageEvent, EvtFormatMessageLevel, EvtFormatMessageTask, EvtSubscribe,
    EvtSubscribeActionError, EvtSubscribeToFutureEvents, EVT_HANDLE,
    EVT_SUBSCRIBE_NOTIFY_ACTION,
};

use crate::core::event_format::{
    extract_provider_name, render_event_xml, resolve_message, to_wide, PublisherCache,
};
use crate::core::format::compact_line;
use crate::core::xml_parser::parse_event_xml;
use crate::util::cancel::CancelToken;
use crate::util::constants::TAIL_POLL_INTERVAL_MS;
use crate::util::error::{EventCatError, Result};

/// Lifecycle of one tail session. A faulted subscription is never retried;
/// a new session must re-subscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TailState {
    Subscribed,
    Cancelled,
    Faulted(u32),
}

/// Message from the delivery path to the control loop.
enum TailEvent {
    /// One formatted record line, ready for the sink.
    Line(String),
    /// The subscription reported an unrecoverable error (e.g. the channel
    /// was deleted while tailing).
    Fault(u32),
}

/// Per-subscription state handed to the callback as its user context.
///
/// Render buffers and the publisher cache sit behind a mutex: callbacks are
/// serialized by the subscription mechanism, so the lock is uncontended, but
/// it keeps the shared-state story explicit.
struct TailContext {
    log_name: String,
    sender: Sender<TailEvent>,
    render: Mutex<RenderState>,
}

#[derive(Default)]
struct RenderState {
    render_buf: Vec<u16>,
    format_buf: Vec<u16>,
    publishers: PublisherCache,
}

/// Owns the subscription handle and the leaked callback context.
///
/// Dropping the guard closes the subscription — `EvtClose` waits for an
/// in-flight callback to return — and then reclaims the context. This is
/// the single release point for every exit path (cancel, fault, sink error).
struct SubscriptionGuard {
    handle: EVT_HANDLE,
    context: *mut TailContext,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        // SAFETY: the subscription handle is valid; after EvtClose returns
        // no callback can be running, so the context pointer is uniquely
        // owned again and can be reboxed.
        unsafe {
            let _ = EvtClose(self.handle);
            drop(Box::from_raw(self.context));
        }
    }
}

/// Tail a live channel until cancelled.
///
/// Head/tail windows and dump mode do not apply in follow mode: every
/// matching record is emitted as a compact line the moment it arrives.
///
/// # Errors
/// [`EventCatError::SourceUnavailable`] if the subscription cannot be
/// opened; [`EventCatError::Subscription`] if it faults while tailing;
/// I/O errors from the sink abort the session.
pub fn tail_channel(
    channel: &str,
    query: &str,
    cancel: &CancelToken,
    sink: &mut dyn Write,
) -> Result<()> {
    let (sender, receiver) = crossbeam_channel::unbounded();

    let context = Box::into_raw(Box::new(TailContext {
        log_name: channel.to_string(),
        sender,
        render: Mutex::new(RenderState::default()),
    }));

    let channel_wide = to_wide(channel);
    let query_wide = to_wide(query);

    // SAFETY: the strings are valid null-terminated UTF-16; the context
    // pointer stays alive until the guard reclaims it after EvtClose.
    let subscription = unsafe {
        EvtSubscribe(
            None,
            None,
            PCWSTR(channel_wide.as_ptr()),
            PCWSTR(query_wide.as_ptr()),
            None,
            Some(context as *const std::ffi::c_void),
            Some(subscription_callback),
            EvtSubscribeToFutureEvents.0 as u32,
        )
    };

    let _guard = match subscription {
        Ok(handle) => SubscriptionGuard { handle, context },
        Err(e) => {
            // SAFETY: the subscription never existed, so the context is
            // still uniquely owned here.
            drop(unsafe { Box::from_raw(context) });
            return Err(EventCatError::SourceUnavailable {
                source: channel.to_string(),
                hr: e.code().0 as u32,
                context: "EvtSubscribe".into(),
            });
        }
    };

    tracing::info!("Tailing '{}'; enter q to quit", channel);
    spawn_quit_listener(cancel.clone());
    install_shutdown_handler(cancel.clone());

    let state = pump(&receiver, cancel, sink)?;
    match state {
        TailState::Faulted(hr) => Err(EventCatError::Subscription {
            channel: channel.to_string(),
            hr,
        }),
        _ => Ok(()),
    }
}

/// Control loop: multiplex delivered lines with cancellation polling.
fn pump(
    receiver: &crossbeam_channel::Receiver<TailEvent>,
    cancel: &CancelToken,
    sink: &mut dyn Write,
) -> Result<TailState> {
    let mut state = TailState::Subscribed;

    while state == TailState::Subscribed {
        if cancel.is_cancelled() {
            state = TailState::Cancelled;
            break;
        }

        match receiver.recv_timeout(Duration::from_millis(TAIL_POLL_INTERVAL_MS)) {
            Ok(TailEvent::Line(line)) => {
                // No batching: each record reaches the sink as it occurs.
                writeln!(sink, "{line}")?;
                sink.flush()?;
            }
            Ok(TailEvent::Fault(hr)) => state = TailState::Faulted(hr),
            Err(RecvTimeoutError::Timeout) => continue,
            // The sender lives in the subscription context, which outlives
            // this loop; disconnection can only mean teardown.
            Err(RecvTimeoutError::Disconnected) => state = TailState::Cancelled,
        }
    }

    tracing::info!("Tail session ended: {:?}", state);
    Ok(state)
}

/// Callback invoked by the Event Log service once per delivered record.
///
/// The service owns the event handle for the duration of the call and
/// releases it when the callback returns. Per-record failures are dropped
/// here (trace-logged); only subscription-level errors fault the session.
unsafe extern "system" fn subscription_callback(
    action: EVT_SUBSCRIBE_NOTIFY_ACTION,
    user_context: *const std::ffi::c_void,
    event: EVT_HANDLE,
) -> u32 {
    let ctx = &*(user_context as *const TailContext);

    if action == EvtSubscribeActionError {
        // On the error action the event parameter carries the error code.
        let _ = ctx.sender.send(TailEvent::Fault(event.0 as u32));
        return 0;
    }

    if let Some(line) = format_delivered_event(ctx, event.0) {
        let _ = ctx.sender.send(TailEvent::Line(line));
    }
    0
}

/// Render one delivered event into its compact line.
///
/// Returns `None` when the record cannot be rendered or parsed; metadata
/// lookups fall back per-field, matching the batch path.
fn format_delivered_event(ctx: &TailContext, event_handle: isize) -> Option<String> {
    let mut guard = ctx.render.lock().ok()?;
    let state = &mut *guard;

    let xml = match render_event_xml(event_handle, &mut state.render_buf) {
        Ok(xml) => xml,
        Err(e) => {
            tracing::trace!("Failed to render tailed event: {}", e);
            return None;
        }
    };

    let mut record = match parse_event_xml(&xml, &ctx.log_name) {
        Ok(record) => record,
        Err(e) => {
            tracing::trace!("Failed to parse tailed event: {}", e);
            return None;
        }
    };

    if let Some(provider) = extract_provider_name(&xml) {
        match resolve_message(
            event_handle,
            &provider,
            EvtFormatMessageEvent.0,
            &mut state.publishers,
            &mut state.format_buf,
        ) {
            Ok(message) => record.description = message,
            Err(e) => record.description = e.to_string(),
        }

        record.level_name = resolve_message(
            event_handle,
            &provider,
            EvtFormatMessageLevel.0,
            &mut state.publishers,
            &mut state.format_buf,
        )
        .ok()
        .filter(|s| !s.is_empty());

        record.task_name = resolve_message(
            event_handle,
            &provider,
            EvtFormatMessageTask.0,
            &mut state.publishers,
            &mut state.format_buf,
        )
        .ok()
        .filter(|s| !s.is_empty());
    }

    Some(compact_line(&record))
}

/// Watch stdin for the interactive quit command.
///
/// `q` (any casing) or end-of-input sets the token. The thread blocks on
/// stdin and is not joined; it dies with the process.
fn spawn_quit_listener(cancel: CancelToken) {
    std::thread::Builder::new()
        .name("tail-quit".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(text) if text.trim().eq_ignore_ascii_case("q") => break,
                    Ok(_) => continue,
                    Err(_) => break,
                }
            }
            cancel.cancel();
        })
        .expect("Failed to spawn tail-quit thread");
}

/// Route process-shutdown notifications (Ctrl-C) into the same token.
fn install_shutdown_handler(cancel: CancelToken) {
    if let Err(e) = ctrlc::set_handler(move || cancel.cancel()) {
        // Only one handler can be installed per process; the CLI runs at
        // most one tail session, so a failure here is log-worthy only.
        tracing::debug!("Ctrl-C handler not installed: {}", e);
    }
}
