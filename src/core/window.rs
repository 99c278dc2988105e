//! Head/tail windowing over the formatted line stream.
//!
//! A [`WindowAccumulator`] sits between the formatter and the output sink.
//! With no window it passes lines straight through; head-N emits the first N
//! and tells the caller to stop pulling the source; tail-N retains the last
//! N lines in a fixed-capacity ring and flushes them, oldest first, when the
//! source is exhausted.

use std::collections::VecDeque;

/// Which windowing policy applies to a batch read.
///
/// Counts are >= 1 by construction; option validation rejects anything else
/// before a source is opened. Follow mode never constructs an accumulator —
/// live tailing bypasses windowing entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowMode {
    /// Emit every line as produced.
    All,
    /// Emit the first N lines, then stop reading the source.
    Head(usize),
    /// Retain the last N lines and flush them on exhaustion.
    Tail(usize),
}

/// Stateful accumulator applying one [`WindowMode`] to a line stream.
#[derive(Debug)]
pub struct WindowAccumulator {
    mode: WindowMode,
    emitted: usize,
    ring: VecDeque<String>,
}

impl WindowAccumulator {
    pub fn new(mode: WindowMode) -> Self {
        let ring = match mode {
            WindowMode::Tail(n) => VecDeque::with_capacity(n),
            _ => VecDeque::new(),
        };
        Self {
            mode,
            emitted: 0,
            ring,
        }
    }

    /// Feed one formatted line through the window.
    ///
    /// Returns `Some(line)` when the line should be written to the sink
    /// immediately, `None` when it was buffered (tail) or dropped (head
    /// quota already reached).
    pub fn offer(&mut self, line: String) -> Option<String> {
        match self.mode {
            WindowMode::All => Some(line),
            WindowMode::Head(n) => {
                if self.emitted < n {
                    self.emitted += 1;
                    Some(line)
                } else {
                    None
                }
            }
            WindowMode::Tail(n) => {
                if self.ring.len() == n {
                    self.ring.pop_front();
                }
                self.ring.push_back(line);
                None
            }
        }
    }

    /// `true` once a head window has emitted its full quota. The caller
    /// stops iterating the source at this point; no further records are
    /// read, formatted, or emitted.
    pub fn is_complete(&self) -> bool {
        matches!(self.mode, WindowMode::Head(n) if self.emitted >= n)
    }

    /// Consume the accumulator and return the lines still owed to the sink:
    /// the ring contents in original (oldest-first) order for a tail window,
    /// nothing otherwise.
    pub fn into_remainder(self) -> VecDeque<String> {
        match self.mode {
            WindowMode::Tail(_) => self.ring,
            _ => VecDeque::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("L{i}")).collect()
    }

    fn run(mode: WindowMode, input: Vec<String>) -> Vec<String> {
        let mut acc = WindowAccumulator::new(mode);
        let mut out = Vec::new();
        for line in input {
            if let Some(emit) = acc.offer(line) {
                out.push(emit);
            }
            if acc.is_complete() {
                break;
            }
        }
        out.extend(acc.into_remainder());
        out
    }

    #[test]
    fn test_no_window_streams_everything() {
        assert_eq!(run(WindowMode::All, lines(3)), lines(3));
    }

    #[test]
    fn test_tail_keeps_last_n_in_order() {
        assert_eq!(run(WindowMode::Tail(2), lines(5)), vec!["L4", "L5"]);
    }

    #[test]
    fn test_tail_shorter_stream_yields_all() {
        assert_eq!(run(WindowMode::Tail(10), lines(3)), lines(3));
    }

    #[test]
    fn test_head_emits_first_n() {
        assert_eq!(run(WindowMode::Head(2), lines(5)), vec!["L1", "L2"]);
    }

    #[test]
    fn test_head_longer_than_stream() {
        assert_eq!(run(WindowMode::Head(10), lines(3)), lines(3));
    }

    #[test]
    fn test_head_signals_completion_at_quota() {
        let mut acc = WindowAccumulator::new(WindowMode::Head(1));
        assert!(!acc.is_complete());
        assert!(acc.offer("L1".into()).is_some());
        assert!(acc.is_complete());
        assert!(acc.offer("L2".into()).is_none());
    }

    #[test]
    fn test_tail_ring_is_bounded() {
        let mut acc = WindowAccumulator::new(WindowMode::Tail(3));
        for line in lines(1000) {
            assert!(acc.offer(line).is_none());
        }
        let remainder = acc.into_remainder();
        assert_eq!(remainder.len(), 3);
        assert_eq!(remainder, vec!["L998", "L999", "L1000"]);
    }
}
