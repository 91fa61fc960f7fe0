//! The deterministic event log.
//!
//! Every non-deterministic decision a run makes is appended as an `Event`;
//! replay consumes the log in order and returns the recorded outcome instead
//! of re-executing the decision. Records are small, fixed-shape and
//! serde-serializable; `encode`/`decode` give the compact binary form used
//! to move logs between runs.

use serde::{Deserialize, Serialize};

/// One recorded decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    /// Monotonic from zero within a run.
    pub step: u64,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Assign,
    Branch,
    LoopIter,
    CallEnter,
    CallExit,
    SideEffect,
    Suspend,
    Exception,
    FileOp,
    Output,
}

/// Kind-specific payload. Opaque outside the interpreter, but stable enough
/// to round-trip through serialization without changing replay behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    /// Name bound at statement level, with a truncated repr of the value.
    Assign { name: String, repr: String },
    /// Which way an `if`/`while` test went.
    Branch { taken: bool },
    /// One loop iteration (0-based within the loop's run).
    LoopIter { index: u64 },
    /// Function-call boundary; `name` is the callable's best-known name.
    Call { name: String },
    /// External effect: `tag` names the effect family (e.g. `"http"`),
    /// `data` is its serialized outcome for replay.
    SideEffect { tag: String, data: String },
    /// Filesystem operation; `data` carries read content for replay.
    FileOp { op: FileOp, path: String, data: String },
    /// One chunk of print output (includes separators and terminator).
    Output { text: String },
    /// Exception raised (pre-unwind), for audit and alignment.
    Raised { kind: String, message: String },
    /// Suspension point; no data.
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileOp {
    Open,
    Read,
    Write,
    Close,
    ListDir,
}

/// Serializes a log to the compact binary transport form.
pub fn encode(events: &[Event]) -> Result<Vec<u8>, postcard::Error> {
    postcard::to_allocvec(events)
}

/// Restores a log from its binary form.
pub fn decode(bytes: &[u8]) -> Result<Vec<Event>, postcard::Error> {
    postcard::from_bytes(bytes)
}

/// Truncation applied to assign-event reprs so payloads stay compact.
pub(crate) fn clip(mut s: String) -> String {
    const MAX: usize = 120;
    if s.len() > MAX {
        let mut cut = MAX;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
        s.push_str("...");
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_round_trip_preserves_log() {
        let events = vec![
            Event {
                kind: EventKind::Branch,
                step: 0,
                payload: EventPayload::Branch { taken: true },
            },
            Event {
                kind: EventKind::Output,
                step: 1,
                payload: EventPayload::Output { text: "hi\n".into() },
            },
            Event {
                kind: EventKind::FileOp,
                step: 2,
                payload: EventPayload::FileOp {
                    op: FileOp::Read,
                    path: "data.txt".into(),
                    data: "contents".into(),
                },
            },
        ];
        let bytes = encode(&events).unwrap();
        assert_eq!(decode(&bytes).unwrap(), events);
    }

    #[test]
    fn clip_bounds_payloads() {
        assert_eq!(clip("short".into()), "short");
        let long = "x".repeat(500);
        let clipped = clip(long);
        assert_eq!(clipped.len(), 123);
        assert!(clipped.ends_with("..."));
    }
}
