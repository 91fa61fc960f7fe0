//! The execution context.
//!
//! Everything a run may observe or affect outside pure computation lives
//! here: the event log and replay cursor, the compute-time clock, the
//! capability set, the network policy, environment variables, the
//! filesystem and its handle table, the iterator table, and the call-depth
//! guard. The context is threaded through the evaluator and returned to the
//! host when the run ends.

use std::{
    collections::VecDeque,
    fmt,
    rc::Rc,
    time::{Duration, Instant},
};

use ahash::AHashMap;
use indexmap::IndexMap;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use uuid::Uuid;

use crate::{
    event::{clip, Event, EventKind, EventPayload, FileOp},
    exception::{ExcType, Exception},
    fsys::{FileSystem, MemFs, WriteMode},
    net::{HttpClient, HttpRequest, HttpResponse, NetworkPolicy},
    value::Value,
};

/// Default ceiling for guest call depth.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 500;

/// Recording mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Append every decision to the log.
    Live,
    /// Consume the log in order; switches to `Live` when exhausted.
    Replay,
    /// Recording disabled for performance; output still captured.
    NoRecord,
}

/// A module supplied by the host: either a ready value or a provider that
/// builds one on demand.
pub enum HostModule {
    Value(Value),
    Provider(Rc<dyn ModuleProvider>),
}

/// The module protocol for host-injected modules.
pub trait ModuleProvider {
    /// Produces the module's name → value mapping.
    fn module_value(&self) -> Value;
}

/// Options accepted by [`Ctx::new`].
pub struct CtxOptions {
    pub filesystem: Option<Box<dyn FileSystem>>,
    pub environ: IndexMap<String, String>,
    pub modules: IndexMap<String, HostModule>,
    /// Compute budget in milliseconds; `None` means unlimited.
    pub timeout_ms: Option<u64>,
    pub network: Option<NetworkPolicy>,
    pub capabilities: Vec<String>,
    pub http_client: Option<Box<dyn HttpClient>>,
    pub max_call_depth: usize,
    /// Seed for the guest-visible RNG; runs are deterministic per seed.
    pub rng_seed: u64,
    /// `false` disables event recording (`Mode::NoRecord`).
    pub record: bool,
    /// Count statement executions per source line.
    pub profile: bool,
}

impl Default for CtxOptions {
    fn default() -> Self {
        Self {
            filesystem: None,
            environ: IndexMap::new(),
            modules: IndexMap::new(),
            timeout_ms: None,
            network: None,
            capabilities: Vec::new(),
            http_client: None,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            rng_seed: 0,
            record: true,
            profile: false,
        }
    }
}

/// Compute-time clock: a monotonic accumulator that only runs between
/// `resume` and `pause`, so I/O never accrues compute time.
#[derive(Debug)]
struct ComputeClock {
    accumulated: Duration,
    started_at: Option<Instant>,
    budget: Option<Duration>,
}

impl ComputeClock {
    fn resume(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
    }

    fn pause(&mut self) {
        if let Some(started) = self.started_at.take() {
            self.accumulated += started.elapsed();
        }
    }

    fn elapsed(&self) -> Duration {
        self.accumulated + self.started_at.map_or(Duration::ZERO, |s| s.elapsed())
    }

    /// Milliseconds past the budget, if exceeded.
    fn exceeded(&self) -> Option<u128> {
        let budget = self.budget?;
        let elapsed = self.elapsed();
        (elapsed >= budget).then(|| (elapsed - budget).as_millis())
    }
}

/// State of one open file handle. Reads buffer the backend content at open;
/// writes accumulate and flush to the backend on close.
#[derive(Debug)]
struct FileHandle {
    path: String,
    mode: FileMode,
    buffer: String,
    read_pos: usize,
    closed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FileMode {
    Read,
    Write,
    Append,
}

/// One entry in the iterator table: either residual values (optionally ending
/// in the error a generator's production run raised), or an instance whose
/// `__next__` the evaluator drives.
pub(crate) enum IterState {
    Values {
        items: VecDeque<Value>,
        tail_error: Option<Exception>,
    },
    Instance(Value),
}

/// What advancing an iterator handle produced.
pub(crate) enum IterNext {
    Value(Value),
    Done,
    /// The handle is instance-driven; the evaluator must call `__next__` on
    /// this instance.
    Instance(Value),
}

/// The execution context. See the module docs.
pub struct Ctx {
    pub(crate) mode: Mode,
    events: Vec<Event>,
    cursor: usize,
    stdout: String,
    clock: ComputeClock,
    pub(crate) capabilities: Vec<String>,
    pub(crate) network: Option<NetworkPolicy>,
    pub(crate) environ: IndexMap<String, String>,
    fs: Box<dyn FileSystem>,
    http: Option<Box<dyn HttpClient>>,
    files: AHashMap<u32, FileHandle>,
    next_file: u32,
    iters: AHashMap<u32, IterState>,
    next_iter: u32,
    pub(crate) host_modules: IndexMap<String, HostModule>,
    pub(crate) imported_modules: AHashMap<String, Value>,
    pub(crate) call_depth: usize,
    pub(crate) max_call_depth: usize,
    pub(crate) rng: ChaCha20Rng,
    rng_seed: u64,
    profile: bool,
    line_counts: AHashMap<u32, u64>,
    /// Correlates logs and host telemetry; not replayed.
    pub run_id: Uuid,
}

impl fmt::Debug for Ctx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ctx")
            .field("mode", &self.mode)
            .field("events", &self.events.len())
            .field("cursor", &self.cursor)
            .field("call_depth", &self.call_depth)
            .finish_non_exhaustive()
    }
}

impl Default for Ctx {
    fn default() -> Self {
        Self::new(CtxOptions::default())
    }
}

impl Ctx {
    #[must_use]
    pub fn new(options: CtxOptions) -> Self {
        Self {
            mode: if options.record { Mode::Live } else { Mode::NoRecord },
            events: Vec::new(),
            cursor: 0,
            stdout: String::new(),
            clock: ComputeClock {
                accumulated: Duration::ZERO,
                started_at: None,
                budget: options.timeout_ms.map(Duration::from_millis),
            },
            capabilities: options.capabilities,
            network: options.network,
            environ: options.environ,
            fs: options.filesystem.unwrap_or_else(|| Box::new(MemFs::new())),
            http: options.http_client,
            files: AHashMap::new(),
            next_file: 1,
            iters: AHashMap::new(),
            next_iter: 1,
            host_modules: options.modules,
            imported_modules: AHashMap::new(),
            call_depth: 0,
            max_call_depth: options.max_call_depth,
            rng: ChaCha20Rng::seed_from_u64(options.rng_seed),
            rng_seed: options.rng_seed,
            profile: options.profile,
            line_counts: AHashMap::new(),
            run_id: Uuid::new_v4(),
        }
    }

    /// Builds a context from options plus a previously recorded log; the
    /// first run against it replays the log. The output buffer is rebuilt
    /// from the log's output events.
    #[must_use]
    pub fn with_events(options: CtxOptions, events: Vec<Event>) -> Self {
        let mut ctx = Self::new(options);
        ctx.stdout = events
            .iter()
            .filter_map(|e| match &e.payload {
                EventPayload::Output { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        ctx.events = events;
        ctx.mode = Mode::Replay;
        ctx
    }

    // --- replay primitives -------------------------------------------------

    /// Prepares this context to be re-entered after a suspension: the log is
    /// replayed from the start and execution continues live past its end.
    #[must_use]
    pub fn for_resume(mut self) -> Self {
        self.cursor = 0;
        self.mode = Mode::Replay;
        self.reset_run_state();
        self
    }

    /// Keeps only the first `n` events and prepares for replay — a way to
    /// re-enter a run at an earlier decision point.
    #[must_use]
    pub fn branch_at(mut self, n: usize) -> Self {
        self.events.truncate(n);
        self.stdout = self
            .events
            .iter()
            .filter_map(|e| match &e.payload {
                EventPayload::Output { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        self.cursor = 0;
        self.mode = Mode::Replay;
        self.reset_run_state();
        self
    }

    /// Clears per-run tables so a replayed run re-allocates handles in the
    /// same order and re-executes module bodies against the log.
    fn reset_run_state(&mut self) {
        self.files.clear();
        self.next_file = 1;
        self.iters.clear();
        self.next_iter = 1;
        self.imported_modules.clear();
        self.call_depth = 0;
        self.rng = ChaCha20Rng::seed_from_u64(self.rng_seed);
    }

    // --- event log ---------------------------------------------------------

    /// Records a decision, or consumes the matching recorded one in replay.
    ///
    /// Returns `Some(recorded_payload)` when replaying (the caller must use
    /// the recorded outcome instead of its own), `None` when the event was
    /// appended live or recording is off. A kind mismatch during replay
    /// means the program diverged from the log; the remainder of the log is
    /// abandoned and execution continues live.
    pub(crate) fn record(&mut self, kind: EventKind, payload: EventPayload) -> Option<EventPayload> {
        match self.mode {
            Mode::NoRecord => None,
            Mode::Live => {
                self.push_event(kind, payload);
                None
            }
            Mode::Replay => {
                if self.cursor < self.events.len() && self.events[self.cursor].kind == kind {
                    let recorded = self.events[self.cursor].payload.clone();
                    self.cursor += 1;
                    if self.cursor == self.events.len() {
                        self.mode = Mode::Live;
                    }
                    return Some(recorded);
                }
                // exhausted, or diverged from the recording
                self.events.truncate(self.cursor);
                self.mode = Mode::Live;
                self.push_event(kind, payload);
                None
            }
        }
    }

    fn push_event(&mut self, kind: EventKind, payload: EventPayload) {
        let step = self.events.len() as u64;
        self.events.push(Event { kind, step, payload });
    }

    /// True while recorded events remain to be consumed.
    pub(crate) fn is_replaying(&self) -> bool {
        self.mode == Mode::Replay && self.cursor < self.events.len()
    }

    /// Fills in the data of the side-effect event just recorded live (the
    /// record-then-amend pattern: the event is appended before the effect
    /// runs, then completed with its outcome).
    pub(crate) fn amend_last_side_effect(&mut self, outcome: &str) {
        if self.mode == Mode::Live {
            if let Some(Event {
                payload: EventPayload::SideEffect { data, .. },
                ..
            }) = self.events.last_mut()
            {
                outcome.clone_into(data);
            }
        }
    }

    /// Emits one chunk of print output through the log and output buffer.
    pub(crate) fn emit_output(&mut self, text: &str) {
        let replayed = self
            .record(
                EventKind::Output,
                EventPayload::Output { text: text.to_string() },
            )
            .is_some();
        // on replay the buffer already holds this text
        if !replayed {
            self.stdout.push_str(text);
        }
    }

    /// The recorded event log.
    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// All print output produced so far.
    #[must_use]
    pub fn output(&self) -> &str {
        &self.stdout
    }

    /// Binary form of the log (postcard).
    pub fn dump_events(&self) -> Result<Vec<u8>, postcard::Error> {
        crate::event::encode(&self.events)
    }

    /// Restores a log produced by [`Ctx::dump_events`] into a fresh context.
    pub fn load_events(options: CtxOptions, bytes: &[u8]) -> Result<Self, postcard::Error> {
        Ok(Self::with_events(options, crate::event::decode(bytes)?))
    }

    // --- clock -------------------------------------------------------------

    pub(crate) fn resume_compute(&mut self) {
        self.clock.resume();
    }

    pub(crate) fn pause_compute(&mut self) {
        self.clock.pause();
    }

    /// Raises a catchable `TimeoutError` when the budget is spent. Called by
    /// the evaluator at loop iterations and function entries.
    pub(crate) fn check_deadline(&self) -> Result<(), Exception> {
        match self.clock.exceeded() {
            Some(over_ms) => Err(Exception::new(
                ExcType::TimeoutError,
                format!("compute budget exceeded by {over_ms}ms"),
            )),
            None => Ok(()),
        }
    }

    /// Guest compute time so far (I/O excluded).
    #[must_use]
    pub fn compute_time(&self) -> Duration {
        self.clock.elapsed()
    }

    // --- capabilities & network -------------------------------------------

    pub(crate) fn has_capability(&self, tag: &str) -> bool {
        self.capabilities.iter().any(|c| c == tag)
    }

    /// Performs an HTTP request under the network policy, recording the
    /// outcome for replay. The compute clock is paused around the transport.
    pub(crate) fn http_request(&mut self, request: &HttpRequest) -> Result<HttpResponse, Exception> {
        let Some(policy) = &self.network else {
            return Err(Exception::network_error(
                "network access is disabled in this context",
            ));
        };
        policy
            .admits(&request.method, &request.url)
            .map_err(Exception::network_error)?;

        if let Some(EventPayload::SideEffect { data, .. }) = self.record(
            EventKind::SideEffect,
            EventPayload::SideEffect { tag: "http".into(), data: String::new() },
        ) {
            let outcome: crate::net::HttpOutcome = serde_json::from_str(&data)
                .map_err(|e| Exception::runtime_error(format!("corrupt http replay record: {e}")))?;
            return outcome.into_result().map_err(Exception::network_error);
        }

        self.pause_compute();
        let outcome = match &mut self.http {
            Some(client) => client.request(request),
            None => Err("no HTTP client installed in this context".to_string()),
        };
        self.resume_compute();

        let recordable = crate::net::HttpOutcome::from(outcome.clone());
        self.amend_last_side_effect(&serde_json::to_string(&recordable).unwrap_or_default());
        outcome.map_err(Exception::network_error)
    }

    // --- call depth --------------------------------------------------------

    pub(crate) fn enter_call(&mut self, name: &str) -> Result<(), Exception> {
        if self.call_depth >= self.max_call_depth {
            return Err(Exception::new(
                ExcType::RecursionError,
                "maximum recursion depth exceeded",
            ));
        }
        self.call_depth += 1;
        self.record(EventKind::CallEnter, EventPayload::Call { name: name.to_string() });
        Ok(())
    }

    pub(crate) fn exit_call(&mut self, name: &str) {
        self.call_depth = self.call_depth.saturating_sub(1);
        self.record(EventKind::CallExit, EventPayload::Call { name: name.to_string() });
    }

    // --- file handles ------------------------------------------------------

    /// Opens a file in `r`/`w`/`a` mode, returning the handle id.
    pub(crate) fn open_file(&mut self, path: &str, mode: &str) -> Result<u32, Exception> {
        let mode = match mode {
            "r" | "rt" => FileMode::Read,
            "w" | "wt" => FileMode::Write,
            "a" | "at" => FileMode::Append,
            other => {
                return Err(Exception::value_error(format!("invalid mode: '{other}'")));
            }
        };
        let buffer = if mode == FileMode::Read {
            if let Some(EventPayload::FileOp { data, .. }) = self.record(
                EventKind::FileOp,
                EventPayload::FileOp { op: FileOp::Open, path: path.to_string(), data: String::new() },
            ) {
                data
            } else {
                self.pause_compute();
                let content = self.fs.read(path);
                self.resume_compute();
                let content = content.map_err(|msg| Exception::new(ExcType::FileNotFoundError, msg))?;
                if let Some(Event {
                    payload: EventPayload::FileOp { data, .. },
                    ..
                }) = self.events.last_mut()
                {
                    data.clone_from(&content);
                }
                content
            }
        } else {
            self.record(
                EventKind::FileOp,
                EventPayload::FileOp { op: FileOp::Open, path: path.to_string(), data: String::new() },
            );
            String::new()
        };
        let id = self.next_file;
        self.next_file += 1;
        self.files.insert(
            id,
            FileHandle {
                path: path.to_string(),
                mode,
                buffer,
                read_pos: 0,
                closed: false,
            },
        );
        Ok(id)
    }

    fn file(&mut self, id: u32) -> Result<&mut FileHandle, Exception> {
        self.files
            .get_mut(&id)
            .ok_or_else(|| Exception::value_error("I/O operation on closed file"))
    }

    /// Reads the rest of the buffered content (read mode only).
    pub(crate) fn file_read(&mut self, id: u32) -> Result<String, Exception> {
        let handle = self.file(id)?;
        if handle.closed {
            return Err(Exception::value_error("I/O operation on closed file"));
        }
        if handle.mode != FileMode::Read {
            return Err(Exception::io_error("file not open for reading"));
        }
        let rest = handle.buffer[handle.read_pos..].to_string();
        handle.read_pos = handle.buffer.len();
        let (path, len) = (handle.path.clone(), rest.len());
        self.record(
            EventKind::FileOp,
            EventPayload::FileOp { op: FileOp::Read, path, data: len.to_string() },
        );
        Ok(rest)
    }

    /// Reads the next line including its newline; empty string at EOF.
    pub(crate) fn file_readline(&mut self, id: u32) -> Result<String, Exception> {
        let handle = self.file(id)?;
        if handle.closed || handle.mode != FileMode::Read {
            return Err(Exception::io_error("file not open for reading"));
        }
        let rest = &handle.buffer[handle.read_pos..];
        let line = match rest.find('\n') {
            Some(pos) => &rest[..=pos],
            None => rest,
        };
        let line = line.to_string();
        handle.read_pos += line.len();
        Ok(line)
    }

    /// Appends text to the write buffer (write/append modes only).
    pub(crate) fn file_write(&mut self, id: u32, text: &str) -> Result<usize, Exception> {
        let handle = self.file(id)?;
        if handle.closed {
            return Err(Exception::value_error("I/O operation on closed file"));
        }
        if handle.mode == FileMode::Read {
            return Err(Exception::io_error("file not open for writing"));
        }
        handle.buffer.push_str(text);
        let path = handle.path.clone();
        self.record(
            EventKind::FileOp,
            EventPayload::FileOp { op: FileOp::Write, path, data: clip(text.to_string()) },
        );
        Ok(text.chars().count())
    }

    /// Closes a handle; write buffers flush to the backend unless the close
    /// is being replayed (the backend already saw the flush when the log was
    /// recorded).
    pub(crate) fn file_close(&mut self, id: u32) -> Result<(), Exception> {
        let handle = self.file(id)?;
        if handle.closed {
            return Ok(());
        }
        handle.closed = true;
        let (path, mode, buffer) = (handle.path.clone(), handle.mode, handle.buffer.clone());
        let replayed = self
            .record(
                EventKind::FileOp,
                EventPayload::FileOp { op: FileOp::Close, path: path.clone(), data: String::new() },
            )
            .is_some();
        if !replayed && mode != FileMode::Read {
            let write_mode = if mode == FileMode::Append { WriteMode::Append } else { WriteMode::Write };
            self.pause_compute();
            let result = self.fs.write(&path, &buffer, write_mode);
            self.resume_compute();
            result.map_err(Exception::io_error)?;
        }
        Ok(())
    }

    /// Lists a directory through the backend, recording for replay.
    pub(crate) fn list_dir(&mut self, path: &str) -> Result<Vec<String>, Exception> {
        if let Some(EventPayload::FileOp { data, .. }) = self.record(
            EventKind::FileOp,
            EventPayload::FileOp { op: FileOp::ListDir, path: path.to_string(), data: String::new() },
        ) {
            return Ok(if data.is_empty() { Vec::new() } else { data.split('\n').map(String::from).collect() });
        }
        self.pause_compute();
        let names = self.fs.list_dir(path);
        self.resume_compute();
        let names = names.map_err(|msg| Exception::new(ExcType::FileNotFoundError, msg))?;
        if let Some(Event {
            payload: EventPayload::FileOp { data, .. },
            ..
        }) = self.events.last_mut()
        {
            *data = names.join("\n");
        }
        Ok(names)
    }

    /// Raw backend read used by the import resolver (not a guest file op).
    pub(crate) fn fs_read(&mut self, path: &str) -> Result<String, String> {
        self.pause_compute();
        let result = self.fs.read(path);
        self.resume_compute();
        result
    }

    /// The filesystem backend, for host inspection after a run.
    #[must_use]
    pub fn fs(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    // --- iterator table ----------------------------------------------------

    pub(crate) fn make_iter(&mut self, items: Vec<Value>) -> u32 {
        self.make_iter_with_error(items, None)
    }

    pub(crate) fn make_iter_with_error(&mut self, items: Vec<Value>, tail_error: Option<Exception>) -> u32 {
        let id = self.next_iter;
        self.next_iter += 1;
        self.iters.insert(
            id,
            IterState::Values {
                items: items.into(),
                tail_error,
            },
        );
        id
    }

    pub(crate) fn make_instance_iter(&mut self, instance: Value) -> u32 {
        let id = self.next_iter;
        self.next_iter += 1;
        self.iters.insert(id, IterState::Instance(instance));
        id
    }

    /// Advances a value-backed handle, or reports the driving instance.
    pub(crate) fn iter_next(&mut self, id: u32) -> Result<IterNext, Exception> {
        match self.iters.get_mut(&id) {
            Some(IterState::Values { items, tail_error }) => match items.pop_front() {
                Some(v) => Ok(IterNext::Value(v)),
                None => match tail_error.take() {
                    Some(err) => Err(err),
                    None => Ok(IterNext::Done),
                },
            },
            Some(IterState::Instance(inst)) => Ok(IterNext::Instance(inst.clone())),
            None => Err(Exception::runtime_error("iterator handle is gone")),
        }
    }

    /// Remaining values of a value-backed handle without consuming them.
    /// Host-facing peek; the evaluator itself always advances or drains.
    #[allow(dead_code)]
    pub(crate) fn iter_remaining(&self, id: u32) -> Option<Vec<Value>> {
        match self.iters.get(&id) {
            Some(IterState::Values { items, .. }) => Some(items.iter().cloned().collect()),
            _ => None,
        }
    }

    /// Consumes all remaining values of a value-backed handle; surfaces the
    /// trailing generator error when one is pending.
    pub(crate) fn iter_drain(&mut self, id: u32) -> Option<Result<Vec<Value>, Exception>> {
        match self.iters.get_mut(&id) {
            Some(IterState::Values { items, tail_error }) => {
                if let Some(err) = tail_error.take() {
                    return Some(Err(err));
                }
                Some(Ok(std::mem::take(items).into_iter().collect()))
            }
            _ => None,
        }
    }

    pub(crate) fn drop_iter(&mut self, id: u32) {
        self.iters.remove(&id);
    }

    // --- profiling ---------------------------------------------------------

    pub(crate) fn profile_hit(&mut self, line: u32) {
        if self.profile {
            *self.line_counts.entry(line).or_insert(0) += 1;
        }
    }

    /// Per-line statement execution counts, sorted by line. Empty unless the
    /// `profile` option was set.
    #[must_use]
    pub fn profile_report(&self) -> Vec<(u32, u64)> {
        let mut counts: Vec<(u32, u64)> = self.line_counts.iter().map(|(l, c)| (*l, *c)).collect();
        counts.sort_unstable();
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_consumes_then_goes_live() {
        let mut ctx = Ctx::default();
        assert!(ctx
            .record(EventKind::Branch, EventPayload::Branch { taken: true })
            .is_none());
        let mut ctx = ctx.for_resume();
        assert!(ctx.is_replaying());
        let replayed = ctx.record(EventKind::Branch, EventPayload::Branch { taken: false });
        assert_eq!(replayed, Some(EventPayload::Branch { taken: true }));
        assert_eq!(ctx.mode, Mode::Live);
        // next record appends
        ctx.record(EventKind::Branch, EventPayload::Branch { taken: false });
        assert_eq!(ctx.events().len(), 2);
        assert_eq!(ctx.events()[1].step, 1);
    }

    #[test]
    fn divergence_abandons_log() {
        let mut ctx = Ctx::default();
        ctx.record(EventKind::Branch, EventPayload::Branch { taken: true });
        ctx.record(EventKind::Output, EventPayload::Output { text: "x".into() });
        let mut ctx = ctx.for_resume();
        let replayed = ctx.record(EventKind::LoopIter, EventPayload::LoopIter { index: 0 });
        assert!(replayed.is_none());
        assert_eq!(ctx.events().len(), 1);
        assert_eq!(ctx.mode, Mode::Live);
    }

    #[test]
    fn file_write_flushes_on_close_only() {
        let mut ctx = Ctx::default();
        let id = ctx.open_file("out.txt", "w").unwrap();
        ctx.file_write(id, "hello").unwrap();
        assert!(ctx.fs().read("out.txt").is_err());
        ctx.file_close(id).unwrap();
        assert_eq!(ctx.fs().read("out.txt").unwrap(), "hello");
    }

    #[test]
    fn read_open_replays_without_backend() {
        let mut ctx = Ctx::new(CtxOptions {
            filesystem: Some(Box::new(crate::fsys::MemFs::with_files([("a.txt", "data")]))),
            ..CtxOptions::default()
        });
        let id = ctx.open_file("a.txt", "r").unwrap();
        assert_eq!(ctx.file_read(id).unwrap(), "data");
        ctx.file_close(id).unwrap();

        // replay against an empty filesystem still sees the recorded content
        let events = ctx.events().to_vec();
        let mut ctx2 = Ctx::with_events(CtxOptions::default(), events);
        let id = ctx2.open_file("a.txt", "r").unwrap();
        assert_eq!(ctx2.file_read(id).unwrap(), "data");
    }

    #[test]
    fn deadline_fires_after_budget() {
        let mut ctx = Ctx::new(CtxOptions {
            timeout_ms: Some(0),
            ..CtxOptions::default()
        });
        ctx.resume_compute();
        std::thread::sleep(Duration::from_millis(2));
        let err = ctx.check_deadline().unwrap_err();
        assert_eq!(err.kind, ExcType::TimeoutError);
    }

    #[test]
    fn compute_clock_pauses_around_io() {
        let mut ctx = Ctx::default();
        ctx.resume_compute();
        ctx.pause_compute();
        let frozen = ctx.compute_time();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(ctx.compute_time(), frozen);
    }
}
