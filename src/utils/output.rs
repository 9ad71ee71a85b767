/// Bounded output collection for child processes
/// Each stream gets its own reader thread so a child filling one pipe never
/// blocks behind the other.
use std::io::{BufReader, Read};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Instant;

/// Per-stream capture limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputLimits {
    /// Per-stream stdout limit (bytes)
    pub stdout_limit: usize,
    /// Per-stream stderr limit (bytes)
    pub stderr_limit: usize,
}

impl OutputLimits {
    /// Same limit for both streams
    pub fn per_stream(limit: usize) -> Self {
        Self {
            stdout_limit: limit,
            stderr_limit: limit,
        }
    }
}

impl Default for OutputLimits {
    fn default() -> Self {
        Self::per_stream(crate::config::types::DEFAULT_MAX_OUTPUT_BYTES)
    }
}

/// How completely a stream was captured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputIntegrity {
    /// Everything up to EOF was kept
    Complete,
    /// Stream exceeded the limit; the excess was read and discarded
    Truncated,
    /// Reading failed before EOF; `data` holds what arrived first
    ReadError,
    /// Stream was still open when collection stopped
    Abandoned,
}

impl std::fmt::Display for OutputIntegrity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputIntegrity::Complete => write!(f, "complete"),
            OutputIntegrity::Truncated => write!(f, "truncated"),
            OutputIntegrity::ReadError => write!(f, "read_error"),
            OutputIntegrity::Abandoned => write!(f, "abandoned"),
        }
    }
}

/// Bytes captured from one stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamCapture {
    pub data: Vec<u8>,
    pub integrity: OutputIntegrity,
}

impl StreamCapture {
    fn empty() -> Self {
        Self {
            data: Vec::new(),
            integrity: OutputIntegrity::Complete,
        }
    }

    /// Lossy UTF-8 view of the captured bytes
    pub fn into_text(self) -> String {
        match String::from_utf8(self.data) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        }
    }

    pub fn is_truncated(&self) -> bool {
        self.integrity == OutputIntegrity::Truncated
    }
}

/// Message from a reader thread
#[derive(Debug)]
enum ReaderEvent {
    Data(Vec<u8>),
    Finished(OutputIntegrity),
}

/// Read `stream` to EOF, forwarding at most `limit` bytes as they arrive.
///
/// Reading continues after the limit is hit so that the writer never stalls on
/// a full pipe; the extra bytes are dropped. Stops early once nobody listens.
fn forward_stream<R: Read>(stream: R, limit: usize, events: &Sender<ReaderEvent>) {
    let mut reader = BufReader::new(stream);
    let mut chunk = [0u8; 8192];
    let mut kept = 0usize;
    let mut integrity = OutputIntegrity::Complete;

    loop {
        match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                let room = limit.saturating_sub(kept);
                let take = n.min(room);
                if n > room {
                    integrity = OutputIntegrity::Truncated;
                }
                if take > 0 {
                    kept += take;
                    if events.send(ReaderEvent::Data(chunk[..take].to_vec())).is_err() {
                        return;
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                log::warn!("Output stream read failed: {}", e);
                if integrity == OutputIntegrity::Complete {
                    integrity = OutputIntegrity::ReadError;
                }
                break;
            }
        }
    }

    let _ = events.send(ReaderEvent::Finished(integrity));
}

/// Receiving end for one stream
struct StreamReceiver {
    events: Receiver<ReaderEvent>,
    capture: StreamCapture,
    finished: bool,
}

impl StreamReceiver {
    fn new(events: Receiver<ReaderEvent>) -> Self {
        Self {
            events,
            capture: StreamCapture::empty(),
            finished: false,
        }
    }

    fn done() -> Self {
        let (_, events) = mpsc::channel();
        Self {
            events,
            capture: StreamCapture::empty(),
            finished: true,
        }
    }

    /// Take events until EOF or `deadline`; true once the stream finished
    fn receive_until(&mut self, deadline: Instant) -> bool {
        while !self.finished {
            let wait = deadline.saturating_duration_since(Instant::now());
            match self.events.recv_timeout(wait) {
                Ok(ReaderEvent::Data(bytes)) => self.capture.data.extend_from_slice(&bytes),
                Ok(ReaderEvent::Finished(integrity)) => {
                    self.capture.integrity = integrity;
                    self.finished = true;
                }
                Err(RecvTimeoutError::Timeout) => return false,
                Err(RecvTimeoutError::Disconnected) => {
                    log::error!("Output reader thread exited without finishing");
                    self.capture.integrity = OutputIntegrity::ReadError;
                    self.finished = true;
                }
            }
        }
        true
    }

    fn finish(mut self, name: &str) -> StreamCapture {
        if !self.finished {
            log::warn!("{} still open after the command ended, keeping what arrived", name);
            self.capture.integrity = OutputIntegrity::Abandoned;
        }
        self.capture
    }
}

/// Spawns the reader threads for a child's stdout and stderr
pub struct OutputCollector {
    limits: OutputLimits,
}

impl OutputCollector {
    pub fn new(limits: OutputLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> OutputLimits {
        self.limits
    }

    /// Start draining both streams. Missing streams collect as empty.
    pub fn spawn<O, E>(&self, stdout: Option<O>, stderr: Option<E>) -> PendingOutput
    where
        O: Read + Send + 'static,
        E: Read + Send + 'static,
    {
        PendingOutput {
            stdout: spawn_reader(stdout, self.limits.stdout_limit),
            stderr: spawn_reader(stderr, self.limits.stderr_limit),
        }
    }
}

fn spawn_reader<R: Read + Send + 'static>(stream: Option<R>, limit: usize) -> StreamReceiver {
    match stream {
        None => StreamReceiver::done(),
        Some(stream) => {
            let (tx, rx) = mpsc::channel();
            // Detached: a reader blocked on a pipe held by an escaped process
            // must not hold up the caller
            thread::spawn(move || forward_stream(stream, limit, &tx));
            StreamReceiver::new(rx)
        }
    }
}

/// Reader threads still running
pub struct PendingOutput {
    stdout: StreamReceiver,
    stderr: StreamReceiver,
}

impl PendingOutput {
    /// Collect output until both streams reach EOF or `deadline` passes.
    /// Returns true once both are complete.
    pub fn receive_until(&mut self, deadline: Instant) -> bool {
        let stdout_done = self.stdout.receive_until(deadline);
        let stderr_done = self.stderr.receive_until(deadline);
        stdout_done && stderr_done
    }

    /// Stop waiting. Streams that never reached EOF are marked
    /// [`OutputIntegrity::Abandoned`] with whatever arrived so far.
    pub fn finish(self) -> CollectedOutput {
        CollectedOutput {
            stdout: self.stdout.finish("stdout"),
            stderr: self.stderr.finish("stderr"),
        }
    }
}

/// Output of both streams after the readers finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedOutput {
    pub stdout: StreamCapture,
    pub stderr: StreamCapture,
}

impl CollectedOutput {
    pub fn truncated(&self) -> bool {
        self.stdout.is_truncated() || self.stderr.is_truncated()
    }

    pub fn abandoned(&self) -> bool {
        self.stdout.integrity == OutputIntegrity::Abandoned || self.stderr.integrity == OutputIntegrity::Abandoned
    }
}
