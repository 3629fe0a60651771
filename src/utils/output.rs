/// Bounded output capture and normalization
///
/// Reader threads drain stdout and stderr concurrently so the child never
/// blocks on a full pipe. Each keeps at most `limit` bytes and discards the
/// rest until EOF.
use std::io::{BufReader, Read};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread;

/// Returned when a run printed nothing
pub const NO_OUTPUT: &str = "No output";

/// Appended after the retained prefix of oversized output
pub const TRUNCATION_MARKER: &str = "\n... truncated ...";

/// Bytes retained from one stream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedStream {
    pub bytes: Vec<u8>,
    /// More bytes arrived than were retained
    pub overflowed: bool,
}

impl From<&str> for CapturedStream {
    fn from(text: &str) -> Self {
        Self {
            bytes: text.as_bytes().to_vec(),
            overflowed: false,
        }
    }
}

/// Combined stdout+stderr text of a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub text: String,
    pub overflowed: bool,
}

/// Handle to the two reader threads
pub struct OutputCollector {
    stdout: Option<Receiver<CapturedStream>>,
    stderr: Option<Receiver<CapturedStream>>,
}

impl OutputCollector {
    /// Spawn one reader per present stream.
    pub fn start<O, E>(stdout: Option<O>, stderr: Option<E>, limit: usize) -> Self
    where
        O: Read + Send + 'static,
        E: Read + Send + 'static,
    {
        Self {
            stdout: stdout.map(|s| spawn_reader(s, limit)),
            stderr: stderr.map(|s| spawn_reader(s, limit)),
        }
    }

    /// Wait for both readers to reach EOF.
    ///
    /// Only call once the writer side is known to be closed; otherwise this
    /// blocks for as long as the child keeps its pipes open.
    pub fn finish(self) -> (CapturedStream, CapturedStream) {
        (receive(self.stdout), receive(self.stderr))
    }
}

fn spawn_reader<R: Read + Send + 'static>(stream: R, limit: usize) -> Receiver<CapturedStream> {
    let (tx, rx) = channel();
    thread::spawn(move || drain(stream, limit, tx));
    rx
}

fn receive(rx: Option<Receiver<CapturedStream>>) -> CapturedStream {
    match rx {
        Some(rx) => rx.recv().unwrap_or_else(|_| {
            log::warn!("Output reader exited without reporting");
            CapturedStream::default()
        }),
        None => CapturedStream::default(),
    }
}

/// Read to EOF keeping at most `limit` bytes.
fn drain<R: Read>(stream: R, limit: usize, tx: Sender<CapturedStream>) {
    let mut reader = BufReader::new(stream);
    let mut captured = CapturedStream::default();
    let mut chunk = [0u8; 8192];

    loop {
        match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                let room = limit.saturating_sub(captured.bytes.len());
                if n > room {
                    captured.overflowed = true;
                }
                captured.bytes.extend_from_slice(&chunk[..n.min(room)]);
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                log::debug!("Output stream closed with error: {}", e);
                break;
            }
        }
    }

    // receiver is gone when the run timed out
    let _ = tx.send(captured);
}

/// Stdout followed by stderr, decoded lossily.
pub fn combine(stdout: &CapturedStream, stderr: &CapturedStream) -> CapturedOutput {
    let mut text = String::from_utf8_lossy(&stdout.bytes).into_owned();
    text.push_str(&String::from_utf8_lossy(&stderr.bytes));
    CapturedOutput {
        text,
        overflowed: stdout.overflowed || stderr.overflowed,
    }
}

/// Trim, replace empty output, cap at `limit_chars` characters.
pub fn sanitize(raw: &str, limit_chars: usize) -> String {
    let trimmed = raw.trim();

    if trimmed.is_empty() {
        return NO_OUTPUT.to_string();
    }

    match trimmed.char_indices().nth(limit_chars) {
        Some((cut, _)) => {
            let mut out = String::with_capacity(cut + TRUNCATION_MARKER.len());
            out.push_str(&trimmed[..cut]);
            out.push_str(TRUNCATION_MARKER);
            out
        }
        None => trimmed.to_string(),
    }
}

/// Sanitize captured output; bytes dropped at capture time also count
/// as truncation. The empty-output sentinel is never marked.
pub fn render(captured: &CapturedOutput, limit_chars: usize) -> String {
    let mut out = sanitize(&captured.text, limit_chars);
    if captured.overflowed && out != NO_OUTPUT && !out.ends_with(TRUNCATION_MARKER) {
        out.push_str(TRUNCATION_MARKER);
    }
    out
}
