//! Bounded capture of a child's output streams.

use tokio::io::{AsyncRead, AsyncReadExt};

/// Per-stream capture limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputLimits {
    /// Bytes kept per stream
    pub max_bytes: usize,
    /// Lines kept per stream
    pub max_lines: usize,
}

impl Default for OutputLimits {
    fn default() -> Self {
        Self {
            max_bytes: 64 * 1024,
            max_lines: 1000,
        }
    }
}

/// Captured output of one stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    /// Kept text, with a truncation marker appended when anything was dropped
    pub text: String,
    /// Bytes the child wrote to the stream
    pub total_bytes: usize,
    /// Lines the child wrote to the stream, counting a final unterminated line
    pub total_lines: usize,
    /// True when output beyond the limits was dropped
    pub truncated: bool,
}

/// Incremental, bounded collector.
///
/// Counts everything, keeps only what fits. Once either limit is reached no
/// further bytes are kept, so the kept text is always a prefix of the stream.
#[derive(Debug)]
pub struct OutputCapture {
    limits: OutputLimits,
    kept: Vec<u8>,
    kept_lines: usize,
    total_bytes: usize,
    newlines: usize,
    last_byte: Option<u8>,
    truncated: bool,
}

impl OutputCapture {
    /// New collector with `limits`.
    pub fn new(limits: OutputLimits) -> Self {
        Self {
            limits,
            kept: Vec::new(),
            kept_lines: 0,
            total_bytes: 0,
            newlines: 0,
            last_byte: None,
            truncated: false,
        }
    }

    /// Feed the next chunk of the stream.
    pub fn feed(&mut self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        self.total_bytes += chunk.len();
        self.newlines += chunk.iter().filter(|&&b| b == b'\n').count();
        self.last_byte = chunk.last().copied();

        if self.truncated {
            return;
        }
        for &byte in chunk {
            if self.kept.len() >= self.limits.max_bytes || self.kept_lines >= self.limits.max_lines {
                self.truncated = true;
                return;
            }
            self.kept.push(byte);
            if byte == b'\n' {
                self.kept_lines += 1;
            }
        }
    }

    /// Finish and produce the captured output.
    pub fn finish(self) -> CapturedOutput {
        let total_lines = self.newlines + usize::from(matches!(self.last_byte, Some(b) if b != b'\n'));
        let mut text = String::from_utf8_lossy(&self.kept).into_owned();
        if self.truncated {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            let dropped = self.total_bytes - self.kept.len();
            text.push_str(&format!("[... output truncated: {dropped} more bytes]"));
        }
        CapturedOutput {
            text,
            total_bytes: self.total_bytes,
            total_lines,
            truncated: self.truncated,
        }
    }
}

/// Drain `reader` to end of stream, keeping at most `limits`.
///
/// Reading continues past the limits so the child never blocks on a full pipe.
pub async fn capture_stream<R>(mut reader: R, limits: OutputLimits) -> std::io::Result<CapturedOutput>
where
    R: AsyncRead + Unpin,
{
    let mut capture = OutputCapture::new(limits);
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        capture.feed(&buf[..n]);
    }
    Ok(capture.finish())
}
