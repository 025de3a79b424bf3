//! Line assembly for byte streams from the transceiver

/// Longest partial line kept while waiting for its terminator
///
/// culfw lines are well under 100 bytes; anything longer is noise.
pub const MAX_PENDING: usize = 512;

/// Bytes received after the last complete line
#[derive(Debug)]
pub struct LineBuffer {
    pending: Vec<u8>,
    limit: usize,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::with_limit(MAX_PENDING)
    }
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            pending: Vec::new(),
            limit,
        }
    }

    /// Append received bytes
    ///
    /// A partial line that grows past the limit without a `\n` is discarded.
    pub fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
        if self.pending.len() > self.limit && !self.pending.contains(&b'\n') {
            tracing::warn!(
                bytes = self.pending.len(),
                limit = self.limit,
                "discarding unterminated transceiver input"
            );
            self.pending.clear();
        }
    }

    /// Pop one complete line, without its terminator
    pub fn take_line(&mut self) -> Option<String> {
        let end = self.pending.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.pending.drain(..=end).collect();
        Some(String::from_utf8_lossy(&line).trim_end().to_string())
    }

    /// Bytes waiting for a terminator
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
