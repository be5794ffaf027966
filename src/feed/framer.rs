/// Delimiter the backend terminates every stream record with.
pub const RECORD_DELIMITER: &str = "<br>";

/// Incremental splitter turning arbitrarily-chunked response text into
/// complete delimiter-terminated records.
///
/// Chunk boundaries carry no meaning: a record, or the delimiter itself,
/// may arrive split across any number of chunks. Content is buffered until
/// a delimiter completes it; a final fragment with no delimiter is
/// discarded along with the framer (the backend always terminates
/// records). One framer per session.
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: String,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one decoded chunk and get back every record it completed, in
    /// order. Records are returned verbatim with the delimiter stripped;
    /// lines that are blank after trimming are dropped.
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        self.buffer.push_str(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.find(RECORD_DELIMITER) {
            let line = self.buffer[..pos].to_string();
            self.buffer.drain(..pos + RECORD_DELIMITER.len());
            if !line.trim().is_empty() {
                lines.push(line);
            }
        }
        lines
    }
}
