pub mod framer;
pub mod session;
pub mod timeline;

use chrono::{DateTime, Local};

/// One sample from the live news sentiment stream.
#[derive(Debug, Clone)]
pub struct SentimentEvent {
    /// Client-side reception time; the backend sends no timestamp of its own.
    pub received_at: DateTime<Local>,
    /// Number of source messages aggregated into this sample.
    pub message_count: u64,
    /// Sentiment value, [0, 5] by convention.
    pub sentiment: f64,
    /// Original record text, kept for diagnostics.
    pub raw_line: String,
}
