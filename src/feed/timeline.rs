use super::SentimentEvent;

/// Append-only store of the events received in one streaming session.
///
/// Events are kept in reception order; the running sum is maintained on
/// append so the average never needs a rescan. The display window is a
/// suffix view only; the average always covers every event received.
/// A new session gets a new `Timeline`; there is no clear-in-place.
#[derive(Debug, Default)]
pub struct Timeline {
    events: Vec<SentimentEvent>,
    sentiment_sum: f64,
}

/// One consistent view of the timeline: the display suffix and the
/// aggregate, computed together so neither is stale relative to the other.
#[derive(Debug)]
pub struct TimelineSnapshot<'a> {
    pub recent: &'a [SentimentEvent],
    pub average: Option<f64>,
    pub total: usize,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// The only mutator.
    pub fn append(&mut self, event: SentimentEvent) {
        self.sentiment_sum += event.sentiment;
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Arithmetic mean of every received sentiment, `None` while empty.
    pub fn average(&self) -> Option<f64> {
        if self.events.is_empty() {
            None
        } else {
            Some(self.sentiment_sum / self.events.len() as f64)
        }
    }

    /// The last `window` events plus the average over all of them.
    pub fn snapshot(&self, window: usize) -> TimelineSnapshot<'_> {
        let start = self.events.len().saturating_sub(window);
        TimelineSnapshot {
            recent: &self.events[start..],
            average: self.average(),
            total: self.events.len(),
        }
    }
}
