/// Parsers for the two line formats the sentiment backend speaks:
///
/// `Score is:<decimal>` somewhere in an analysis response body, and
/// `<count> messages, sentiment = <decimal>` for one stream record.
///
/// Both are scanned with an explicit fixed-format grammar. A line that
/// does not match is reported as `None` and skipped by the caller; the
/// backend's output is not guaranteed free of incidental non-data lines,
/// so a mismatch is a formatting variance, never an error.
const SCORE_MARKER: &str = "Score is:";
const RECORD_MARKER: &str = " messages, sentiment = ";

/// Extract the sentiment score from an analysis response body.
///
/// Returns the value at the first position where the whole
/// `Score is:<decimal>` pattern matches, or `None` when the body carries
/// no parseable score.
pub fn parse_score(body: &str) -> Option<f64> {
    for (idx, _) in body.match_indices(SCORE_MARKER) {
        let rest = &body[idx + SCORE_MARKER.len()..];
        if let Some(len) = decimal_prefix(rest) {
            if let Ok(score) = rest[..len].parse() {
                return Some(score);
            }
        }
    }
    None
}

/// Extract `(message_count, sentiment)` from one stream record line.
///
/// The pattern may sit anywhere in the line: a run of digits, the literal
/// `" messages, sentiment = "`, then a decimal number.
pub fn parse_sentiment_record(line: &str) -> Option<(u64, f64)> {
    for (idx, _) in line.match_indices(RECORD_MARKER) {
        let digits = trailing_digits(&line[..idx]);
        if digits.is_empty() {
            continue;
        }
        let rest = &line[idx + RECORD_MARKER.len()..];
        let len = match decimal_prefix(rest) {
            Some(len) => len,
            None => continue,
        };
        if let (Ok(count), Ok(sentiment)) = (digits.parse(), rest[..len].parse()) {
            return Some((count, sentiment));
        }
    }
    None
}

/// The maximal run of ASCII digits at the end of `s`.
fn trailing_digits(s: &str) -> &str {
    let bytes = s.as_bytes();
    let mut start = bytes.len();
    while start > 0 && bytes[start - 1].is_ascii_digit() {
        start -= 1;
    }
    &s[start..]
}

/// Byte length of the decimal production `digits ["." digits]` at the
/// start of `s`. The dot is only consumed when digits follow it, so
/// `"2.80<br>"` yields `"2.80"` and `"3."` yields `"3"`.
fn decimal_prefix(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut end = 0;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == 0 {
        return None;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        let mut frac = end + 1;
        while frac < bytes.len() && bytes[frac].is_ascii_digit() {
            frac += 1;
        }
        if frac > end + 1 {
            end = frac;
        }
    }
    Some(end)
}
