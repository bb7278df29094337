//! Countdown shown on pages that refresh themselves through
//! `<meta http-equiv="refresh" content="N">`.

use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::time;
use tokio_stream::wrappers::IntervalStream;

/// Returns the refresh delay in seconds declared by the first refresh meta tag.
pub fn parse_refresh_meta(html: &str) -> Option<u64> {
    // ASCII lowercasing keeps byte offsets aligned with `html`.
    let lower = html.to_ascii_lowercase();
    let mut from = 0;
    while let Some(start) = lower[from..].find("<meta").map(|i| i + from) {
        let end = lower[start..].find('>').map_or(lower.len(), |i| i + start);
        let tag = &html[start..end];
        let is_refresh = attribute(tag, "http-equiv")
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("refresh"));
        if is_refresh {
            return attribute(tag, "content").and_then(leading_seconds);
        }
        from = end;
    }
    None
}

fn attribute<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    let lower = tag.to_ascii_lowercase();
    let mut from = 0;
    while let Some(pos) = lower[from..].find(name).map(|i| i + from) {
        let preceded_by_space = pos > 0 && lower.as_bytes()[pos - 1].is_ascii_whitespace();
        let rest = lower[pos + name.len()..].trim_start();
        if preceded_by_space && rest.starts_with('=') {
            let offset = tag.len() - rest.len() + 1;
            let value = tag[offset..].trim_start();
            return match value.chars().next() {
                Some(quote @ ('"' | '\'')) => value[1..].split(quote).next(),
                Some(_) => value.split(|c: char| c.is_ascii_whitespace() || c == '/').next(),
                None => None,
            };
        }
        from = pos + name.len();
    }
    None
}

/// `"30"` and `"30; url=/view/x"` both yield 30.
fn leading_seconds(content: &str) -> Option<u64> {
    let digits: String = content
        .trim()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshCountdown {
    remaining: u64,
}

impl RefreshCountdown {
    pub fn new(seconds: u64) -> Self {
        Self { remaining: seconds }
    }

    pub fn from_html(html: &str) -> Option<Self> {
        parse_refresh_meta(html).map(Self::new)
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn is_expired(&self) -> bool {
        self.remaining == 0
    }

    /// Returns the value to display, then counts one second down.
    pub fn tick(&mut self) -> u64 {
        let shown = self.remaining;
        self.remaining = self.remaining.saturating_sub(1);
        shown
    }

    /// One displayed value per second, from the start value down to zero.
    pub fn into_stream(mut self) -> impl Stream<Item = u64> + Send {
        let ticks = IntervalStream::new(time::interval(Duration::from_secs(1)));
        let total = usize::try_from(self.remaining.saturating_add(1)).unwrap_or(usize::MAX);
        ticks.take(total).map(move |_| self.tick())
    }
}
