//! Splitting a token into bounded cookie-sized fragments and joining them back.
//!
//! A token of `n` bytes is written as `ceil(n / chunk_size)` data chunks at indices `0..`,
//! followed by one empty terminator chunk. Reassembly stops at the first absent or empty chunk,
//! so anything stored above a gap is never read.

/// One fragment of a serialized token, stored in the cookie `<prefix><index>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub index: usize,
    pub value: &'a str,
}

impl Chunk<'_> {
    /// The empty chunk that marks the end of a sequence.
    pub fn is_terminator(&self) -> bool {
        self.value.is_empty()
    }

    pub fn cookie_name(&self, prefix: &str) -> String {
        cookie_name(prefix, self.index)
    }
}

pub fn cookie_name(prefix: &str, index: usize) -> String {
    format!("{prefix}{index}")
}

/// Split `text` into data chunks of at most `chunk_size` bytes plus a trailing terminator.
///
/// Fragments never cut through a UTF-8 code point: a fragment ends at the last character
/// boundary at or before `chunk_size` bytes. For ASCII input (every compact JWT) each data chunk
/// but the last is exactly `chunk_size` bytes. A `chunk_size` narrower than a single character
/// still makes progress by emitting that character alone.
///
/// Fragments are sent as raw cookie values, so text headed for cookies must already be
/// cookie-safe ASCII; the session handler refuses token text that is not.
///
/// # Panics
/// Panics if `chunk_size` is zero.
pub fn split(text: &str, chunk_size: usize) -> Vec<Chunk<'_>> {
    assert!(chunk_size > 0, "chunk size must be positive");

    let mut chunks = Vec::with_capacity(text.len().div_ceil(chunk_size) + 1);
    let mut rest = text;

    while !rest.is_empty() {
        let mut end = chunk_size.min(rest.len());
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        if end == 0 {
            end = rest.chars().next().map_or(rest.len(), char::len_utf8);
        }

        let (value, tail) = rest.split_at(end);
        chunks.push(Chunk {
            index: chunks.len(),
            value,
        });
        rest = tail;
    }

    chunks.push(Chunk {
        index: chunks.len(),
        value: "",
    });
    chunks
}

/// Reassemble a token from the chunks named `<prefix>0 ..= <prefix><max_index>`.
///
/// `lookup` receives a cookie name and returns its value. Scanning stops at the first missing or
/// empty value; `max_index` is the hard cap on how many chunks a token may span.
pub fn join<F>(mut lookup: F, prefix: &str, max_index: usize) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    let mut text = String::new();

    for index in 0..=max_index {
        match lookup(&cookie_name(prefix, index)) {
            Some(value) if !value.is_empty() => text.push_str(&value),
            _ => break,
        }
    }

    text
}
