//! Byte-bounded text chunking for the remote synthesis endpoint.
//!
//! The remote service enforces a hard 5000-byte limit on the `text` field of
//! each request. We split on codepoint boundaries with a safety margin so a
//! request can never be rejected for size, and so that no chunk ever ends in
//! the middle of a multi-byte sequence.

/// Maximum UTF-8 byte length per remote request chunk.
///
/// The provider's hard ceiling is 5000 bytes; 4800 leaves a margin for any
/// serialization overhead counted against the field.
pub const REMOTE_CHUNK_BYTES: usize = 4800;

/// Split `text` into ordered chunks of at most `max_bytes` UTF-8 bytes each.
///
/// Codepoints are accumulated into a running buffer; when the next codepoint
/// would push the buffer past `max_bytes`, the buffer is flushed as a chunk
/// and the codepoint starts the next one. Concatenating the returned chunks
/// reproduces `text` exactly.
///
/// Empty input yields an empty vec — the caller treats that as "nothing to
/// read", not as an error.
#[must_use]
pub fn split(text: &str, max_bytes: usize) -> Vec<String> {
    if text.is_empty() || max_bytes == 0 {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut current = String::with_capacity(max_bytes.min(text.len()));

    for ch in text.chars() {
        if current.len() + ch.len_utf8() > max_bytes && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(split("", REMOTE_CHUNK_BYTES).is_empty());
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = split("hello world", REMOTE_CHUNK_BYTES);
        assert_eq!(chunks, vec!["hello world"]);
    }

    #[test]
    fn concatenation_reproduces_input() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(40);
        let chunks = split(&text, 100);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn every_chunk_respects_the_byte_bound() {
        let text = "abcdefghij".repeat(50);
        for chunk in split(&text, 64) {
            assert!(chunk.len() <= 64, "chunk of {} bytes", chunk.len());
        }
    }

    #[test]
    fn never_splits_a_multibyte_codepoint() {
        // Each 'é' is 2 bytes, each '語' is 3, each emoji 4. With a 10-byte
        // bound the splitter must flush early rather than bisect a codepoint.
        let text = "éé語語😀ééé語😀😀";
        let chunks = split(text, 10);
        assert_eq!(chunks.concat(), text);
        for chunk in &chunks {
            assert!(chunk.len() <= 10);
            // Would panic on a broken boundary.
            let _ = chunk.chars().count();
        }
    }

    #[test]
    fn twelve_kilobytes_make_three_chunks_at_the_remote_bound() {
        let text = "a".repeat(12_000);
        let chunks = split(&text, REMOTE_CHUNK_BYTES);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 4800);
        assert_eq!(chunks[1].len(), 4800);
        assert_eq!(chunks[2].len(), 2400);
    }

    #[test]
    fn oversized_single_codepoint_still_emits() {
        // A codepoint wider than the bound cannot be split; it becomes its
        // own (oversized) chunk rather than being dropped.
        let chunks = split("😀", 2);
        assert_eq!(chunks, vec!["😀".to_string()]);
    }
}
