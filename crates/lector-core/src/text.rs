//! Text preprocessing for speech.
//!
//! Host pages hand the reader marked-up fragments; speech wants plain
//! prose. This strips tags and collapses whitespace so the spoken text
//! matches the visible words one-to-one — the highlight pointer depends on
//! that correspondence.

/// Strip markup from a source fragment, producing plain text suitable for
/// speech.
///
/// Handles:
/// - HTML tags → removed (contents kept)
/// - Character entities (`&amp;`, `&lt;`, `&gt;`, `&quot;`, `&#39;`,
///   `&nbsp;`) → decoded
/// - Runs of whitespace (including newlines from block layout) → one space
#[must_use]
pub fn plain_text(markup: &str) -> String {
    let stripped = strip_tags(markup);
    let decoded = decode_entities(&stripped);
    collapse_whitespace(&decoded)
}

/// Words of a plain-text fragment, in reading order.
///
/// This is the tokenization the highlight pointer walks; it must agree with
/// how sources split their fragments into word tokens.
#[must_use]
pub fn words(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}

// ── Internal helpers ───────────────────────────────────────────────

fn strip_tags(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_tag = false;

    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                // Block-level boundaries become whitespace so "<p>a</p><p>b"
                // never fuses into "ab".
                result.push(' ');
            }
            _ if !in_tag => result.push(c),
            _ => {}
        }
    }

    result
}

fn decode_entities(text: &str) -> String {
    // The handful of entities that actually show up in article prose.
    text.replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn collapse_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut prev_space = false;

    for c in text.chars() {
        if c.is_whitespace() {
            if !prev_space {
                result.push(' ');
                prev_space = true;
            }
        } else {
            result.push(c);
            prev_space = false;
        }
    }

    result.trim().to_string()
}
