//! Line-preserving text chunking for the entity classifier.
//!
//! Transformer NER models accept a bounded input. Recognised text is split
//! only at line boundaries so no clinical term is cut in half; a single line
//! longer than the limit becomes its own chunk rather than being split.

/// Default chunk size in characters.
pub const DEFAULT_MAX_CHUNK_LENGTH: usize = 400;

/// Characters that end a line: `\n`, `\r`, vertical tab, form feed, the
/// file/group/record separators, NEL and the Unicode line and paragraph
/// separators.
fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\x0b' | '\x0c' | '\x1c' | '\x1d' | '\x1e' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

/// Split `text` into chunks of at most `max_length` characters.
///
/// Lines are trimmed and blank lines dropped. A `\r\n` pair yields an empty
/// piece between the two breaks, which the blank-line rule discards. The length of a chunk is the
/// sum of its line lengths; the single space joining lines is not counted.
/// An oversized line in an empty accumulator is kept whole.
pub fn chunk_text(text: &str, max_length: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0usize;

    for line in text.split(is_line_break) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let len = line.chars().count();
        if current_len + len > max_length && !current.is_empty() {
            chunks.push(current.join(" "));
            current.clear();
            current_len = 0;
        }
        current.push(line);
        current_len += len;
    }

    if !current.is_empty() {
        chunks.push(current.join(" "));
    }
    chunks
}
