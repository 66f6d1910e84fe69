//! Size-bounded chunking at line boundaries.
//!
//! Cards reject oversized bodies, so a long report is sent as several
//! parts. Lines are never cut in half: a chunk closes when the next line
//! would push it past the limit. Lengths are counted in characters, not
//! bytes, since the destination limit is a character limit.

/// Split `content` into chunks of at most `max_len` characters.
///
/// Content already within the limit comes back untouched as a single
/// chunk. Otherwise every line is re-terminated with `\n` and lines
/// accumulate greedily; a single line longer than the limit becomes an
/// oversized chunk by itself. No empty chunks are produced, and
/// concatenating the chunks reproduces the content (the last line gains
/// a trailing newline if it had none).
pub fn split_content(content: &str, max_len: usize) -> Vec<String> {
    if content.chars().count() <= max_len {
        return vec![content.to_string()];
    }

    let mut lines: Vec<&str> = content.split('\n').collect();
    if content.ends_with('\n') {
        lines.pop();
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for line in lines {
        let line_len = line.chars().count() + 1;
        if current_len + line_len > max_len && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current.push_str(line);
        current.push('\n');
        current_len += line_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
