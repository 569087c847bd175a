//! Exact text comparison with a bounded diagnostic excerpt

/// Characters kept on each side of the first mismatch in an excerpt
pub const MISMATCH_OFFSET: usize = 20;

/// Combined length of both strings above which excerpts replace them
pub const MAX_MESSAGE_SIZE: usize = 50;

/// First difference between two strings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringMismatch {
    /// Zero-based character index of the first difference
    pub index: usize,
    pub expected_excerpt: String,
    pub actual_excerpt: String,
    location: String,
}

impl StringMismatch {
    /// "Expected: .. but was: .." followed by the location of the difference
    pub fn describe(&self) -> String {
        format!(
            "Expected: {} but was: {}{}",
            self.expected_excerpt, self.actual_excerpt, self.location
        )
    }
}

/// Compare two strings exactly
///
/// Returns `None` when the character sequences are identical. No trimming or
/// case folding is applied.
pub fn match_strings(expected: &str, actual: &str) -> Option<StringMismatch> {
    if expected == actual {
        return None;
    }

    let expected_chars: Vec<char> = expected.chars().collect();
    let actual_chars: Vec<char> = actual.chars().collect();

    let differing = expected_chars
        .iter()
        .zip(actual_chars.iter())
        .position(|(e, a)| e != a);

    let (index, location) = match differing {
        Some(i) => (
            i,
            format!(
                "  Strings do not match at character: {}. Expected [{}] - but got [{}]",
                i + 1,
                expected_chars[i],
                actual_chars[i]
            ),
        ),
        None => {
            // one string is a prefix of the other
            let shorter = expected_chars.len().min(actual_chars.len());
            (
                shorter,
                format!(
                    "  Strings differ in length at character: {}. Expected {} characters - but got {}",
                    shorter + 1,
                    expected_chars.len(),
                    actual_chars.len()
                ),
            )
        }
    };

    let (expected_excerpt, actual_excerpt) =
        if expected_chars.len() + actual_chars.len() > MAX_MESSAGE_SIZE {
            let start = index as isize - MISMATCH_OFFSET as isize;
            let end = index + MISMATCH_OFFSET;
            (
                safe_substring(&expected_chars, start, end),
                safe_substring(&actual_chars, start, end),
            )
        } else {
            (expected.to_string(), actual.to_string())
        };

    Some(StringMismatch {
        index,
        expected_excerpt,
        actual_excerpt,
        location,
    })
}

/// Quoted slice `[start, end)` of `text`, clamped to its bounds
///
/// A side that was cut is marked with `...` outside the quote.
fn safe_substring(text: &[char], start: isize, end: usize) -> String {
    let (start, prefix) = if start <= 0 {
        (0, "'")
    } else {
        (start as usize, "...'")
    };
    let end = end.min(text.len());
    let suffix = if end == text.len() { "'" } else { "'..." };
    let start = start.min(end);

    let slice: String = text[start..end].iter().collect();
    format!("{}{}{}", prefix, slice, suffix)
}
