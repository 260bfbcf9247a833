/// Courtroom Engine: Answer Judge
///
/// One rule for tasks and criticals alike: trim, lowercase, compare.

/// Whitespace as the page script's `String.prototype.trim` sees it: Unicode
/// White_Space without NEL, plus the byte order mark.
fn is_trimmed(c: char) -> bool {
    c == '\u{feff}' || (c.is_whitespace() && c != '\u{85}')
}

/// Normalized form of an answer.
pub fn normalize(s: &str) -> String {
    s.trim_matches(is_trimmed).to_lowercase()
}

/// True iff `submitted` matches `expected` after normalization.
/// An empty (or missing) expected answer is never satisfied.
pub fn is_satisfied(expected: Option<&str>, submitted: &str) -> bool {
    let expected = normalize(expected.unwrap_or(""));
    !expected.is_empty() && normalize(submitted) == expected
}
