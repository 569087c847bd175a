//! Small helpers shared by the comparison engine and the scenario driver

/// Format duration in human-readable format
pub fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if secs > 0 {
        format!("{}.{:03}s", secs, millis)
    } else {
        format!("{}ms", millis)
    }
}

/// Truncate string to max characters with ellipsis
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Whether the query carries an explicit ordering clause
///
/// Matches `" order by "` anywhere after the first character, case-insensitively.
pub fn is_ordered(sql: &str) -> bool {
    sql.to_lowercase()
        .find(" order by ")
        .map_or(false, |pos| pos > 0)
}

/// Column identifier without its qualifier (text after the last `.`)
pub fn short_name(ident: &str) -> &str {
    match ident.rfind('.') {
        Some(index) => &ident[index + 1..],
        None => ident,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_secs(2)), "2.000s");
        assert_eq!(format_duration(Duration::from_millis(2500)), "2.500s");
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("hello", 10), "hello");
        assert_eq!(truncate_string("hello world", 8), "hello...");
        assert_eq!(truncate_string("héllo wörld", 8), "héllo...");
    }

    #[test]
    fn test_is_ordered() {
        assert!(is_ordered("SELECT a FROM t ORDER BY a"));
        assert!(is_ordered("select a from t\n order by a desc"));
        assert!(!is_ordered("SELECT a FROM t"));
        assert!(!is_ordered("SELECT a FROM t ORDER\tBY a"));
        // the clause must follow something
        assert!(!is_ordered(" order by a"));
    }

    #[test]
    fn test_short_name() {
        assert_eq!(short_name("pm1.g1.e1"), "e1");
        assert_eq!(short_name("e1"), "e1");
        assert_eq!(short_name("g1."), "");
    }
}
