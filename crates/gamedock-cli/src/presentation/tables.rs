//! Table formatting utilities for CLI output.

/// Truncates a string to a maximum number of characters, adding "..." if needed.
///
/// # Examples
///
/// ```rust
/// use gamedock_cli::presentation::truncate_string;
///
/// assert_eq!(truncate_string("Portal", 10), "Portal");
/// assert_eq!(truncate_string("Half-Life 2: Episode One", 12), "Half-Life...");
/// ```
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// Print a horizontal separator line.
pub fn print_separator(width: usize) {
    println!("{}", "-".repeat(width));
}

/// Format an optional value for table display, returning a default if None.
pub fn format_optional<T: std::fmt::Display>(value: Option<T>, default: &str) -> String {
    value.map_or_else(|| default.to_string(), |v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_counts_characters() {
        assert_eq!(truncate_string("Ōkami HD", 8), "Ōkami HD");
        assert_eq!(truncate_string("Ōkami HD Remaster", 8), "Ōkami...");
    }

    #[test]
    fn test_format_optional() {
        assert_eq!(format_optional(Some(3), "--"), "3");
        assert_eq!(format_optional(None::<u32>, "--"), "--");
    }
}
