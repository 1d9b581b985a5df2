//! Shared utility functions for string handling and best-effort operations.
//!
//! ## String Helpers
//!
//! - `truncate_chars` - Character-safe truncation with an ellipsis
//! - `slugify` - Lowercase, dash-separated keys from free text
//! - `format_duration_ms` - Human-readable durations for summaries

use std::fmt::Display;

// =============================================================================
// String Utilities
// =============================================================================

/// Keep the first `max_chars` characters, appending "..." when cut.
///
/// Counts `char`s, so multi-byte text is never split mid-character.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

/// Lowercase, dash-separated key built from alphanumeric runs.
pub fn slugify(s: &str) -> String {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// Format milliseconds as a short human-readable duration.
pub fn format_duration_ms(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else if ms < 3_600_000 {
        format!("{}m {}s", ms / 60_000, (ms % 60_000) / 1000)
    } else {
        format!("{}h {}m", ms / 3_600_000, (ms % 3_600_000) / 60_000)
    }
}

// =============================================================================
// Best-Effort Helpers
// =============================================================================

/// Log a failed side-channel operation at warn level and discard it.
///
/// For writes whose failure must never reach the caller's result path.
pub fn log_filter_warn<T, E: Display>(result: Result<T, E>, context: &str) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!("{}: {}", context, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("abcdef", 3), "abc...");
        assert_eq!(truncate_chars("exact", 5), "exact");
        // Multi-byte characters are counted, not bytes
        assert_eq!(truncate_chars("héllo wörld", 4), "héll...");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Injection vuln agent"), "injection-vuln-agent");
        assert_eq!(slugify("  Pre-recon  (code) "), "pre-recon-code");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn test_format_duration_ms() {
        assert_eq!(format_duration_ms(250), "250ms");
        assert_eq!(format_duration_ms(1500), "1.5s");
        assert_eq!(format_duration_ms(90_000), "1m 30s");
        assert_eq!(format_duration_ms(3_700_000), "1h 1m");
    }

    #[test]
    fn test_log_filter_warn() {
        let ok: Result<u8, String> = Ok(1);
        assert_eq!(log_filter_warn(ok, "ctx"), Some(1));
        let err: Result<u8, String> = Err("boom".to_string());
        assert_eq!(log_filter_warn(err, "ctx"), None);
    }
}
