//! Countdown display formatting

/// Format remaining time as `MM:SS`.
///
/// Rounds up to the whole second so `00:00` only appears once time is up.
/// Minutes are not wrapped at 60.
pub fn format_mm_ss(remaining_ms: u64) -> String {
    let total_secs = remaining_ms.div_ceil(1000);
    format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
}

#[cfg(test)]
mod tests {
    use super::format_mm_ss;

    #[test]
    fn formats_minutes_and_seconds() {
        assert_eq!(format_mm_ss(0), "00:00");
        assert_eq!(format_mm_ss(1), "00:01");
        assert_eq!(format_mm_ss(59_000), "00:59");
        assert_eq!(format_mm_ss(60_000), "01:00");
        assert_eq!(format_mm_ss(80 * 60_000), "80:00");
        assert_eq!(format_mm_ss(29 * 60_000 + 59_001), "30:00");
    }
}
