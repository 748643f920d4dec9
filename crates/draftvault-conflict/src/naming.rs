/// Fixed substring inserted into a filename to denote a conflict copy.
pub const CONFLICT_MARKER: &str = "_conflicting_";

/// Compute the name for a conflict copy of `old_name` at `now_ms` (UTC
/// milliseconds).
///
/// The final extension is preserved. A name that already carries the marker
/// gets everything after the last marker replaced with the fresh timestamp,
/// so the marker never nests: at most one occurrence per name.
pub fn conflict_name(old_name: &str, now_ms: i64) -> String {
    let (stem, ext) = match old_name.rfind('.') {
        // A leading dot is a hidden-file prefix, not an extension.
        Some(idx) if idx > 0 => (&old_name[..idx], &old_name[idx..]),
        _ => (old_name, ""),
    };

    match stem.rfind(CONFLICT_MARKER) {
        Some(idx) => format!("{}{}{}", &stem[..idx + CONFLICT_MARKER.len()], now_ms, ext),
        None => format!("{}{}{}{}", stem, CONFLICT_MARKER, now_ms, ext),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_appends_marker_and_timestamp() {
        assert_eq!(
            conflict_name("report.dwg", 1_700_000_000_000),
            "report_conflicting_1700000000000.dwg"
        );
    }

    #[test]
    fn test_reconflict_replaces_timestamp() {
        let first = conflict_name("report.dwg", 1_700_000_000_000);
        let second = conflict_name(&first, 1_700_000_000_777);
        assert_eq!(second, "report_conflicting_1700000000777.dwg");
        assert_eq!(second.matches(CONFLICT_MARKER).count(), 1);
    }

    #[test]
    fn test_no_extension() {
        assert_eq!(
            conflict_name("README", 42),
            "README_conflicting_42"
        );
    }

    #[test]
    fn test_hidden_file_keeps_leading_dot() {
        assert_eq!(
            conflict_name(".drawingrc", 42),
            ".drawingrc_conflicting_42"
        );
    }

    #[test]
    fn test_multiple_dots_only_last_is_extension() {
        assert_eq!(
            conflict_name("site.plan.v2.dwg", 42),
            "site.plan.v2_conflicting_42.dwg"
        );
    }
}
