//! Human-readable byte sizes.

#![allow(clippy::cast_precision_loss)]

const KB: i64 = 1024;
const MB: i64 = KB * 1024;
const GB: i64 = MB * 1024;

/// Marker rendered for a size that could not be measured.
pub const UNKNOWN_SIZE_MARKER: &str = "?";

/// Unit picked by [`format_size`], ordered smallest to largest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SizeUnit {
    B,
    KB,
    MB,
    GB,
}

impl SizeUnit {
    /// Largest unit whose magnitude for `bytes` is at least 1.
    #[must_use]
    pub const fn for_bytes(bytes: i64) -> Self {
        if bytes >= GB {
            Self::GB
        } else if bytes >= MB {
            Self::MB
        } else if bytes >= KB {
            Self::KB
        } else {
            Self::B
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::B => "B",
            Self::KB => "KB",
            Self::MB => "MB",
            Self::GB => "GB",
        }
    }

    const fn divisor(self) -> i64 {
        match self {
            Self::B => 1,
            Self::KB => KB,
            Self::MB => MB,
            Self::GB => GB,
        }
    }
}

/// Format a byte count; negative counts mean "unknown" and render as `?`.
///
/// Binary (1024-based) units, one fractional digit above bytes:
/// `0 → "0 B"`, `1536 → "1.5 KB"`, `1073741824 → "1.0 GB"`.
#[must_use]
pub fn format_size(bytes: i64) -> String {
    if bytes < 0 {
        return UNKNOWN_SIZE_MARKER.to_string();
    }
    let unit = SizeUnit::for_bytes(bytes);
    match unit {
        SizeUnit::B => format!("{bytes} B"),
        _ => format!(
            "{:.1} {}",
            bytes as f64 / unit.divisor() as f64,
            unit.label()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn formats_reference_values() {
        assert_eq!(format_size(-1), "?");
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(1_048_576), "1.0 MB");
        assert_eq!(format_size(1_073_741_824), "1.0 GB");
        assert_eq!(format_size(5 * 1_073_741_824), "5.0 GB");
    }

    #[test]
    fn any_negative_is_unknown() {
        assert_eq!(format_size(i64::MIN), "?");
        assert_eq!(format_size(-4096), "?");
    }

    #[test]
    fn gigabytes_is_the_ceiling_unit() {
        assert!(format_size(i64::MAX).ends_with(" GB"));
    }

    proptest! {
        #[test]
        fn unit_choice_is_monotonic(a in 0i64..(1i64 << 42), b in 0i64..(1i64 << 42)) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(SizeUnit::for_bytes(lo) <= SizeUnit::for_bytes(hi));
        }

        #[test]
        fn rendered_label_matches_unit(bytes in 0i64..(1i64 << 42)) {
            let rendered = format_size(bytes);
            let unit = SizeUnit::for_bytes(bytes);
            let suffix = format!(" {}", unit.label());
            prop_assert!(rendered.ends_with(&suffix));
        }
    }
}
