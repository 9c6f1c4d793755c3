//! Dotted version string comparison.
//!
//! Release tags come from the feed as `v3.0.5`-style strings with an
//! arbitrary number of segments. Comparison is numeric per segment, so
//! `1.10.0 > 1.9.9` and `1.2 == 1.2.0`.

use std::cmp::Ordering;

/// Compare two dotted version strings numerically.
///
/// Rules:
/// - a leading non-numeric prefix (`v`, `V`) is stripped
/// - segments are compared left to right as integers
/// - missing trailing segments count as 0 (`1.2` equals `1.2.0`)
/// - non-numeric segments count as 0 rather than failing
///
/// Never fails: malformed input degrades to a 0-filled comparison.
pub fn compare(a: &str, b: &str) -> Ordering {
    let a = segments(a);
    let b = segments(b);
    let len = a.len().max(b.len());

    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    Ordering::Equal
}

/// Returns `true` if `candidate` is strictly newer than `current`.
pub fn is_newer(candidate: &str, current: &str) -> bool {
    compare(candidate, current) == Ordering::Greater
}

/// Strip a leading `v`/`V` prefix from a version tag.
pub fn strip_prefix(tag: &str) -> &str {
    tag.trim_start_matches(['v', 'V'])
}

fn segments(version: &str) -> Vec<u64> {
    strip_prefix(version.trim())
        .split('.')
        .map(|s| s.parse::<u64>().unwrap_or(0))
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn equal_versions() {
        assert_eq!(compare("3.0.4", "3.0.4"), Ordering::Equal);
        assert_eq!(compare("1.2", "1.2.0"), Ordering::Equal);
        assert_eq!(compare("1.2.0.0", "1.2"), Ordering::Equal);
    }

    #[test]
    fn numeric_not_lexicographic() {
        assert_eq!(compare("1.10.0", "1.9.9"), Ordering::Greater);
        assert_eq!(compare("0.2.0", "0.10.0"), Ordering::Less);
    }

    #[test]
    fn prefix_is_stripped() {
        assert_eq!(compare("v3.0.5", "3.0.5"), Ordering::Equal);
        assert!(is_newer("v3.0.5", "3.0.4"));
    }

    #[test]
    fn malformed_segments_degrade_to_zero() {
        assert_eq!(compare("1.x.0", "1.0.0"), Ordering::Equal);
        assert_eq!(compare("garbage", "0"), Ordering::Equal);
        assert_eq!(compare("1.beta", "1.1"), Ordering::Less);
    }

    #[test]
    fn antisymmetry_and_reflexivity() {
        let versions = ["3.0.4", "3.0.5", "1.2", "1.2.0", "2.0", "v10.0.1", "0.0.1"];
        for a in versions {
            assert_eq!(compare(a, a), Ordering::Equal);
            for b in versions {
                assert_eq!(compare(a, b), compare(b, a).reverse());
            }
        }
    }

    #[test]
    fn arbitrary_segment_counts() {
        assert_eq!(compare("1.2.3.4.5", "1.2.3.4.5"), Ordering::Equal);
        assert_eq!(compare("1.2.3.4.5", "1.2.3.4"), Ordering::Greater);
    }
}
