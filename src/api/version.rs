//! Kubernetes version comparison.

use semver::Version;

/// Parse a Kubernetes version, tolerating a leading `v` and a missing patch.
pub fn parse_version(version: &str) -> Option<Version> {
    let trimmed = version.trim().trim_start_matches('v');
    if let Ok(v) = Version::parse(trimmed) {
        return Some(v);
    }
    // "1.15" -> "1.15.0"
    if trimmed.split('.').count() == 2 {
        return Version::parse(&format!("{}.0", trimmed)).ok();
    }
    None
}

/// Whether `actual` is at least `min`. Pre-release tags are ignored so that
/// `1.18.0-beta.1` satisfies a `1.18.0` minimum. Unparseable versions never match.
pub fn is_kubernetes_version_ge(actual: &str, min: &str) -> bool {
    match (parse_version(actual), parse_version(min)) {
        (Some(a), Some(m)) => (a.major, a.minor, a.patch) >= (m.major, m.minor, m.patch),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_ge() {
        assert!(is_kubernetes_version_ge("1.12.0", "1.12.0"));
        assert!(is_kubernetes_version_ge("1.15.7", "1.12.0"));
        assert!(!is_kubernetes_version_ge("1.11.9", "1.12.0"));
        assert!(is_kubernetes_version_ge("1.18.0-beta.1", "1.18.0"));
        assert!(is_kubernetes_version_ge("v1.16", "1.16.0"));
    }

    #[test]
    fn test_invalid_version_never_matches() {
        assert!(!is_kubernetes_version_ge("", "1.0.0"));
        assert!(!is_kubernetes_version_ge("latest", "1.0.0"));
    }
}
