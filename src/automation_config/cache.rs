//! WiredTiger cache sizing for database versions that misjudge container memory.

use semver::Version;

/// Smallest cache the engine accepts, in GB.
pub const MIN_CACHE_SIZE_GB: f64 = 0.256;

const BYTES_PER_GB: f64 = 1_000_000_000.0;

/// Cache override for `version` given the container memory limit, if one is needed.
///
/// Versions that fail to parse are treated as affected.
pub fn wired_tiger_cache_gb(version: &str, memory_limit_bytes: Option<u64>) -> Option<f32> {
    if !version_needs_cache_override(version) {
        return None;
    }
    let limit = memory_limit_bytes.filter(|bytes| *bytes != 0)?;
    let limit_gb = limit as f64 / BYTES_PER_GB;
    let cache = ((limit_gb - 1.0) * 0.5).max(MIN_CACHE_SIZE_GB);
    Some(((cache * 1000.0).floor() / 1000.0) as f32)
}

/// True for `>=4.0.0 <4.0.9` and `<3.6.13`.
pub fn version_needs_cache_override(version: &str) -> bool {
    let parsed = match Version::parse(version.trim_start_matches('v')) {
        Ok(parsed) => parsed,
        Err(_) => return true,
    };
    let core = Version::new(parsed.major, parsed.minor, parsed.patch);
    (core >= Version::new(4, 0, 0) && core < Version::new(4, 0, 9))
        || core < Version::new(3, 6, 13)
}

/// Parses an orchestrator memory quantity (`"8G"`, `"512Mi"`, `"1e9"`) into bytes.
pub fn parse_memory_quantity(quantity: &str) -> Option<u64> {
    const SUFFIXES: &[(&str, f64)] = &[
        ("Ki", 1024.0),
        ("Mi", 1024.0 * 1024.0),
        ("Gi", 1024.0 * 1024.0 * 1024.0),
        ("Ti", 1024.0 * 1024.0 * 1024.0 * 1024.0),
        ("Pi", 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0),
        ("k", 1e3),
        ("M", 1e6),
        ("G", 1e9),
        ("T", 1e12),
        ("P", 1e15),
    ];
    let quantity = quantity.trim();
    if quantity.is_empty() {
        return None;
    }
    let (number, multiplier) = SUFFIXES
        .iter()
        .find_map(|(suffix, multiplier)| {
            quantity
                .strip_suffix(suffix)
                .map(|number| (number, *multiplier))
        })
        .unwrap_or((quantity, 1.0));
    let value: f64 = number.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some((value * multiplier).round() as u64)
}
