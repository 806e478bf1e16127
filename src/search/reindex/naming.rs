//! Versioned index names: alias `A`, indices `A1`, `A2`, ...

/// Name of version `n` under `alias`
pub fn index_name(alias: &str, version: u64) -> String {
    format!("{}{}", alias, version)
}

/// Numeric suffix of `name` when it is a version of `alias`
pub fn parse_version(alias: &str, name: &str) -> Option<u64> {
    let suffix = name.strip_prefix(alias)?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok().filter(|v| *v >= 1)
}

/// Highest existing version and its index name
pub fn latest_version(alias: &str, existing: &[String]) -> Option<(u64, String)> {
    existing
        .iter()
        .filter_map(|name| parse_version(alias, name).map(|v| (v, name.clone())))
        .max_by_key(|(v, _)| *v)
}

/// Next version to create.
///
/// `high_water` is the largest version handed out before; it keeps dropped
/// versions from being reused even though they no longer appear in `existing`.
pub fn next_index_name(alias: &str, existing: &[String], high_water: u64) -> (u64, String) {
    let current = latest_version(alias, existing).map_or(0, |(v, _)| v);
    let next = current.max(high_water) + 1;
    (next, index_name(alias, next))
}
