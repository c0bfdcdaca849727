/// Rewrites `name` from the `source` hierarchy delimiter to `destination`.
///
/// Literal occurrences of `destination` are escaped with a backslash first so
/// they stay part of the leaf name instead of becoming a new hierarchy level.
/// Already escaped input is not detected and gets escaped again.
pub fn normalize(name: &str, source: &str, destination: &str) -> String {
    if source.is_empty() || destination.is_empty() || source == destination {
        return name.to_string();
    }
    name.replace(destination, &format!("\\{}", destination))
        .replace(source, destination)
}
