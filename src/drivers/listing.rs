use crate::types::RemoteFileRef;
/// Picks remote file paths out of a free-text directory listing.
///
/// No attempt is made to parse the listing format; any whitespace-separated
/// token that starts with `prefix` and ends with `extension` is accepted.
/// Order is first-seen, duplicates are dropped.
pub fn resolve_listing(listing: &str, prefix: &str, extension: &str) -> Vec<RemoteFileRef> {
    let mut found: Vec<RemoteFileRef> = Vec::new();
    for token in listing.lines().flat_map(str::split_whitespace) {
        if token.len() > prefix.len() && token.starts_with(prefix) && token.ends_with(extension) {
            let candidate = RemoteFileRef::new(token);
            if !found.contains(&candidate) {
                found.push(candidate);
            }
        }
    }
    found
}
