use crate::principal::Principal;

/// The wildcard token shared by every facet.
pub const WILDCARD: &str = "*";

/// Split a comma-separated facet into trimmed, non-empty tokens.
///
/// When `fold_case` is set each token is lowercased as well. IP patterns keep
/// their case; every other facet folds it.
pub fn split_tokens(text: &str, fold_case: bool) -> impl Iterator<Item = String> + '_ {
    text.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(move |t| {
            if fold_case {
                t.to_lowercase()
            } else {
                t.to_string()
            }
        })
}

/// Check whether `address` matches a single IP pattern.
///
/// * `*` matches every address.
/// * A pattern without `*` must equal the address exactly.
/// * Otherwise the text before the first `*` must be a prefix of the address.
///   Anything after that first `*` is ignored.
pub fn matches_ip_pattern(pattern: &str, address: &str) -> bool {
    if pattern == WILDCARD || pattern == address {
        return true;
    }
    match pattern.find('*') {
        Some(pos) => address.starts_with(&pattern[..pos]),
        None => false,
    }
}

/// Check `address` against a list of IP patterns (OR).
///
/// An empty list matches everything. Rules never build one, since the address
/// facet defaults to `*`.
pub fn matches_address(patterns: &[String], address: &str) -> bool {
    patterns.is_empty() || patterns.iter().any(|p| matches_ip_pattern(p, address))
}

/// Check the principal against a role list (OR). An empty list matches nothing.
pub fn matches_roles<P: Principal + ?Sized>(roles: &[String], principal: &P) -> bool {
    roles
        .iter()
        .any(|role| role == WILDCARD || principal.has_role(role))
}

/// True when an IP pattern uses `*` anywhere other than as its last character.
pub fn has_inner_wildcard(pattern: &str) -> bool {
    pattern
        .find('*')
        .is_some_and(|pos| pos + 1 != pattern.len())
}
