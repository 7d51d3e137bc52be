//! Which tab URLs may receive a port.

/// `scheme://host[:port]` prefix of `url`, if it has an authority.
pub fn origin_of(url: &str) -> Option<&str> {
    let scheme_end = url.find("://")?;
    let rest = &url[scheme_end + 3..];
    let host_len = rest
        .find(|c: char| c == '/' || c == '?' || c == '#')
        .unwrap_or(rest.len());
    Some(&url[..scheme_end + 3 + host_len])
}

/// Browser-internal and extension schemes; content scripts never run there.
const INTERNAL_SCHEMES: &[&str] = &[
    "chrome",
    "chrome-extension",
    "edge",
    "about",
    "moz-extension",
    "devtools",
    "view-source",
    "brave",
    "data",
    "file",
];

/// Whether a port may be opened to a tab showing `url`. The extension's own
/// connect surface is never eligible.
pub fn is_eligible(url: &str, connect_origin: &str) -> bool {
    let Some((scheme, _)) = url.split_once(':') else {
        return false;
    };
    if scheme.is_empty() || INTERNAL_SCHEMES.iter().any(|s| s.eq_ignore_ascii_case(scheme)) {
        return false;
    }
    match origin_of(url) {
        Some(origin) => !origin.eq_ignore_ascii_case(connect_origin),
        None => true,
    }
}
