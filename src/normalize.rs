//! URL canonicalization
//!
//! Every URL that flows through the pipeline is keyed by its normalized form:
//! scheme defaulted to `https`, query and fragment dropped, trailing slashes
//! removed from non-root paths. Input that cannot be parsed is returned as is
//! so one bad row never aborts a batch.

use std::collections::HashSet;

use url::Url;

const DEFAULT_SCHEME: &str = "https";

/// Normalize a URL string into the key used by the store.
///
/// The function is pure and idempotent:
/// `normalize_url(&normalize_url(s)) == normalize_url(s)` for every `s`.
pub fn normalize_url(raw: &str) -> String {
    let mut url = match parse_with_default_scheme(raw.trim()) {
        Some(url) => url,
        None => return raw.to_string(),
    };

    url.set_query(None);
    url.set_fragment(None);

    let path = url.path();
    if path != "/" && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/');
        let trimmed = if trimmed.is_empty() { "/" } else { trimmed }.to_string();
        url.set_path(&trimmed);
    }

    url.to_string()
}

/// Normalize candidates and drop duplicates and blanks, keeping first-seen order
pub fn normalize_unique<I, S>(candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .map(|candidate| normalize_url(candidate.as_ref()))
        .filter(|url| !url.trim().is_empty())
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

/// Parse `raw`, prefixing `https://` unless it already names a scheme.
///
/// Input that parses with a host is taken as is. Otherwise a leading
/// `scheme://` is honoured only when the scheme is syntactically valid, so a
/// `://` inside the path or query does not count.
fn parse_with_default_scheme(raw: &str) -> Option<Url> {
    if let Ok(url) = Url::parse(raw) {
        if url.has_host() {
            return Some(url);
        }
    }

    let candidate = if has_explicit_scheme(raw) {
        raw.to_string()
    } else if let Some(rest) = raw.strip_prefix("//") {
        format!("{}://{}", DEFAULT_SCHEME, rest)
    } else {
        format!("{}://{}", DEFAULT_SCHEME, raw)
    };

    Url::parse(&candidate).ok()
}

fn has_explicit_scheme(raw: &str) -> bool {
    raw.split_once("://").is_some_and(|(scheme, _)| {
        let mut chars = scheme.chars();
        chars.next().is_some_and(|c| c.is_ascii_alphabetic())
            && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_and_scheme_equivalence() {
        let expected = "https://x.com/a";
        assert_eq!(normalize_url("https://x.com/a/"), expected);
        assert_eq!(normalize_url("https://x.com/a"), expected);
        assert_eq!(normalize_url("x.com/a"), expected);
        assert_eq!(normalize_url("//x.com/a/"), expected);
        assert_eq!(normalize_url("x.com/a?next=http://y.com"), expected);
        assert_eq!(normalize_url("x.com/a/#see=https://y.com"), expected);
        assert_eq!(normalize_url("https:/x.com/a/"), expected);
    }

    #[test]
    fn test_query_and_fragment_erased() {
        assert_eq!(
            normalize_url("https://x.com/a?q=1#frag"),
            normalize_url("https://x.com/a")
        );
        assert_eq!(normalize_url("https://x.com/?utm=1"), "https://x.com/");
    }

    #[test]
    fn test_root_path_kept() {
        assert_eq!(normalize_url("https://x.com"), "https://x.com/");
        assert_eq!(normalize_url("https://x.com/"), "https://x.com/");
        assert_eq!(normalize_url("x.com"), "https://x.com/");
    }

    #[test]
    fn test_explicit_scheme_preserved() {
        assert_eq!(normalize_url("http://x.com/a/"), "http://x.com/a");
    }

    #[test]
    fn test_unparseable_input_returned_unchanged() {
        assert_eq!(normalize_url(""), "");
        assert_eq!(normalize_url("http://[::1"), "http://[::1");
        assert_eq!(normalize_url("https://exa mple.com"), "https://exa mple.com");
    }

    #[test]
    fn test_normalize_unique_dedups_in_order() {
        let urls = normalize_unique([
            "https://x.com/b/",
            "x.com/a",
            "",
            "https://x.com/b?page=2",
            "https://x.com/a#top",
        ]);
        assert_eq!(urls, vec!["https://x.com/b", "https://x.com/a"]);
    }

    #[test]
    fn test_idempotence() {
        let inputs = [
            "https://x.com/a/",
            "x.com/a//",
            "HTTPS://X.COM:443/A/b/?x=1#y",
            "//cdn.x.com/img/",
            "https://x.com/a/./b/../",
            "not a url at all",
            "",
            "https://x.com/%7Euser/",
            "mailto:someone@x.com",
            "x.com/a?next=http://y.com",
            "x.com/go/https://y.com/b/",
            "https:/x.com/a/",
            "http://[::1",
        ];
        for input in inputs {
            let once = normalize_url(input);
            assert_eq!(normalize_url(&once), once, "input: {input}");
        }
    }
}
