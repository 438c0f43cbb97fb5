//! URL equivalence, tracking-parameter stripping, and the authentication-URL
//! heuristic — the policy bits shared by `ViewManager`'s reload suppression
//! and `SnapshotStore`/`ViewPool`'s sensitive-URL checks.

use crate::config::CoreConfig;
use url::Url;

/// Schemes a navigation is allowed to target.
const ALLOWED_SCHEMES: &[&str] = &["http", "https", "about"];

/// Returns `true` if `url` is safe to navigate to under the Core's scheme policy.
///
/// `about:blank` is always allowed (it is the Core's own "empty tab" marker);
/// everything else must be `http(s)`.
pub fn is_navigable(url: &Url) -> bool {
    ALLOWED_SCHEMES.contains(&url.scheme())
}

/// Returns `true` if `url` matches the authentication-URL heuristic: either
/// its host or path contains one of the configured keywords (`oauth`, `sso`,
/// `login`, `signin`, `auth`, `finish_google_sso`, `callback` by default), or
/// its host is (or is a subdomain of) one of the configured identity-provider
/// domains.
pub fn is_authentication_url(url: &Url, config: &CoreConfig) -> bool {
    let haystack = format!(
        "{} {}",
        url.host_str().unwrap_or(""),
        url.path()
    )
    .to_ascii_lowercase();
    let keyword_match = config
        .auth_url_keywords
        .iter()
        .any(|kw| haystack.contains(kw.to_ascii_lowercase().as_str()));
    if keyword_match {
        return true;
    }

    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.to_ascii_lowercase();
    config
        .identity_provider_domains
        .iter()
        .any(|domain| {
            let domain = domain.to_ascii_lowercase();
            host == domain || host.ends_with(&format!(".{domain}"))
        })
}

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

fn trim_trailing_slash(path: &str) -> &str {
    if path == "/" {
        path
    } else {
        path.strip_suffix('/').unwrap_or(path)
    }
}

fn is_http_like(scheme: &str) -> bool {
    scheme == "http" || scheme == "https"
}

/// Returns the non-tracking, sorted `(key, value)` query pairs of `url`.
fn significant_query_pairs(url: &Url, config: &CoreConfig) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| {
            !config
                .tracking_params
                .iter()
                .any(|t| t.eq_ignore_ascii_case(k))
        })
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    pairs.sort();
    pairs
}

fn search_query_value(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == "q" || k == "query")
        .map(|(_, v)| v.into_owned())
}

/// The URL-equivalence relation used for reload suppression (§6): two URLs are
/// "the same page" if host (modulo `www.`), scheme class, and path agree, and
/// either the search-engine query term matches (for known search engines) or
/// the non-tracking query parameters match exactly.
pub fn urls_equivalent(a: &Url, b: &Url, config: &CoreConfig) -> bool {
    let host_a = a.host_str().map(strip_www);
    let host_b = b.host_str().map(strip_www);
    if host_a != host_b {
        return false;
    }
    if a.scheme() != b.scheme() && !(is_http_like(a.scheme()) && is_http_like(b.scheme())) {
        return false;
    }
    if trim_trailing_slash(a.path()) != trim_trailing_slash(b.path()) {
        return false;
    }

    let is_search_engine = host_a
        .map(|h| config.search_engine_hosts.iter().any(|s| s == h))
        .unwrap_or(false);

    if is_search_engine {
        search_query_value(a) == search_query_value(b)
    } else {
        significant_query_pairs(a, config) == significant_query_pairs(b, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> CoreConfig {
        CoreConfig::default()
    }

    fn u(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn search_engine_urls_equal_modulo_tracking_and_www() {
        let a = u("https://www.google.com/search?q=x&utm_source=y");
        let b = u("https://google.com/search?q=x");
        assert!(urls_equivalent(&a, &b, &cfg()));
    }

    #[test]
    fn different_search_terms_not_equal() {
        let a = u("https://google.com/search?q=cats");
        let b = u("https://google.com/search?q=dogs");
        assert!(!urls_equivalent(&a, &b, &cfg()));
    }

    #[test]
    fn non_search_engine_requires_matching_non_tracking_params() {
        let a = u("https://example.com/page?x=1&utm_source=z");
        let b = u("https://example.com/page?x=1");
        assert!(urls_equivalent(&a, &b, &cfg()));

        let c = u("https://example.com/page?x=2");
        assert!(!urls_equivalent(&a, &c, &cfg()));
    }

    #[test]
    fn different_hosts_not_equal() {
        let a = u("https://example.com/");
        let b = u("https://example.org/");
        assert!(!urls_equivalent(&a, &b, &cfg()));
    }

    #[test]
    fn trailing_slash_is_ignored() {
        let a = u("https://example.com/path");
        let b = u("https://example.com/path/");
        assert!(urls_equivalent(&a, &b, &cfg()));
    }

    #[test]
    fn http_and_https_are_equivalent_protocols() {
        let a = u("http://example.com/");
        let b = u("https://example.com/");
        assert!(urls_equivalent(&a, &b, &cfg()));
    }

    #[test]
    fn auth_url_heuristic_matches_known_patterns() {
        let url = u("https://accounts.google.com/o/oauth2/auth");
        assert!(is_authentication_url(&url, &cfg()));

        let plain = u("https://example.com/");
        assert!(!is_authentication_url(&plain, &cfg()));
    }

    #[test]
    fn auth_url_heuristic_matches_identity_provider_domain_without_keyword() {
        let url = u("https://github.com/some/random/path");
        assert!(is_authentication_url(&url, &cfg()));

        let subdomain = u("https://id.okta.com/anything");
        assert!(is_authentication_url(&subdomain, &cfg()));

        let unrelated = u("https://githubusercontent.com/path");
        assert!(!is_authentication_url(&unrelated, &cfg()));
    }

    #[test]
    fn scheme_policy_allows_http_https_about_only() {
        assert!(is_navigable(&u("https://example.com/")));
        assert!(is_navigable(&u("http://example.com/")));
        assert!(is_navigable(&u("about:blank")));
        assert!(!is_navigable(&u("file:///etc/passwd")));
    }
}
