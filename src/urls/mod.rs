//! URL canonicalization.
//!
//! A [`NormalizedUrl`] is the dedup key for the whole crawl: scheme, host and
//! path only. Fragments are stripped and the query string is dropped
//! wholesale, so `/page?x=1` and `/page?x=2` collapse into one entry.

use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::error::UrlError;

pub mod scope;

pub use scope::ScopeFilter;

/// Canonical `scheme://host/path` form of a URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedUrl(Url);

impl NormalizedUrl {
    /// Parses an absolute URL and normalizes it.
    pub fn parse(raw: &str) -> Result<Self, UrlError> {
        let url = Url::parse(raw.trim()).map_err(|source| UrlError::Malformed {
            url: raw.to_string(),
            source,
        })?;
        Ok(Self::from_url(url))
    }

    fn from_url(mut url: Url) -> Self {
        url.set_fragment(None);
        url.set_query(None);
        Self(url)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }

    pub fn scheme(&self) -> &str {
        self.0.scheme()
    }

    /// Lowercased host. `None` for host-less schemes such as `mailto:`.
    pub fn host(&self) -> Option<&str> {
        self.0.host_str()
    }

    pub fn path(&self) -> &str {
        self.0.path()
    }

    pub fn into_string(self) -> String {
        self.0.into()
    }
}

impl fmt::Display for NormalizedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NormalizedUrl {
    type Err = UrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for NormalizedUrl {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Resolves `raw` (absolute or relative) against `base` and normalizes it.
pub fn normalize(raw: &str, base: &Url) -> Result<NormalizedUrl, UrlError> {
    let joined = base.join(raw.trim()).map_err(|source| UrlError::Malformed {
        url: raw.to_string(),
        source,
    })?;
    Ok(NormalizedUrl::from_url(joined))
}

/// The `scheme://host[:port]/` root of a page.
pub fn host_base(page: &Url) -> Result<Url, UrlError> {
    if page.host_str().is_none() {
        return Err(UrlError::MissingHost(page.to_string()));
    }
    let mut base = page.clone();
    base.set_path("/");
    base.set_query(None);
    base.set_fragment(None);
    Ok(base)
}

/// Normalizes a link found on `page`, resolving relative references against
/// the page's scheme and host rather than its full path.
pub fn normalize_against_host(raw: &str, page: &Url) -> Result<NormalizedUrl, UrlError> {
    normalize(raw, &host_base(page)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn page(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    #[test]
    fn strips_query_and_fragment() {
        let url = NormalizedUrl::parse("https://www.ics.uci.edu/page?x=1#frag").unwrap();
        assert_eq!(url.as_str(), "https://www.ics.uci.edu/page");
    }

    #[test]
    fn relative_links_resolve_against_host_root() {
        let base = page("https://www.ics.uci.edu/a/b/page.html?x=1#frag");
        let about = normalize_against_host("/about", &base).unwrap();
        assert_eq!(about.as_str(), "https://www.ics.uci.edu/about");

        let sibling = normalize_against_host("people.html", &base).unwrap();
        assert_eq!(sibling.as_str(), "https://www.ics.uci.edu/people.html");
    }

    #[test]
    fn absolute_links_keep_their_own_host() {
        let base = page("https://www.ics.uci.edu/");
        let other = normalize_against_host("http://stat.uci.edu/x?y#z", &base).unwrap();
        assert_eq!(other.as_str(), "http://stat.uci.edu/x");
    }

    #[test]
    fn host_is_lowercased_and_port_kept() {
        let base = page("http://WWW.ICS.UCI.EDU:8080/dir/");
        let url = normalize_against_host("/Path", &base).unwrap();
        assert_eq!(url.as_str(), "http://www.ics.uci.edu:8080/Path");
        assert_eq!(url.host(), Some("www.ics.uci.edu"));
    }

    #[test]
    fn unparsable_input_is_rejected() {
        let base = page("https://www.ics.uci.edu/");
        assert!(matches!(
            normalize_against_host("http://[::1", &base),
            Err(UrlError::Malformed { .. })
        ));
        assert!(NormalizedUrl::parse("not a url").is_err());
    }

    #[test]
    fn host_base_requires_a_host() {
        let mail = page("mailto:someone@uci.edu");
        assert!(matches!(host_base(&mail), Err(UrlError::MissingHost(_))));
    }

    proptest! {
        #[test]
        fn normalization_is_idempotent(
            raw in "(http|https)://[a-z]{1,10}\\.(com|edu|org)(/[a-zA-Z0-9._~-]{0,8}){0,3}(\\?[a-z=&]{0,8})?(#[a-z]{0,5})?"
        ) {
            let once = NormalizedUrl::parse(&raw).unwrap();
            let twice = NormalizedUrl::parse(once.as_str()).unwrap();
            prop_assert_eq!(once, twice);
        }
    }
}
