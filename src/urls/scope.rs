//! Crawl scope: which normalized URLs are eligible for fetching.
//!
//! Rules run in a fixed order and the first failing rule decides:
//! scheme, then host allowlist, then path extension denylist.

use regex::Regex;
use tracing::error;

use super::NormalizedUrl;
use crate::error::UrlError;

/// Host suffixes the crawl is confined to.
pub const DEFAULT_ALLOWED_DOMAINS: &[&str] = &[
    "ics.uci.edu",
    "cs.uci.edu",
    "informatics.uci.edu",
    "stat.uci.edu",
];

/// Binary, media, archive and document formats that are never fetched.
pub const DEFAULT_DENIED_EXTENSIONS: &[&str] = &[
    "css", "js", "bmp", "gif", "jpg", "jpeg", "ico", "png", "tif", "tiff", "mid", "mp2", "mp3",
    "mp4", "wav", "avi", "mov", "mpeg", "ram", "m4v", "mkv", "ogg", "ogv", "pdf", "ps", "eps",
    "tex", "ppt", "pptx", "ppsx", "doc", "docx", "xls", "xlsx", "names", "data", "dat", "exe",
    "bz2", "tar", "msi", "bin", "7z", "psd", "dmg", "iso", "epub", "dll", "cnf", "tgz", "sha1",
    "apk", "db", "java", "thmx", "mso", "arff", "rtf", "jar", "csv", "sql", "war", "rm", "smil",
    "wmv", "swf", "wma", "zip", "rar", "gz",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeDecision {
    InScope,
    UnsupportedScheme,
    ForeignHost,
    DeniedExtension,
}

impl ScopeDecision {
    pub fn is_in_scope(self) -> bool {
        self == ScopeDecision::InScope
    }
}

#[derive(Debug, Clone)]
pub struct ScopeFilter {
    allowed_hosts: Option<Regex>,
    denied_extensions: Option<Regex>,
}

impl ScopeFilter {
    /// Builds the filter from plain domain suffixes (`ics.uci.edu`) and bare
    /// extensions (`pdf`). Both lists are matched case-insensitively.
    pub fn new<D, E>(allowed_domains: D, denied_extensions: E) -> Result<Self, regex::Error>
    where
        D: IntoIterator,
        D::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        let domains = alternation(allowed_domains, |d| d.trim_start_matches('.'));
        let extensions = alternation(denied_extensions, |e| e.trim_start_matches('.'));

        let allowed_hosts = domains
            .map(|alt| Regex::new(&format!(r"^(?:.+\.)?(?:{alt})$")))
            .transpose()?;
        let denied_extensions = extensions
            .map(|alt| Regex::new(&format!(r"\.(?:{alt})$")))
            .transpose()?;

        Ok(Self {
            allowed_hosts,
            denied_extensions,
        })
    }

    /// Parses `raw` and applies the scope rules. A parse failure is an
    /// error, not a `false`.
    pub fn is_valid(&self, raw: &str) -> Result<bool, UrlError> {
        let url = NormalizedUrl::parse(raw)?;
        Ok(self.admits(&url))
    }

    pub fn admits(&self, url: &NormalizedUrl) -> bool {
        self.decide(url).is_in_scope()
    }

    pub fn decide(&self, url: &NormalizedUrl) -> ScopeDecision {
        if !matches!(url.scheme(), "http" | "https") {
            return ScopeDecision::UnsupportedScheme;
        }

        let host_allowed = match (url.host(), &self.allowed_hosts) {
            (Some(host), Some(re)) => re.is_match(&host.to_lowercase()),
            _ => false,
        };
        if !host_allowed {
            return ScopeDecision::ForeignHost;
        }

        if let Some(re) = &self.denied_extensions {
            if re.is_match(&url.path().to_lowercase()) {
                return ScopeDecision::DeniedExtension;
            }
        }

        ScopeDecision::InScope
    }
}

impl Default for ScopeFilter {
    fn default() -> Self {
        match Self::new(DEFAULT_ALLOWED_DOMAINS, DEFAULT_DENIED_EXTENSIONS) {
            Ok(filter) => filter,
            Err(e) => {
                // Every URL is rejected from here on.
                error!("Default scope patterns failed to compile: {}", e);
                Self {
                    allowed_hosts: None,
                    denied_extensions: None,
                }
            }
        }
    }
}

fn alternation<I>(items: I, clean: impl Fn(&str) -> &str) -> Option<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let parts: Vec<String> = items
        .into_iter()
        .map(|item| clean(item.as_ref().trim()).to_lowercase())
        .filter(|item| !item.is_empty())
        .map(|item| regex::escape(&item))
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("|"))
    }
}
