use crate::config::CrawlPolicy;
use url::Url;

/// Checks if a host matches a wildcard pattern
///
/// `"example.com"` matches only itself; `"*.example.com"` matches the bare
/// domain and any subdomain at any depth.
///
/// ```
/// use site_scribe::url::matches_wildcard;
///
/// assert!(matches_wildcard("*.example.com", "docs.example.com"));
/// assert!(matches_wildcard("*.example.com", "example.com"));
/// assert!(!matches_wildcard("*.example.com", "notexample.com"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    if let Some(base) = pattern.strip_prefix("*.") {
        candidate == base || candidate.ends_with(&format!(".{}", base))
    } else {
        candidate == pattern
    }
}

/// Lowercased host of a URL, if it has one
pub fn extract_host(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Restricts a crawl to the website of its root URL
///
/// A link is in scope when it lives on the root's host (or one of its
/// subdomains when allowed), and its path is not excluded by extension or
/// path fragment.
#[derive(Debug, Clone)]
pub struct ScopePolicy {
    host_pattern: String,
    port: Option<u16>,
    exclude_extensions: Vec<String>,
    exclude_paths: Vec<String>,
}

impl ScopePolicy {
    /// Builds the scope of a job from its (normalized) root URL
    pub fn from_root(root: &Url, policy: &CrawlPolicy) -> Self {
        let host = extract_host(root).unwrap_or_default();
        let host_pattern = if policy.allow_subdomains {
            format!("*.{}", host)
        } else {
            host
        };

        Self {
            host_pattern,
            port: root.port(),
            exclude_extensions: lowercase_all(&policy.exclude_extensions),
            exclude_paths: lowercase_all(&policy.exclude_paths),
        }
    }

    /// Returns true if the URL belongs to the crawled website
    pub fn in_scope(&self, url: &Url) -> bool {
        let Some(host) = extract_host(url) else {
            return false;
        };

        if !matches_wildcard(&self.host_pattern, &host) {
            return false;
        }

        // same host on another explicit port is another site
        if url.port() != self.port {
            return false;
        }

        !self.is_excluded(url)
    }

    fn is_excluded(&self, url: &Url) -> bool {
        let path = url.path().to_lowercase();
        if self
            .exclude_extensions
            .iter()
            .any(|ext| path.ends_with(ext.as_str()))
        {
            return true;
        }

        self.exclude_paths
            .iter()
            .any(|fragment| path.contains(fragment.as_str()))
    }
}

fn lowercase_all(values: &[String]) -> Vec<String> {
    values.iter().map(|v| v.to_lowercase()).collect()
}
