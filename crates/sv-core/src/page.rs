//! Page identity for per-site persisted state.

use std::fmt;

use url::Url;

use crate::types::KEY_PREFIX;

/// Error type for page key derivation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PageKeyError {
    #[error("Invalid page URL '{0}'")]
    InvalidUrl(String),
    #[error("Page URL has no path hierarchy: {0}")]
    MissingHost(String),
}

/// Stable identity of a page: origin host plus path.
///
/// Query and fragment are ignored, as is the port. Host-less hierarchical
/// URLs (`file:`) key on the path alone. The key doubles as the storage key
/// of the page's saved panel state.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageKey(String);

impl PageKey {
    pub fn from_url(url: &Url) -> Result<Self, PageKeyError> {
        if url.cannot_be_a_base() {
            return Err(PageKeyError::MissingHost(url.to_string()));
        }
        let host = url.host_str().unwrap_or("");
        let path = match url.path() {
            "" => "/",
            path => path,
        };
        Ok(Self(format!("{KEY_PREFIX}{host}{path}")))
    }

    pub fn parse(location: &str) -> Result<Self, PageKeyError> {
        let url = Url::parse(location).map_err(|_| PageKeyError::InvalidUrl(location.to_string()))?;
        Self::from_url(&url)
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_key_ignores_query_and_fragment() {
        let a = PageKey::parse("https://x.test/docs/page?q=1#top").unwrap();
        let b = PageKey::parse("https://x.test/docs/page").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "splitview_x.test/docs/page");
    }

    #[test]
    fn test_page_key_root_path() {
        assert_eq!(PageKey::parse("https://x.test").unwrap().as_str(), "splitview_x.test/");
    }

    #[test]
    fn test_page_key_ignores_port_and_scheme() {
        let a = PageKey::parse("http://x.test:8080/a").unwrap();
        let b = PageKey::parse("https://x.test/a").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_page_key_for_local_file() {
        let key = PageKey::parse("file:///home/u/notes.html?x#y").unwrap();
        assert_eq!(key.as_str(), "splitview_/home/u/notes.html");
    }

    #[test]
    fn test_page_key_errors() {
        assert!(matches!(PageKey::parse("not a url"), Err(PageKeyError::InvalidUrl(_))));
        assert!(matches!(PageKey::parse("data:text/html,hi"), Err(PageKeyError::MissingHost(_))));
        assert!(matches!(PageKey::parse("about:blank"), Err(PageKeyError::MissingHost(_))));
    }
}
