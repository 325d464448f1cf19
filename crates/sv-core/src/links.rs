//! Link click interception.
//!
//! Decides whether a click that bubbled up to the document should open in the
//! panel instead of navigating. The DOM side extracts a [`ClickEvent`]; the
//! decision itself is pure.

use url::Url;

use crate::types::Modifiers;

/// Nearest enclosing hyperlink of a click target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTarget {
    /// Raw `href` attribute, unresolved.
    pub href: String,
    /// Link carries the `download` attribute.
    pub download: bool,
}

impl LinkTarget {
    pub fn new(href: impl Into<String>) -> Self {
        Self { href: href.into(), download: false }
    }
}

/// The parts of a DOM click event the decision depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClickEvent {
    pub default_prevented: bool,
    pub modifiers: Modifiers,
    pub link: Option<LinkTarget>,
}

impl ClickEvent {
    pub fn on_link(href: impl Into<String>) -> Self {
        Self {
            link: Some(LinkTarget::new(href)),
            ..Self::default()
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

/// Why a click was left to the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A page handler already took over (SPA router and the like).
    DefaultPrevented,
    NoLink,
    EmptyHref,
    ScriptUrl,
    FragmentOnly,
    /// New tab / new window intent.
    ModifierHeld,
    Download,
    Unresolvable,
    /// Same document, only the fragment differs.
    SamePageFragment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkDecision {
    /// Prevent navigation and open this absolute URL in the panel.
    Intercept(Url),
    Skip(SkipReason),
}

impl LinkDecision {
    pub fn url(&self) -> Option<&Url> {
        match self {
            Self::Intercept(url) => Some(url),
            Self::Skip(_) => None,
        }
    }
}

fn is_script_url(href: &str) -> bool {
    href.get(..11).is_some_and(|scheme| scheme.eq_ignore_ascii_case("javascript:"))
}

/// Decide what to do with a click on a page at `document_url`.
pub fn decide(click: &ClickEvent, document_url: &str) -> LinkDecision {
    use self::LinkDecision::Skip;

    if click.default_prevented {
        return Skip(SkipReason::DefaultPrevented);
    }
    let Some(link) = &click.link else {
        return Skip(SkipReason::NoLink);
    };

    let href = link.href.trim();
    if href.is_empty() {
        return Skip(SkipReason::EmptyHref);
    }
    if is_script_url(href) {
        return Skip(SkipReason::ScriptUrl);
    }
    if href.starts_with('#') {
        return Skip(SkipReason::FragmentOnly);
    }
    if !click.modifiers.is_empty() {
        return Skip(SkipReason::ModifierHeld);
    }
    if link.download {
        return Skip(SkipReason::Download);
    }

    let Ok(base) = Url::parse(document_url) else {
        return Skip(SkipReason::Unresolvable);
    };
    let Ok(target) = base.join(href) else {
        return Skip(SkipReason::Unresolvable);
    };
    if target.scheme() == "javascript" {
        return Skip(SkipReason::ScriptUrl);
    }

    let has_fragment = target.fragment().is_some_and(|f| !f.is_empty());
    if has_fragment && target.origin() == base.origin() && target.path() == base.path() {
        return Skip(SkipReason::SamePageFragment);
    }

    LinkDecision::Intercept(target)
}

/// Host shown in the "opened" toast; the raw URL if it has none.
pub fn display_host(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "https://x.test/page";

    #[test]
    fn test_plain_link_is_intercepted() {
        let decision = decide(&ClickEvent::on_link("https://x.test/page"), "https://y.test/");
        assert_eq!(decision.url().map(Url::as_str), Some("https://x.test/page"));
    }

    #[test]
    fn test_relative_link_resolves_against_document() {
        let decision = decide(&ClickEvent::on_link("../other?q=1"), "https://x.test/docs/page");
        assert_eq!(decision.url().map(Url::as_str), Some("https://x.test/other?q=1"));
    }

    #[test]
    fn test_modifier_keys_skip() {
        for mods in [Modifiers::SHIFT, Modifiers::CTRL, Modifiers::META, Modifiers::ALT] {
            let click = ClickEvent::on_link("https://x.test/page").with_modifiers(mods);
            assert_eq!(decide(&click, "https://y.test/"), LinkDecision::Skip(SkipReason::ModifierHeld));
        }
    }

    #[test]
    fn test_same_page_fragment_skips() {
        let click = ClickEvent::on_link("https://x.test/page#section");
        assert_eq!(decide(&click, PAGE), LinkDecision::Skip(SkipReason::SamePageFragment));

        let click = ClickEvent::on_link("#section");
        assert_eq!(decide(&click, PAGE), LinkDecision::Skip(SkipReason::FragmentOnly));
    }

    #[test]
    fn test_fragment_on_other_page_is_intercepted() {
        let click = ClickEvent::on_link("https://x.test/other#section");
        assert!(decide(&click, PAGE).url().is_some());
        let click = ClickEvent::on_link("https://z.test/page#section");
        assert!(decide(&click, PAGE).url().is_some());
    }

    #[test]
    fn test_query_change_with_fragment_on_same_path_skips() {
        let click = ClickEvent::on_link("/page?tab=2#section");
        assert_eq!(decide(&click, PAGE), LinkDecision::Skip(SkipReason::SamePageFragment));
    }

    #[test]
    fn test_skips_without_navigation_intent() {
        assert_eq!(decide(&ClickEvent::default(), PAGE), LinkDecision::Skip(SkipReason::NoLink));
        assert_eq!(decide(&ClickEvent::on_link("  "), PAGE), LinkDecision::Skip(SkipReason::EmptyHref));
        assert_eq!(
            decide(&ClickEvent::on_link("JavaScript:void(0)"), PAGE),
            LinkDecision::Skip(SkipReason::ScriptUrl)
        );

        let mut click = ClickEvent::on_link("/file.zip");
        click.link.as_mut().unwrap().download = true;
        assert_eq!(decide(&click, PAGE), LinkDecision::Skip(SkipReason::Download));

        let mut click = ClickEvent::on_link("https://x.test/next");
        click.default_prevented = true;
        assert_eq!(decide(&click, PAGE), LinkDecision::Skip(SkipReason::DefaultPrevented));
    }

    #[test]
    fn test_unresolvable_href_falls_back() {
        let click = ClickEvent::on_link("http://[::1");
        assert_eq!(decide(&click, PAGE), LinkDecision::Skip(SkipReason::Unresolvable));
        let click = ClickEvent::on_link("/next");
        assert_eq!(decide(&click, "not a url"), LinkDecision::Skip(SkipReason::Unresolvable));
    }

    #[test]
    fn test_display_host() {
        assert_eq!(display_host("https://news.x.test/a/b"), "news.x.test");
        assert_eq!(display_host("mailto:someone@x.test"), "mailto:someone@x.test");
    }
}
