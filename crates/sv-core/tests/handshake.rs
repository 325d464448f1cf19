//! End-to-end replay of the activation handshake across forced reloads.

use std::rc::Rc;

use serde_json::json;
use sv_core::store::{ACTIVE_PAGES_KEY, CSP_READY_KEY};
use sv_core::testing::RecordingHost;
use sv_core::{
    ClickEvent, DirectBridge, MemorySessionRules, MemoryStore, OverlayConfig, OverlayController, OverlayState,
    RuleController, TabId,
};

type Controller = OverlayController<Rc<MemoryStore>, DirectBridge<Rc<MemorySessionRules>>, Rc<RecordingHost>>;

/// One browser profile: shared store and session rules.
struct Browser {
    store: Rc<MemoryStore>,
    rules: Rc<MemorySessionRules>,
    background: Rc<RuleController<Rc<MemorySessionRules>>>,
}

impl Browser {
    fn new() -> Self {
        let rules = Rc::new(MemorySessionRules::new());
        Self {
            store: Rc::new(MemoryStore::new()),
            background: Rc::new(RuleController::new(rules.clone())),
            rules,
        }
    }

    /// Load `url` in `tab` and run the page-load initialization.
    async fn load(&self, tab: i32, url: &str) -> (Controller, Rc<RecordingHost>) {
        let host = Rc::new(RecordingHost::new(url));
        host.set_viewport_width(1600.0);
        let bridge = DirectBridge::new(self.background.clone(), TabId::new(tab));
        let controller = OverlayController::new(OverlayConfig::default(), self.store.clone(), bridge, host.clone()).unwrap();
        controller.initialize().await;
        (controller, host)
    }
}

const PAGE: &str = "https://x.test/page";

#[tokio::test(flavor = "current_thread")]
async fn test_toggle_reload_restore() {
    let browser = Browser::new();

    let (first, host) = browser.load(7, PAGE).await;
    assert_eq!(first.state(), OverlayState::Inactive);
    host.set_scroll_y(900);
    first.toggle().await;
    assert_eq!(host.reloads(), 1);
    assert!(browser.rules.rule(7).is_some());

    let (second, host) = browser.load(7, PAGE).await;
    assert_eq!(second.state(), OverlayState::ActiveHidden);
    assert_eq!(host.reloads(), 0);
    assert_eq!(host.scrolled_to(), Some(900));
    assert!(!browser.store.contains(CSP_READY_KEY));

    assert!(second.handle_click(&ClickEvent::on_link("https://y.test/")));
    assert_eq!(second.state(), OverlayState::ActiveVisible);
}

#[tokio::test(flavor = "current_thread")]
async fn test_consumed_marker_is_not_reused() {
    let browser = Browser::new();
    browser.store.insert(ACTIVE_PAGES_KEY, json!({ "splitview_x.test/page": true }));
    browser.store.insert(CSP_READY_KEY, json!({ "pageKey": "splitview_x.test/page", "scrollY": 0 }));

    let (first, host) = browser.load(3, PAGE).await;
    assert_eq!(first.state(), OverlayState::ActiveHidden);
    assert_eq!(host.reloads(), 0);
    assert!(!browser.store.contains(CSP_READY_KEY));

    // An unrelated later load must not restore from the consumed marker: it
    // installs the bypass itself, reloads once, and the reload then settles.
    let (second, host) = browser.load(4, PAGE).await;
    assert_eq!(second.state(), OverlayState::PendingBypass);
    assert_eq!(host.reloads(), 1);
    assert!(browser.rules.rule(4).is_some());

    let (third, host) = browser.load(4, PAGE).await;
    assert_eq!(third.state(), OverlayState::ActiveHidden);
    assert_eq!(host.reloads(), 0);
}

#[tokio::test(flavor = "current_thread")]
async fn test_width_survives_deactivate_and_reactivate() {
    let browser = Browser::new();

    let (page, _) = browser.load(2, PAGE).await;
    page.toggle().await;
    let (page, _) = browser.load(2, PAGE).await;
    page.open_url("https://y.test/");
    page.begin_resize(1000.0);
    page.resize_to(850.0);
    page.end_resize().await;
    assert_eq!(page.panel_width(), 600);

    page.toggle().await;
    assert_eq!(page.state(), OverlayState::Inactive);
    assert!(browser.rules.is_empty());

    let (page, _) = browser.load(2, PAGE).await;
    assert_eq!(page.state(), OverlayState::Inactive);
    page.toggle().await;
    let (page, host) = browser.load(2, PAGE).await;
    assert_eq!(page.state(), OverlayState::ActiveHidden);
    assert_eq!(page.panel_width(), 600);
    assert_eq!(host.panel_width(), 600);
}

#[tokio::test(flavor = "current_thread")]
async fn test_closed_tab_rule_is_collected() {
    let browser = Browser::new();
    let (page, _) = browser.load(9, PAGE).await;
    page.toggle().await;
    assert!(browser.background.is_active(TabId::new(9).unwrap()));

    browser.background.on_tab_removed(TabId::new(9).unwrap()).await;
    assert!(browser.rules.is_empty());

    // Identifier reuse by a new tab starts from a clean slate.
    let (page, host) = browser.load(9, "https://z.test/").await;
    assert_eq!(page.state(), OverlayState::Inactive);
    assert_eq!(host.reloads(), 0);
    assert!(browser.rules.is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn test_pages_are_tracked_independently() {
    let browser = Browser::new();
    let (page, _) = browser.load(5, PAGE).await;
    page.toggle().await;
    let (_restored, _) = browser.load(5, PAGE).await;

    let (other, host) = browser.load(5, "https://x.test/other").await;
    assert_eq!(other.state(), OverlayState::Inactive);
    assert_eq!(host.reloads(), 0);
    assert!(!other.handle_click(&ClickEvent::on_link("https://y.test/")));
}
