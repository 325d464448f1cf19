//! Offline replay of the activation handshake.
//!
//! Drives real controllers against an in-memory store, in-memory session
//! rules and a recording page, reloading the page whenever the overlay asks.

use std::rc::Rc;

use sv_core::testing::{HostEvent, RecordingHost};
use sv_core::{
    ClickEvent, DirectBridge, MemorySessionRules, MemoryStore, OverlayConfig, OverlayController, OverlayState,
    RuleController, TabId,
};

pub struct SimulateOptions {
    pub url: String,
    pub tab_id: i32,
    pub scroll_y: i32,
    pub clicks: Vec<String>,
    pub fail_bypass: bool,
    pub deactivate: bool,
    pub config: OverlayConfig,
}

type Page = OverlayController<Rc<MemoryStore>, DirectBridge<Rc<MemorySessionRules>>, Rc<RecordingHost>>;

struct Session {
    options: SimulateOptions,
    store: Rc<MemoryStore>,
    rules: Rc<MemorySessionRules>,
    background: Rc<RuleController<Rc<MemorySessionRules>>>,
    loads: usize,
}

/// Reloads allowed before the run is declared a loop.
const MAX_LOADS: usize = 4;

pub fn run_simulation(options: SimulateOptions) -> Result<(), String> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start tokio runtime: {}", e))?;

    let rules = Rc::new(MemorySessionRules::new());
    if options.fail_bypass {
        rules.fail_with("simulated rule update failure");
    }
    let session = Session {
        options,
        store: Rc::new(MemoryStore::new()),
        background: Rc::new(RuleController::new(rules.clone())),
        rules,
        loads: 0,
    };
    runtime.block_on(session.run())
}

impl Session {
    async fn load(&mut self) -> Result<(Page, Rc<RecordingHost>), String> {
        self.loads += 1;
        if self.loads > MAX_LOADS {
            return Err(format!("Page reloaded more than {} times; handshake is looping", MAX_LOADS - 1));
        }

        let host = Rc::new(RecordingHost::new(&self.options.url));
        host.set_scroll_y(self.options.scroll_y);
        let bridge = DirectBridge::new(self.background.clone(), TabId::new(self.options.tab_id));
        let page = OverlayController::new(self.options.config.clone(), self.store.clone(), bridge, host.clone())
            .map_err(|e| e.to_string())?;

        let state = page.initialize().await;
        println!("load #{} {} -> {:?}", self.loads, page.page_key(), state);
        print_events(&host);
        Ok((page, host))
    }

    /// Load, and keep loading while the page asks for a reload.
    async fn settle(&mut self) -> Result<(Page, Rc<RecordingHost>), String> {
        let (mut page, mut host) = self.load().await?;
        while page.state() == OverlayState::PendingBypass && host.reloads() > 0 {
            (page, host) = self.load().await?;
        }
        Ok((page, host))
    }

    async fn run(mut self) -> Result<(), String> {
        let (mut page, mut host) = self.settle().await?;

        if page.state() == OverlayState::Inactive {
            println!("toggle");
            page.toggle().await;
            print_events(&host);
            if host.reloads() > 0 {
                (page, host) = self.settle().await?;
            }
        }

        for href in &self.options.clicks {
            let intercepted = page.handle_click(&ClickEvent::on_link(href.as_str()));
            println!("click {} -> {}", href, if intercepted { "panel" } else { "browser" });
            print_events(&host);
        }

        if self.options.deactivate && page.is_active() {
            println!("toggle");
            page.toggle().await;
            print_events(&host);
        }

        println!();
        println!("Final state: {:?}", page.state());
        println!("Session rules: {}", self.rules.len());
        for rule in self.rules.rules() {
            println!("  #{} tabs={:?} types={:?}", rule.id, rule.condition.tab_ids, rule.condition.resource_types);
        }
        println!("Store:");
        let store = serde_json::Value::Object(self.store.snapshot());
        println!(
            "{}",
            serde_json::to_string_pretty(&store).map_err(|e| format!("Failed to render store: {}", e))?
        );
        Ok(())
    }
}

fn print_events(host: &RecordingHost) {
    for event in host.take_events() {
        match event {
            HostEvent::Toast(toast) => match toast.subtitle() {
                Some(subtitle) => println!("    toast: {} ({})", toast.title(), subtitle),
                None => println!("    toast: {}", toast.title()),
            },
            other => println!("    {:?}", other),
        }
    }
}
