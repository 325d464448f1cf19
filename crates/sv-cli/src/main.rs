//! SplitView CLI
//!
//! Developer tool for inspecting bypass rules, page keys, link decisions,
//! replaying the activation handshake offline and exporting the TypeScript
//! message contract.

use std::fs;
use std::path::Path;

use clap::{Parser, Subcommand};
use log::LevelFilter;
use ts_rs::TS;

use sv_core::links::{self, LinkDecision};
use sv_core::resize::panel_width;
use sv_core::{BypassReply, BypassRequest, ClickEvent, LinkTarget, Modifiers, OverlayConfig, PageKey, RuleUpdate, TabId};

mod simulate;

use simulate::SimulateOptions;

#[derive(Parser)]
#[command(name = "sv-cli")]
#[command(about = "SplitView activation and header-bypass tools")]
struct Cli {
    /// Log state transitions to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the session rule update issued when a tab enables the bypass
    Rule {
        /// Browser tab identifier
        #[arg(short, long)]
        tab_id: i32,

        /// Print the removal update instead
        #[arg(long)]
        remove: bool,
    },

    /// Derive the page key (and storage key) for a URL
    PageKey {
        url: String,
    },

    /// Decide whether a link click would open in the panel
    Link {
        /// URL of the page the link is on
        #[arg(short, long)]
        page: String,

        /// Raw href attribute
        href: String,

        #[arg(long)]
        ctrl: bool,
        #[arg(long)]
        meta: bool,
        #[arg(long)]
        shift: bool,
        #[arg(long)]
        alt: bool,

        /// Link has the download attribute
        #[arg(long)]
        download: bool,

        /// A page handler already called preventDefault()
        #[arg(long)]
        default_prevented: bool,
    },

    /// Compute the panel width after a resizer drag
    Resize {
        #[arg(long, default_value_t = 450)]
        start_width: u32,
        #[arg(long)]
        start_x: f64,
        #[arg(long)]
        current_x: f64,
        #[arg(long, default_value_t = 1600.0)]
        viewport: f64,
        /// Overlay config JSON file
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Replay activation, reload and restore against in-memory collaborators
    Simulate {
        /// Page to activate the overlay on
        #[arg(short, long)]
        url: String,

        #[arg(short, long, default_value_t = 1)]
        tab_id: i32,

        /// Scroll offset at the time of activation
        #[arg(long, default_value_t = 0)]
        scroll_y: i32,

        /// Links to click once active (repeatable)
        #[arg(long = "click")]
        clicks: Vec<String>,

        /// Make the session rule update fail
        #[arg(long)]
        fail_bypass: bool,

        /// Toggle the overlay off at the end
        #[arg(long)]
        deactivate: bool,

        /// Overlay config JSON file
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Write TypeScript definitions for the message contract and session rules
    Bindings {
        /// Output directory
        #[arg(short, long, default_value = "bindings")]
        out: String,
    },
}

fn main() {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(if cli.verbose { LevelFilter::Debug } else { LevelFilter::Warn })
        .parse_default_env()
        .format_target(false)
        .init();

    let result = match cli.command {
        Commands::Rule { tab_id, remove } => cmd_rule(tab_id, remove),
        Commands::PageKey { url } => cmd_page_key(&url),
        Commands::Link {
            page,
            href,
            ctrl,
            meta,
            shift,
            alt,
            download,
            default_prevented,
        } => {
            let click = ClickEvent {
                default_prevented,
                modifiers: Modifiers::from_keys(ctrl, meta, shift, alt),
                link: Some(LinkTarget { href, download }),
            };
            cmd_link(&page, &click)
        }
        Commands::Resize {
            start_width,
            start_x,
            current_x,
            viewport,
            config,
        } => load_config(config.as_deref()).map(|config| {
            let width = panel_width(start_width, start_x, current_x, viewport, &config);
            println!("{}", width);
        }),
        Commands::Simulate {
            url,
            tab_id,
            scroll_y,
            clicks,
            fail_bypass,
            deactivate,
            config,
        } => load_config(config.as_deref()).and_then(|config| {
            simulate::run_simulation(SimulateOptions {
                url,
                tab_id,
                scroll_y,
                clicks,
                fail_bypass,
                deactivate,
                config,
            })
        }),
        Commands::Bindings { out } => cmd_bindings(Path::new(&out)),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn load_config(path: Option<&str>) -> Result<OverlayConfig, String> {
    let Some(path) = path else {
        return Ok(OverlayConfig::default());
    };
    let text = fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    serde_json::from_str(&text).map_err(|e| format!("Invalid config '{}': {}", path, e))
}

fn cmd_rule(tab_id: i32, remove: bool) -> Result<(), String> {
    let tab = TabId::new(tab_id).ok_or_else(|| format!("Invalid tab id: {}", tab_id))?;
    let update = if remove {
        RuleUpdate::remove(tab)
    } else {
        RuleUpdate::install(tab)
    };
    let json = serde_json::to_string_pretty(&update).map_err(|e| format!("Failed to encode rule: {}", e))?;
    println!("{}", json);
    Ok(())
}

fn cmd_page_key(url: &str) -> Result<(), String> {
    let key = PageKey::parse(url).map_err(|e| e.to_string())?;
    println!("{}", key);
    Ok(())
}

fn cmd_link(page: &str, click: &ClickEvent) -> Result<(), String> {
    match links::decide(click, page) {
        LinkDecision::Intercept(url) => {
            println!("intercept {}", url);
            println!("  toast host: {}", links::display_host(url.as_str()));
        }
        LinkDecision::Skip(reason) => println!("skip ({:?})", reason),
    }
    Ok(())
}

/// Export the wire types the JS shims exchange with the wasm module. Each
/// export also writes the types it references (`SessionRule`, `BypassAction`..).
fn cmd_bindings(out: &Path) -> Result<(), String> {
    fs::create_dir_all(out).map_err(|e| format!("Failed to create '{}': {}", out.display(), e))?;
    BypassRequest::export_all_to(out).map_err(|e| format!("Failed to export BypassRequest: {}", e))?;
    BypassReply::export_all_to(out).map_err(|e| format!("Failed to export BypassReply: {}", e))?;
    RuleUpdate::export_all_to(out).map_err(|e| format!("Failed to export RuleUpdate: {}", e))?;
    println!("Wrote TypeScript bindings to {}", out.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bindings_cover_message_contract() {
        let out = std::env::temp_dir().join(format!("sv-cli-bindings-{}", std::process::id()));
        cmd_bindings(&out).unwrap();

        for name in ["BypassRequest", "BypassAction", "BypassReply", "RuleUpdate", "SessionRule"] {
            let path = out.join(format!("{name}.ts"));
            assert!(path.exists(), "missing {}", path.display());
        }
        let reply = fs::read_to_string(out.join("BypassReply.ts")).unwrap();
        assert!(reply.contains("success: boolean"));

        fs::remove_dir_all(&out).unwrap();
    }

    #[test]
    fn test_rule_rejects_invalid_tab() {
        assert_eq!(cmd_rule(0, false), Err("Invalid tab id: 0".to_string()));
    }
}
