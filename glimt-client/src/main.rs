//! Glimt client — entry point.
//!
//! ```text
//! glimt-client -h relay.example.net -s standup     View a session
//! glimt-client -h relay -s standup --share         Share the test pattern
//! glimt-client --gen-config > glimt.toml           Dump default config
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::time::timeout;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use glimt_core::{GlimtError, JoinStatus, resolve_addr};

use glimt_client::config::ClientConfig;
use glimt_client::events::SessionEvent;
use glimt_client::grab::TestPattern;
use glimt_client::session::SessionClient;

const JOIN_TIMEOUT: Duration = Duration::from_secs(10);

// ── CLI ──────────────────────────────────────────────────────────

// `-h` means host here, so the automatic help flag moves to `--help`.
#[derive(Parser, Debug)]
#[command(
    name = "glimt-client",
    about = "Share a screen or view a glimt session",
    disable_help_flag = true
)]
struct Cli {
    /// Relay server host, with optional :port.
    #[arg(short = 'h', long = "host", value_name = "HOST")]
    host: Option<String>,

    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "glimt.toml")]
    config: PathBuf,

    /// Session name to join (overrides config).
    #[arg(short, long)]
    session: Option<String>,

    /// Session password (overrides config).
    #[arg(short, long)]
    password: Option<String>,

    /// Share a synthetic test screen into the session.
    #[arg(long)]
    share: bool,

    /// Shared screen size as WIDTHxHEIGHT.
    #[arg(long, default_value = "1024x768", value_name = "WxH")]
    size: String,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    /// Print help.
    #[arg(long, action = clap::ArgAction::Help)]
    help: Option<bool>,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&ClientConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = ClientConfig::load(&cli.config);
    if let Some(host) = cli.host {
        config.server.address = host;
    }
    if let Some(session) = cli.session {
        config.session.name = session;
        config.session.auto_join = true;
    }
    if let Some(password) = cli.password {
        config.session.password = password;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("glimt-client v{}", env!("CARGO_PKG_VERSION"));

    if config.server.address.is_empty() {
        error!("no server given; pass -h <host> or set server.address in the config");
        std::process::exit(2);
    }
    if config.session.name.is_empty() || !config.session.auto_join {
        error!("no session to join; pass -s <name> or enable session.auto_join in the config");
        std::process::exit(2);
    }

    // ── 1. Connect and join ─────────────────────────────────────

    let addr = resolve_addr(&config.server.address);
    info!("connecting to {addr}");
    let interval = Duration::from_millis(config.capture.interval_ms);
    let (mut client, mut events) = SessionClient::connect(&addr, interval).await?;

    let verdict = timeout(
        JOIN_TIMEOUT,
        client.join(&config.session.name, &config.session.password),
    )
    .await
    .map_err(|_| GlimtError::Timeout(JOIN_TIMEOUT))??;
    match verdict {
        JoinStatus::Ok => info!("joined session {:?}", config.session.name),
        refused => {
            error!("join refused: {refused}");
            std::process::exit(1);
        }
    }

    // ── 2. Start sharing if asked ───────────────────────────────

    if cli.share {
        let Some((width, height)) = parse_size(&cli.size) else {
            error!("bad --size {:?}; expected WIDTHxHEIGHT", cli.size);
            std::process::exit(2);
        };
        client
            .start_share(Box::new(TestPattern::new(width, height)))
            .await?;
        info!("sharing a {width}x{height} test pattern");
    }

    // ── 3. Event printer ────────────────────────────────────────

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::PeerJoined(name) => info!("{name} joined the session"),
                SessionEvent::PeerLeft(name) => info!("{name} left the session"),
                SessionEvent::ShareStarted { width, height } => {
                    info!("peer sharing a {width}x{height} screen");
                }
                SessionEvent::CursorMoved { x, y, .. } => debug!("peer cursor at ({x}, {y})"),
                SessionEvent::FrameUpdated { rect_count } => debug!("painted {rect_count} rects"),
                SessionEvent::Disconnected => info!("server closed the session"),
            }
        }
    });

    // ── 4. Run until the server hangs up or ctrl-c ──────────────

    tokio::select! {
        result = client.run() => {
            if let Err(e) = result {
                error!("session failed: {e}");
                std::process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => info!("interrupted, closing"),
    }

    printer.abort();
    Ok(())
}

/// Parse `1024x768` style dimensions.
fn parse_size(input: &str) -> Option<(u16, u16)> {
    let (w, h) = input.split_once(['x', 'X'])?;
    let width = w.trim().parse().ok()?;
    let height = h.trim().parse().ok()?;
    if width == 0 || height == 0 {
        return None;
    }
    Some((width, height))
}
