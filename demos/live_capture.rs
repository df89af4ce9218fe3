//! Live capture with scene analysis.
//!
//! Demonstrates:
//! - Starting capture over the WebSocket push stream or WebRTC
//! - Waiting for the first live frame
//! - Analyzing the live frame, or a file given on the command line
//! - Printing the activity log
//!
//! Usage:
//!   cargo run --example live_capture
//!   cargo run --example live_capture -- --webrtc
//!   cargo run --example live_capture -- --file ./photo.jpg
//!   cargo run --example live_capture -- --server http://camera.local:8000 --debug

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use imagoiq_capture::{CaptureConfig, Console, ImageFile, Result, TransportMethod};
use tokio::time::timeout;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(15);

// ============================================================================
// Arguments
// ============================================================================

#[derive(Debug, Clone)]
struct Args {
    debug: bool,
    webrtc: bool,
    server: Option<String>,
    file: Option<String>,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = std::env::args().collect();
        let value_of = |flag: &str| {
            args.iter()
                .position(|a| a == flag)
                .and_then(|i| args.get(i + 1))
                .cloned()
        };
        Self {
            debug: args.iter().any(|a| a == "--debug"),
            webrtc: args.iter().any(|a| a == "--webrtc"),
            server: value_of("--server"),
            file: value_of("--file"),
        }
    }
}

fn init_logging(debug: bool) {
    let filter = if debug {
        "imagoiq_capture=debug"
    } else {
        "imagoiq_capture=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    println!("=== Live Capture ===\n");

    let method = if args.webrtc {
        TransportMethod::WebRtcStream
    } else {
        TransportMethod::WebSocketStream
    };

    let mut config = CaptureConfig::new().with_transport(method);
    if let Some(server) = args.server {
        config = config.with_server(server);
    }

    let mut console = Console::new(config)?;

    // ========================================================================
    // Capture
    // ========================================================================

    println!("[1] Starting {method} capture...");
    console.toggle_capture().await?;

    let waited = timeout(FIRST_FRAME_TIMEOUT, async {
        while console.session().buffer().is_empty() && console.session().state().is_live() {
            console.pump().await;
        }
    })
    .await;

    match waited {
        Ok(()) if !console.session().buffer().is_empty() => println!("    ✓ First frame received\n"),
        _ => println!("    ✗ No frame (state: {})\n", console.session().state()),
    }

    // ========================================================================
    // Analysis
    // ========================================================================

    if let Some(path) = args.file {
        println!("[2] Analyzing {path}...");
        console.select_file(ImageFile::from_path(&path).await?);
    } else {
        println!("[2] Analyzing live frame...");
    }

    match console.analyze().await {
        Ok(outcome) => println!("    ✓ {}\n", outcome.description),
        Err(e) => println!("    ✗ {e}\n"),
    }

    // ========================================================================
    // Cleanup
    // ========================================================================

    console.reset().await;

    println!("[3] Activity log:");
    for entry in console.log().entries() {
        println!("    {entry}");
    }

    println!("\n=== Done ===");
    Ok(())
}
