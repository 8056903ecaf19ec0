//! Relay server demo with a synthetic camera
//!
//! Run with: cargo run --example relay_server [BIND_ADDR]
//!
//! Every camera key is served by the same moving test pattern, so no real
//! camera is needed. Open a viewer with any WebSocket client:
//!
//!   websocat --binary 'ws://localhost:8000/ws?camera_index=lobby&rtsp=rtsp://demo'
//!
//! Each binary message is one JPEG. Capture for a key starts with its first
//! viewer and stops when the last one disconnects.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use camrelay::error::{AcquireError, ConnectError};
use camrelay::media::JpegTranscoder;
use camrelay::{
    CaptureConfig, FrameSource, RawFrame, RegistryConfig, RelayServer, ServerConfig,
    SessionRegistry, SourceConnection, SourceDescriptor,
};
use tokio::time::{self, Interval, MissedTickBehavior};

const PATTERN_WIDTH: u32 = 320;
const PATTERN_HEIGHT: u32 = 180;

/// Source producing a scrolling gradient at 25 fps
struct TestPattern;

impl FrameSource for TestPattern {
    type Connection = PatternConnection;

    async fn open(&self, descriptor: &SourceDescriptor) -> Result<PatternConnection, ConnectError> {
        tracing::info!(source = %descriptor, "Opening test pattern");

        let mut ticker = time::interval(Duration::from_millis(40));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        Ok(PatternConnection { ticker, offset: 0 })
    }
}

struct PatternConnection {
    ticker: Interval,
    offset: u32,
}

impl SourceConnection for PatternConnection {
    async fn next_latest_frame(&mut self) -> Result<Option<RawFrame>, AcquireError> {
        self.ticker.tick().await;
        self.offset = self.offset.wrapping_add(4);

        let mut pixels = Vec::with_capacity((PATTERN_WIDTH * PATTERN_HEIGHT * 3) as usize);
        for y in 0..PATTERN_HEIGHT {
            for x in 0..PATTERN_WIDTH {
                pixels.push(((x + self.offset) % 256) as u8);
                pixels.push(((y * 255) / PATTERN_HEIGHT) as u8);
                pixels.push(128);
            }
        }

        Ok(Some(RawFrame::rgb(PATTERN_WIDTH, PATTERN_HEIGHT, pixels)))
    }

    async fn close(self) {
        tracing::info!("Test pattern closed");
    }
}

fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    const DEFAULT_PORT: u16 = 8000;

    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: relay_server [BIND_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR    Address to bind to (default: 0.0.0.0:8000)");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let mut config = ServerConfig::default();
    if let Some(addr_str) = args.get(1) {
        match parse_bind_addr(addr_str) {
            Ok(addr) => config = config.bind(addr),
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("camrelay=info".parse()?)
                .add_directive("relay_server=info".parse()?),
        )
        .init();

    let registry_config = RegistryConfig::default().capture(
        CaptureConfig::default()
            .target_resolution(640, 360)
            .max_frame_rate(Some(15.0)),
    );
    let registry = Arc::new(SessionRegistry::with_config(
        TestPattern,
        JpegTranscoder::new(),
        registry_config,
    ));
    let server = RelayServer::new(config, registry);

    println!("Relay server on {}", server.bind_addr());
    println!(
        "Viewer: ws://localhost:{}/ws?camera_index=lobby&rtsp=rtsp://demo",
        server.bind_addr().port()
    );

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            println!("\nShutting down...");
        })
        .await?;

    Ok(())
}
