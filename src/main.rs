//! Service gateway
//!
//! # Architecture Overview
//!
//! ```text
//!                ┌──────────────────────────────────────────────────────┐
//!                │                    SERVICE GATEWAY                    │
//!                │                                                       │
//!  Client  ─────▶│  http server ──▶ routing ──▶ auth ──▶ proxy engine ───┼──▶ Service
//!                │       │                                    │          │
//!                │       └──▶ websocket tunnel ───────────────┼──────────┼──▶ Chat WS
//!                │                                            ▼          │
//!                │        ┌────────────┐  ┌──────────┐  ┌──────────┐    │
//!                │        │  registry  │◀─│  health  │  │ breaker/ │    │
//!                │        │  (status)  │  │ monitor  │  │  retry   │    │
//!                │        └────────────┘  └──────────┘  └──────────┘    │
//!                └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use service_gateway::config::load_config;
use service_gateway::lifecycle;

#[derive(Parser)]
#[command(name = "service-gateway")]
#[command(about = "Resilient API gateway for HTTP micro-services", long_about = None)]
struct Args {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;
    lifecycle::run(config).await?;
    Ok(())
}
