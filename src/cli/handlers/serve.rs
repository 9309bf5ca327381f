//! API server handler

use std::sync::Arc;

use crate::api::server::build_state;
use crate::api::serve_api;
use crate::AppConfig;
use crate::Result;

pub async fn handle_serve_command(
    mut config: AppConfig,
    host: Option<String>,
    port: Option<u16>,
    ephemeral_memory: bool,
) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    println!("🚀 Starting shoprag server");
    println!("==========================\n");
    println!("📍 Host: {}", config.server.host);
    println!("🔌 Port: {}", config.server.port);
    println!("🌐 CORS: {}", if config.server.enable_cors { "Enabled" } else { "Disabled" });
    println!(
        "🔑 API key: {}",
        if config.server.api_key.is_some() { "Required" } else { "Not configured" }
    );
    println!(
        "🧠 Memory: {}\n",
        if ephemeral_memory { "In-process (ephemeral)" } else { "PostgreSQL" }
    );

    let state = build_state(Arc::new(config), ephemeral_memory).await?;
    serve_api(state).await
}
