//! Server command implementation

use std::path::Path;

use anyhow::Result;
use tally_server::{parse_api_keys, ServerConfig};

use super::{open_db, parse_owner};

/// Build the server configuration from the raw environment values
pub fn build_server_config(
    no_auth: bool,
    api_keys: &str,
    dev_user: Option<&str>,
    allowed_origins: &str,
) -> Result<ServerConfig> {
    let mut config = ServerConfig {
        require_auth: !no_auth,
        allowed_origins: allowed_origins
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        api_keys: parse_api_keys(api_keys),
        ..Default::default()
    };

    if let Some(user) = dev_user.map(str::trim).filter(|s| !s.is_empty()) {
        config.dev_user_id = parse_owner(user)?.to_string();
    }

    Ok(config)
}

pub async fn cmd_serve(
    db_path: &Path,
    host: &str,
    port: u16,
    no_auth: bool,
    no_encrypt: bool,
) -> Result<()> {
    println!("🚀 Starting Tally API server...");
    println!("   Database: {}", db_path.display());
    println!("   Listening: http://{}:{}", host, port);

    let config = build_server_config(
        no_auth,
        &std::env::var("TALLY_API_KEYS").unwrap_or_default(),
        std::env::var("TALLY_DEV_USER").ok().as_deref(),
        &std::env::var("TALLY_ALLOWED_ORIGINS").unwrap_or_default(),
    )?;

    if no_auth {
        println!();
        println!("   ⚠️  Authentication DISABLED - do not expose to network!");
        println!("      Requests without identity headers act as {}", config.dev_user_id);
    } else {
        println!("   🔒 Authentication: gateway headers (x-auth-user-id, x-auth-user-roles)");
        if !config.api_keys.is_empty() {
            println!(
                "   🔑 API keys: {} configured (TALLY_API_KEYS)",
                config.api_keys.len()
            );
        }
    }
    if !config.allowed_origins.is_empty() {
        println!(
            "   🌐 CORS origins: {} (TALLY_ALLOWED_ORIGINS)",
            config.allowed_origins.join(", ")
        );
    }
    if no_encrypt {
        println!("   ⚠️  Encryption DISABLED (--no-encrypt)");
    }
    println!();
    println!("   Press Ctrl+C to stop");

    let db = open_db(db_path, no_encrypt)?;
    tally_server::serve_with_config(db, host, port, config).await?;

    Ok(())
}
