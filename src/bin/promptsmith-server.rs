// ABOUTME: Server binary for the Promptsmith chat API
// ABOUTME: Loads environment configuration, initializes logging and serves HTTP until shutdown
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Promptsmith Server Binary
//!
//! `promptsmith-server` serves the API. `promptsmith-server issue-token` mints
//! a local access token for development when `AUTH_JWT_SECRET` is set.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use promptsmith::auth::JwtAuthProvider;
use promptsmith::config::ServerConfig;
use promptsmith::logging;
use promptsmith::models::AuthUser;
use promptsmith::server::{run, ServerResources};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "promptsmith-server")]
#[command(about = "Promptsmith - streaming prompt-engineering assistant API")]
struct Args {
    /// Override bind host
    #[arg(long)]
    host: Option<String>,

    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Mint a development access token signed with `AUTH_JWT_SECRET`
    IssueToken {
        /// User id placed in `sub`
        #[arg(long)]
        user_id: String,

        /// Optional email claim
        #[arg(long)]
        email: Option<String>,

        /// Token lifetime in hours
        #[arg(long, default_value_t = 24)]
        hours: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::from_env()?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }

    if let Some(Command::IssueToken {
        user_id,
        email,
        hours,
    }) = args.command
    {
        return issue_token(&config, user_id, email, hours);
    }

    logging::init_from_env()?;
    info!("Starting Promptsmith server");
    info!("{}", config.summary());

    let resources = match ServerResources::from_config(config).await {
        Ok(resources) => Arc::new(resources),
        Err(e) => {
            error!("Failed to initialize server: {e}");
            return Err(e.into());
        }
    };

    run(resources).await
}

fn issue_token(
    config: &ServerConfig,
    user_id: String,
    email: Option<String>,
    hours: u64,
) -> Result<()> {
    let Some(secret) = &config.auth.jwt_secret else {
        bail!("AUTH_JWT_SECRET must be set to issue tokens");
    };

    let provider = JwtAuthProvider::new(secret.as_bytes());
    let token = provider.issue_token(
        &AuthUser { id: user_id, email },
        Duration::from_secs(hours.saturating_mul(3600)),
    )?;
    println!("{token}");
    Ok(())
}
