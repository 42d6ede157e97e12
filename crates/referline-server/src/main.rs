//! Referline Server — application entry point.

use anyhow::Context;
use clap::Parser;
use referline_core::error::ReferlineError;
use referline_core::models::actor::{ActorRole, CreateActor};
use referline_db::DbManager;
use referline_server::{AppState, CallerVerifier, ServerConfig, build_router};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("referline=info".parse()?))
        .json()
        .init();

    let config = ServerConfig::parse();
    info!(bind_addr = %config.bind_addr, "Starting Referline server");

    let db = DbManager::connect(&config.db_config())
        .await
        .context("connecting to SurrealDB")?;
    referline_db::run_migrations(db.client())
        .await
        .context("running migrations")?;

    let verifier = CallerVerifier::from_ed_pem(&config.jwt_public_key_pem()?, &config.jwt_issuer)
        .context("loading JWT public key")?;
    let state = AppState::new(db.client().clone(), config.chain_config(), verifier);

    if let (Some(name), Some(email)) = (&config.bootstrap_admin_name, &config.bootstrap_admin_email)
    {
        let input = CreateActor {
            role: ActorRole::Admin,
            parent_id: None,
            name: name.clone(),
            email: email.clone(),
            phone: None,
            credential_hash: None,
            profile: None,
        };
        match state.onboarding.bootstrap_root(input).await {
            Ok(admin) => info!(actor_id = %admin.id, "Bootstrap admin created"),
            Err(ReferlineError::Conflict { reason, .. }) => {
                info!(reason = %reason, "Bootstrap skipped");
            }
            Err(e) => return Err(e).context("bootstrapping root admin"),
        }
    }

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "Listening");

    axum::serve(listener, build_router(state)).await?;

    info!("Referline server stopped.");
    Ok(())
}
