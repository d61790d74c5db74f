/**
 * FIELDWATCH KERNEL - Point d'entrée du serveur de supervision du champ
 *
 * RÔLE : Orchestration des modules : config, registre, génération du champ,
 * télémétrie simulée, health, HTTP.
 *
 * ARCHITECTURE : Registre en mémoire partagé + tâche de fond périodique + API REST.
 * UTILITÉ : Backend unique du dashboard agricole, interrogé en polling.
 */

mod config;
mod error;
mod field;
mod health;
mod http;
mod models;
mod registry;
mod stats;
mod telemetry;

use crate::config::load_config;
use crate::field::generate_field_nodes;
use crate::health::HealthTracker;
use crate::http::AppState;
use crate::registry::NodeRegistry;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// RUST_LOG prioritaire, sinon FIELDWATCH_LOG_LEVEL, sinon "info"
fn init_tracing() {
    let level = std::env::var("FIELDWATCH_LOG_LEVEL").unwrap_or_else(|_| "info".into());
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Charger les variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok();

    init_tracing();
    info!("fieldwatch kernel starting");
    let cfg = load_config().await;

    // registre explicite, partagé par l'API et la télémétrie
    let registry = NodeRegistry::new();
    let seeded = registry.seed(generate_field_nodes(&cfg.field, &mut rand::thread_rng()));
    if registry.is_empty() {
        warn!("field is empty, dashboard will show no nodes");
    }
    info!(
        "seeded {} nodes ({} sections x {} rows)",
        seeded,
        cfg.field.sections.len(),
        cfg.field.rows_per_section
    );

    let health_tracker = HealthTracker::new();

    // télémétrie simulée, tourne jusqu'à la fin du process
    telemetry::spawn_telemetry_driver(registry.clone(), cfg.telemetry.clone(), health_tracker.clone());

    let app = http::build_router(AppState { registry, health_tracker });

    let listener = TcpListener::bind(&cfg.bind)
        .await
        .with_context(|| format!("failed to bind {}", cfg.bind))?;
    info!("listening on http://{}", cfg.bind);
    axum::serve(listener, app).await.context("HTTP server failed")?;
    Ok(())
}
