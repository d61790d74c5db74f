/**
 * TÉLÉMÉTRIE SIMULÉE - Perturbation périodique du registre
 *
 * RÔLE :
 * Émule des capteurs vivants : à chaque tick, une fraction des noeuds change
 * d'état (online/offline) et/ou reçoit de nouvelles mesures.
 *
 * FONCTIONNEMENT :
 * - Snapshot de tous les noeuds, puis tirage indépendant par noeud
 * - Noeud considéré : bascule d'état avec `flip_probability`
 * - Online : nouvelles température/humidité ; offline : aucune valeur fournie,
 *   le registre conserve les précédentes
 * - Écriture uniquement via `NodeRegistry::update_node_status`
 * - Fire-and-forget : les anomalies sont loguées, jamais propagées,
 *   le timer ne s'arrête jamais
 */

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::TelemetryConfig;
use crate::field::sample_readings;
use crate::health::HealthTracker;
use crate::registry::NodeRegistry;

/// Bilan d'une passe
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryReport {
    pub considered: usize,
    pub flipped: usize,
    pub updated: usize,
    pub missing: usize, // disparus entre snapshot et écriture
}

pub fn run_pass<R: Rng + ?Sized>(registry: &NodeRegistry, cfg: &TelemetryConfig, rng: &mut R) -> TelemetryReport {
    let mut report = TelemetryReport::default();

    for node in registry.all_nodes() {
        if !rng.gen_bool(cfg.update_probability) {
            continue;
        }
        report.considered += 1;

        let is_online = if rng.gen_bool(cfg.flip_probability) {
            report.flipped += 1;
            !node.is_online
        } else {
            node.is_online
        };
        let (temperature, humidity) = if is_online {
            let (t, h) = sample_readings(rng);
            (Some(t), Some(h))
        } else {
            (None, None)
        };

        match registry.update_node_status(&node.node_id, is_online, temperature, humidity) {
            Some(_) => report.updated += 1,
            None => {
                warn!("node {} vanished before telemetry update", node.node_id);
                report.missing += 1;
            }
        }
    }
    report
}

/// Démarre la boucle de télémétrie pour toute la durée du process
pub fn spawn_telemetry_driver(
    registry: NodeRegistry,
    cfg: TelemetryConfig,
    health: HealthTracker,
) -> JoinHandle<()> {
    info!("starting telemetry driver (every {}ms)", cfg.interval_ms);

    tokio::spawn(async move {
        let mut rng = StdRng::from_entropy();
        let mut interval = tokio::time::interval(Duration::from_millis(cfg.interval_ms));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // le premier tick est immédiat : on laisse le seed visible un intervalle complet
        interval.tick().await;

        loop {
            interval.tick().await;

            let report = run_pass(&registry, &cfg, &mut rng);
            health.record_telemetry_pass();
            debug!(
                "telemetry pass: {} considered, {} flipped, {} updated, {} missing",
                report.considered, report.flipped, report.updated, report.missing
            );
        }
    })
}
