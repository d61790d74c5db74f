//! Génération de la population initiale du champ : forme fixe, valeurs aléatoires.
//!
//! Le `signal_strength` du seed est volontairement sur une autre échelle que
//! celle du registre après mise à jour (barres 1..=4) ; le dashboard ne lit
//! que des barres.

use rand::Rng;
use time::OffsetDateTime;

use crate::config::FieldConfig;
use crate::models::{Node, NodeStatus};

const ONLINE_PROBABILITY: f64 = 0.8;
const ONLINE_SIGNAL_MAX: i64 = 30_000;
const OFFLINE_SIGNAL_MAX: i64 = 7_200_000;

pub fn node_identifier(section: &str, row: u32) -> String {
    format!("Node-{section}-{row:03}")
}

/// Température/humidité d'un capteur online
pub fn sample_readings<R: Rng + ?Sized>(rng: &mut R) -> (f64, f64) {
    (rng.gen_range(20.0..30.0), rng.gen_range(60.0..80.0))
}

pub fn generate_field_nodes<R: Rng + ?Sized>(cfg: &FieldConfig, rng: &mut R) -> Vec<Node> {
    let now = OffsetDateTime::now_utc();
    let mut nodes = Vec::with_capacity(cfg.sections.len() * cfg.rows_per_section as usize);
    let mut id = 1;

    for section in &cfg.sections {
        for row in 1..=cfg.rows_per_section {
            let is_online = rng.gen_bool(ONLINE_PROBABILITY);
            let (temperature, humidity) = if is_online {
                let (t, h) = sample_readings(rng);
                (Some(t), Some(h))
            } else {
                (None, None)
            };
            let (signal_strength, battery_level) = if is_online {
                (rng.gen_range(0..ONLINE_SIGNAL_MAX), rng.gen_range(70.0..100.0))
            } else {
                (rng.gen_range(0..OFFLINE_SIGNAL_MAX), rng.gen_range(10.0..50.0))
            };

            nodes.push(Node {
                id,
                node_id: node_identifier(section, row),
                location: format!("Section {section}, Row {row}"),
                section: section.clone(),
                row: row.to_string(),
                is_online,
                temperature,
                humidity,
                signal_strength,
                status: NodeStatus::from_online(is_online),
                battery_level,
                last_seen: now,
            });
            id += 1;
        }
    }
    nodes
}
