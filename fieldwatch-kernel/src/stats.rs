use serde::{Deserialize, Serialize};

use crate::models::Node;
use crate::registry::NodeRegistry;

/// Statistiques agrégées affichées en tête du dashboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStats {
    pub total_nodes: usize,
    pub online_nodes: usize,
    pub offline_nodes: usize,
    pub uptime: String, // ex: "70.0%"
}

impl NodeStats {
    pub fn from_nodes(nodes: &[Node]) -> Self {
        let total_nodes = nodes.len();
        let online_nodes = nodes.iter().filter(|n| n.is_online).count();
        let uptime = if total_nodes > 0 {
            online_nodes as f64 / total_nodes as f64 * 100.0
        } else {
            0.0
        };
        Self {
            total_nodes,
            online_nodes,
            offline_nodes: total_nodes - online_nodes,
            uptime: format!("{:.1}%", round_half_up_tenths(uptime)),
        }
    }

    /// Snapshot frais du registre à chaque appel
    pub fn collect(registry: &NodeRegistry) -> Self {
        Self::from_nodes(&registry.all_nodes())
    }
}

/// Arrondi au dixième, égalités vers le haut (6.25 -> 6.3) ; `{:.1}` seul arrondit au pair
fn round_half_up_tenths(value: f64) -> f64 {
    (value * 10.0 + 0.5).floor() / 10.0
}
