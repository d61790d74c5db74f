use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::RegistryError;

/// État de connexion affiché d'un noeud, miroir texte de `is_online`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeStatus {
    Online,
    Offline,
}

impl NodeStatus {
    pub fn from_online(is_online: bool) -> Self {
        if is_online { NodeStatus::Online } else { NodeStatus::Offline }
    }
}

/// Un capteur physique du champ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: u64,
    pub node_id: String,            // ex: "Node-A1-001"
    pub location: String,           // ex: "Section A1, Row 1"
    pub section: String,
    pub row: String,
    pub is_online: bool,
    pub temperature: Option<f64>,   // Celsius, null si offline au seed
    pub humidity: Option<f64>,      // %
    pub signal_strength: i64,
    pub status: NodeStatus,
    pub battery_level: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub last_seen: OffsetDateTime,
}

impl Node {
    /// Construit un noeud depuis un payload de création
    pub fn from_new(id: u64, new: NewNode, last_seen: OffsetDateTime) -> Self {
        Self {
            id,
            node_id: new.node_id,
            location: new.location,
            section: new.section,
            row: new.row,
            is_online: new.is_online,
            temperature: new.temperature,
            humidity: new.humidity,
            signal_strength: new.signal_strength,
            status: NodeStatus::from_online(new.is_online),
            battery_level: new.battery_level,
            last_seen,
        }
    }
}

/// Payload de création (tout sauf id, lastSeen et status qui sont dérivés)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNode {
    pub node_id: String,
    pub location: String,
    pub section: String,
    pub row: String,
    #[serde(default)]
    pub is_online: bool,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    #[serde(default)]
    pub signal_strength: i64,
    #[serde(default = "default_battery")]
    pub battery_level: f64,
}

fn default_battery() -> f64 { 100.0 }

impl NewNode {
    /// Valide le payload selon le schéma de la table `nodes`
    pub fn validate(&self) -> Result<(), RegistryError> {
        for (field, value) in [
            ("nodeId", &self.node_id),
            ("location", &self.location),
            ("section", &self.section),
            ("row", &self.row),
        ] {
            if value.trim().is_empty() {
                return Err(RegistryError::InvalidNode(format!("{field} must not be empty")));
            }
        }
        if !(0.0..=100.0).contains(&self.battery_level) {
            return Err(RegistryError::InvalidNode(format!(
                "batteryLevel {} out of range [0, 100]",
                self.battery_level
            )));
        }
        Ok(())
    }
}

/// Corps de `PUT /api/nodes/{nodeId}/status`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub is_online: bool,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
}
