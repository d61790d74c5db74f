/**
 * NODE REGISTRY - Registre en mémoire des capteurs du champ
 *
 * RÔLE :
 * Seul propriétaire de l'état des noeuds. Toutes les lectures et écritures
 * (handlers HTTP, driver de télémétrie) passent par lui.
 *
 * FONCTIONNEMENT :
 * - Deux index : id numérique -> Node, identifiant lisible -> id
 * - Un seul Mutex protège les deux index : ils ne divergent jamais
 * - Compteur d'id monotone, jamais réutilisé
 * - Pas de persistance : l'état vit le temps du process
 *
 * UTILITÉ DANS FIELDWATCH :
 * 🎯 Source de vérité pour /api/nodes et /api/stats
 * 🎯 Cible des mises à jour simulées (telemetry.rs)
 */

use parking_lot::Mutex;
use rand::Rng;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::error::RegistryError;
use crate::models::{NewNode, Node, NodeStatus};

/// Plage des barres de signal après une mise à jour online
const SIGNAL_BARS_MIN: i64 = 1;
const SIGNAL_BARS_MAX: i64 = 4;

#[derive(Debug)]
struct Inner {
    by_id: HashMap<u64, Node>,
    by_identifier: HashMap<String, u64>,
    next_id: u64,
}

impl Inner {
    fn insert(&mut self, node: Node) {
        self.by_identifier.insert(node.node_id.clone(), node.id);
        self.by_id.insert(node.id, node);
    }
}

/// Handle clonable sur le registre, partagé par l'API et la télémétrie
#[derive(Debug, Clone)]
pub struct NodeRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                by_id: HashMap::new(),
                by_identifier: HashMap::new(),
                next_id: 1,
            })),
        }
    }

    /// Insertion en bloc de la population initiale (ids déjà attribués par le générateur)
    /// Retourne le nombre de noeuds effectivement insérés
    pub fn seed(&self, nodes: Vec<Node>) -> usize {
        let mut inner = self.inner.lock();
        let mut inserted = 0;
        for node in nodes {
            if inner.by_identifier.contains_key(&node.node_id) || inner.by_id.contains_key(&node.id) {
                warn!("seed skipped duplicate node {} (id {})", node.node_id, node.id);
                continue;
            }
            if node.id >= inner.next_id {
                inner.next_id = node.id + 1;
            }
            inner.insert(node);
            inserted += 1;
        }
        inserted
    }

    /// Tous les noeuds, triés par identifiant
    pub fn all_nodes(&self) -> Vec<Node> {
        let mut nodes: Vec<Node> = self.inner.lock().by_id.values().cloned().collect();
        nodes.sort_by(|a, b| compare_identifiers(&a.node_id, &b.node_id));
        nodes
    }

    pub fn node_by_id(&self, id: u64) -> Option<Node> {
        self.inner.lock().by_id.get(&id).cloned()
    }

    pub fn node_by_identifier(&self, node_id: &str) -> Option<Node> {
        let inner = self.inner.lock();
        inner.by_identifier.get(node_id).and_then(|id| inner.by_id.get(id)).cloned()
    }

    /// Crée un noeud avec le prochain id libre
    /// Un identifiant déjà présent est refusé et ne consomme pas d'id
    pub fn create_node(&self, new: NewNode) -> Result<Node, RegistryError> {
        let mut inner = self.inner.lock();
        if inner.by_identifier.contains_key(&new.node_id) {
            return Err(RegistryError::DuplicateNode(new.node_id));
        }
        let id = inner.next_id;
        inner.next_id += 1;

        let node = Node::from_new(id, new, OffsetDateTime::now_utc());
        inner.insert(node.clone());
        debug!("created node {} (id {})", node.node_id, id);
        Ok(node)
    }

    /// Remplace l'état de connexion d'un noeud
    /// temperature/humidity ne sont remplacées que si fournies
    pub fn update_node_status(
        &self,
        node_id: &str,
        is_online: bool,
        temperature: Option<f64>,
        humidity: Option<f64>,
    ) -> Option<Node> {
        let signal_strength = if is_online {
            rand::thread_rng().gen_range(SIGNAL_BARS_MIN..=SIGNAL_BARS_MAX)
        } else {
            0
        };

        let mut inner = self.inner.lock();
        let id = *inner.by_identifier.get(node_id)?;
        let current = inner.by_id.get(&id)?;

        let updated = Node {
            is_online,
            temperature: temperature.or(current.temperature),
            humidity: humidity.or(current.humidity),
            status: NodeStatus::from_online(is_online),
            last_seen: OffsetDateTime::now_utc(),
            signal_strength,
            ..current.clone()
        };
        inner.insert(updated.clone());
        Some(updated)
    }

    /// Recherche insensible à la casse sur identifiant, location et section
    /// L'ordre du résultat n'est pas garanti
    pub fn search_nodes(&self, query: &str) -> Vec<Node> {
        let needle = query.to_lowercase();
        self.inner
            .lock()
            .by_id
            .values()
            .filter(|node| {
                node.node_id.to_lowercase().contains(&needle)
                    || node.location.to_lowercase().contains(&needle)
                    || node.section.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    pub(crate) fn index_sizes(&self) -> (usize, usize) {
        let inner = self.inner.lock();
        (inner.by_id.len(), inner.by_identifier.len())
    }
}

/// Comparaison "locale" : insensible à la casse, minuscules d'abord à égalité
fn compare_identifiers(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| b.cmp(a))
}
