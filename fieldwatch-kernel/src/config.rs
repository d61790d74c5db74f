use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tokio::fs;
use tracing::{error, info, warn};

use crate::error::ConfigError;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct KernelConfig {
    pub bind: String,       // ex: "0.0.0.0:5000"
    pub telemetry: TelemetryConfig,
    pub field: FieldConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct TelemetryConfig {
    pub interval_ms: u64,
    pub update_probability: f64,  // chance qu'un noeud soit considéré par passe
    pub flip_probability: f64,    // chance qu'un noeud considéré change d'état
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct FieldConfig {
    pub sections: Vec<String>,
    pub rows_per_section: u32,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5000".into(),
            telemetry: TelemetryConfig::default(),
            field: FieldConfig::default(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self { interval_ms: 5000, update_probability: 0.1, flip_probability: 0.2 }
    }
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            sections: ["A1", "A2", "B1", "B2", "C1", "C2"].iter().map(|s| s.to_string()).collect(),
            rows_per_section: 4,
        }
    }
}

impl KernelConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.telemetry;
        if t.interval_ms == 0 {
            return Err(ConfigError::Invalid("telemetry.interval_ms must be > 0".into()));
        }
        for (name, p) in [("update_probability", t.update_probability), ("flip_probability", t.flip_probability)] {
            if !(0.0..=1.0).contains(&p) {
                return Err(ConfigError::Invalid(format!("telemetry.{name} {p} not in [0, 1]")));
            }
        }
        if self.field.sections.is_empty() {
            return Err(ConfigError::Invalid("field.sections must not be empty".into()));
        }
        if self.field.rows_per_section == 0 {
            return Err(ConfigError::Invalid("field.rows_per_section must be > 0".into()));
        }
        let mut seen = HashSet::new();
        for section in &self.field.sections {
            if section.trim().is_empty() {
                return Err(ConfigError::Invalid("field.sections contains a blank name".into()));
            }
            if !seen.insert(section) {
                return Err(ConfigError::Invalid(format!("duplicate section {section}")));
            }
        }
        Ok(())
    }
}

/// Lit et valide un fichier YAML ; fichier vide => config par défaut
pub async fn load_config_from<P: AsRef<Path>>(path: P) -> Result<KernelConfig, ConfigError> {
    let txt = fs::read_to_string(path).await?;
    if txt.trim().is_empty() {
        return Ok(KernelConfig::default());
    }
    let cfg: KernelConfig = serde_yaml::from_str(&txt)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Charge la config depuis $FIELDWATCH_CONFIG (défaut: fieldwatch.yaml)
/// Jamais fatal : toute erreur retombe sur la config par défaut
pub async fn load_config() -> KernelConfig {
    let path = std::env::var("FIELDWATCH_CONFIG").unwrap_or_else(|_| "fieldwatch.yaml".into());
    let mut cfg = if Path::new(&path).exists() {
        match load_config_from(&path).await {
            Ok(cfg) => {
                info!("loaded config from {path}");
                cfg
            }
            Err(e) => {
                error!("invalid config {path}: {e}, using defaults");
                KernelConfig::default()
            }
        }
    } else {
        warn!("no {path}, using default config");
        KernelConfig::default()
    };

    if let Ok(bind) = std::env::var("FIELDWATCH_BIND") {
        cfg.bind = bind;
    }
    cfg
}
