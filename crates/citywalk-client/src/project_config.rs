//! citywalk.yaml project configuration parsing.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use citywalk_core::config::TuningConfig;
use glam::Vec3;

pub const CONFIG_FILE: &str = "citywalk.yaml";

#[derive(Debug, Clone, Deserialize)]
pub struct CitywalkConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub assets: AssetPaths,
    #[serde(default)]
    pub npc: NpcPlacement,
    #[serde(default)]
    pub tuning: TuningConfig,
}

impl Default for CitywalkConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            version: default_version(),
            assets: AssetPaths::default(),
            npc: NpcPlacement::default(),
            tuning: TuningConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetPaths {
    #[serde(default = "default_player_model")]
    pub player_model: String,
    #[serde(default = "default_npc_model")]
    pub npc_model: String,
    #[serde(default = "default_npc_config")]
    pub npc_config: String,
    /// Place the perimeter buildings.
    #[serde(default = "default_true")]
    pub city_layout: bool,
}

impl Default for AssetPaths {
    fn default() -> Self {
        Self {
            player_model: default_player_model(),
            npc_model: default_npc_model(),
            npc_config: default_npc_config(),
            city_layout: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NpcPlacement {
    #[serde(default = "default_npc_spawn")]
    pub spawn: [f32; 3],
}

impl Default for NpcPlacement {
    fn default() -> Self {
        Self {
            spawn: default_npc_spawn(),
        }
    }
}

impl NpcPlacement {
    pub fn spawn_position(&self) -> Vec3 {
        Vec3::from(self.spawn)
    }
}

fn default_name() -> String {
    "citywalk".to_string()
}

fn default_version() -> String {
    "0.1.0".to_string()
}

fn default_player_model() -> String {
    "assets/models/player.glb".to_string()
}

fn default_npc_model() -> String {
    "assets/models/npc.glb".to_string()
}

fn default_npc_config() -> String {
    "npc_config.json".to_string()
}

fn default_true() -> bool {
    true
}

fn default_npc_spawn() -> [f32; 3] {
    [5.0, 0.0, 5.0]
}

#[derive(Debug)]
pub enum ConfigError {
    NotFound,
    Io(std::io::Error),
    Parse(serde_yaml::Error),
    Invalid(citywalk_core::config::ConfigError),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotFound => write!(f, "{} not found", CONFIG_FILE),
            ConfigError::Io(e) => write!(f, "IO error reading {}: {}", CONFIG_FILE, e),
            ConfigError::Parse(e) => write!(f, "Failed to parse {}: {}", CONFIG_FILE, e),
            ConfigError::Invalid(e) => write!(f, "Invalid {}: {}", CONFIG_FILE, e),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Walk up from `start_dir` looking for `citywalk.yaml`.
pub fn find_config(start_dir: &Path) -> Option<PathBuf> {
    let mut dir = start_dir.to_path_buf();
    loop {
        let candidate = dir.join(CONFIG_FILE);
        if candidate.exists() {
            return Some(candidate);
        }
        if !dir.pop() {
            return None;
        }
    }
}

/// Parse and validate a config document.
pub fn parse_config(contents: &str) -> Result<CitywalkConfig, ConfigError> {
    let config: CitywalkConfig = serde_yaml::from_str(contents).map_err(ConfigError::Parse)?;
    config.tuning.validate().map_err(ConfigError::Invalid)?;
    Ok(config)
}

/// Load and parse a `citywalk.yaml` file.
pub fn load_config(path: &Path) -> Result<CitywalkConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_config(&contents)
}

/// Find the project from `start_dir` and load its config, or use defaults
/// rooted at `start_dir` when there is none.
pub fn discover(start_dir: &Path) -> Result<(PathBuf, CitywalkConfig), ConfigError> {
    match find_config(start_dir) {
        Some(path) => {
            let config = load_config(&path)?;
            let root = path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| start_dir.to_path_buf());
            tracing::info!("Project '{}' v{} at {:?}", config.name, config.version, root);
            Ok((root, config))
        }
        None => {
            tracing::info!("No {} found, using defaults", CONFIG_FILE);
            Ok((start_dir.to_path_buf(), CitywalkConfig::default()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = parse_config("{}").unwrap();
        assert_eq!(config.name, "citywalk");
        assert_eq!(config.npc.spawn_position(), Vec3::new(5.0, 0.0, 5.0));
        assert!(config.assets.city_layout);
        assert_eq!(config.tuning.locomotion.walk_speed, 3.0);
        assert_eq!(config.tuning.interaction.radius, 3.5);
    }

    #[test]
    fn test_partial_tuning_override() {
        let yaml = "name: demo\nnpc:\n  spawn: [1.0, 0.0, -2.0]\ntuning:\n  locomotion:\n    sprint_speed: 9.0\n";
        let config = parse_config(yaml).unwrap();
        assert_eq!(config.name, "demo");
        assert_eq!(config.tuning.locomotion.sprint_speed, 9.0);
        assert_eq!(config.tuning.locomotion.walk_speed, 3.0);
        assert_eq!(config.npc.spawn, [1.0, 0.0, -2.0]);
    }

    #[test]
    fn test_invalid_tuning_rejected() {
        let yaml = "tuning:\n  camera:\n    radius_limits: [20.0, 4.0]\n";
        assert!(matches!(parse_config(yaml), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_find_config_walks_up() {
        let root = std::env::temp_dir().join(format!("citywalk_find_{}", std::process::id()));
        let nested = root.join("a/b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(root.join(CONFIG_FILE), "name: found\n").unwrap();

        assert_eq!(find_config(&nested), Some(root.join(CONFIG_FILE)));
        let (project_root, config) = discover(&nested).unwrap();
        assert_eq!(project_root, root);
        assert_eq!(config.name, "found");
        let _ = std::fs::remove_dir_all(&root);
    }
}
