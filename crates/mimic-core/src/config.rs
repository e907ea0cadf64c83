//! Configuration for the matching core.

use crate::mode::Mode;
use crate::simulation::SimulationView;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Mode the registry starts in
    pub mode: Mode,

    pub cache: CacheConfig,

    /// Simulation document imported at startup (JSON, or YAML by extension)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simulation: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Remember fallback-scan results while serving, keyed on the request's
    /// field values and the headers the matched rule requires. Off by
    /// default: the preloaded content then only ever changes on import and
    /// mode transitions.
    pub cache_fallback_matches: bool,

    /// Upper bound on entries added by fallback caching per preload
    pub max_fallback_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_fallback_matches: false,
            max_fallback_entries: 4096,
        }
    }
}

impl CoreConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, anyhow::Error> {
        let config: CoreConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if let Some(ref path) = self.simulation {
            if !path.is_file() {
                anyhow::bail!("Simulation file '{}' does not exist", path.display());
            }
        }
        Ok(())
    }
}

/// Read a simulation document, as YAML for `.yaml`/`.yml` files and as JSON
/// otherwise.
pub fn read_simulation<P: AsRef<Path>>(path: P) -> Result<SimulationView, anyhow::Error> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read '{}': {}", path.display(), e))?;

    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    );
    let view = if is_yaml {
        SimulationView::from_yaml(&contents)?
    } else {
        SimulationView::from_json(&contents)?
    };
    Ok(view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = CoreConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config.mode, Mode::Simulate);
        assert!(!config.cache.cache_fallback_matches);
        assert_eq!(config.cache.max_fallback_entries, 4096);
        assert!(config.simulation.is_none());
    }

    #[test]
    fn test_parse_sections() {
        let yaml = r#"
mode: capture
cache:
  cache_fallback_matches: true
  max_fallback_entries: 16
"#;
        let config = CoreConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.mode, Mode::Capture);
        assert!(config.cache.cache_fallback_matches);
        assert_eq!(config.cache.max_fallback_entries, 16);
    }

    #[test]
    fn test_unknown_mode_rejected() {
        assert!(CoreConfig::from_yaml_str("mode: record").is_err());
    }

    #[test]
    fn test_missing_simulation_file_rejected() {
        let err = CoreConfig::from_yaml_str("simulation: /nonexistent/sim.json").unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_from_file_with_simulation() {
        let dir = tempfile::tempdir().unwrap();
        let sim_path = dir.path().join("sim.yaml");
        std::fs::write(
            &sim_path,
            "pairs:\n  - request:\n      path:\n        exact_match: /a\n    response:\n      status: 204\n",
        )
        .unwrap();

        let config_path = dir.path().join("mimic.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "mode: spy").unwrap();
        writeln!(file, "simulation: {}", sim_path.display()).unwrap();

        let config = CoreConfig::from_file(&config_path).unwrap();
        assert_eq!(config.mode, Mode::Spy);

        let view = read_simulation(config.simulation.as_ref().unwrap()).unwrap();
        assert_eq!(view.pairs().len(), 1);
        assert_eq!(view.pairs()[0].response.status, 204);
    }

    #[test]
    fn test_read_simulation_json() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"data":{{"pairs":[]}},"meta":{{"schemaVersion":"v2"}}}}"#).unwrap();

        let view = read_simulation(file.path()).unwrap();
        assert!(view.pairs().is_empty());
    }
}
