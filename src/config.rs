//! Planet configuration, read from YAML or JSON.

use crate::error::{Error, Result};
use crate::planet::constants::{DEFAULT_MAX_RETRIES, DEFAULT_RENDER_DISTANCE_FACTOR, MAX_CHUNK_DEPTH};
use crate::planet::terrain::{PlanetKind, TerrainSettings};
use nalgebra::Vector3;
use std::fs;
use std::path::Path;

/// Depth bounds of the chunk trees and the distance at which chunks split.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LodSettings {
    pub min_depth: usize,
    pub max_depth: usize,
    #[serde(default = "default_render_distance_factor")]
    pub render_distance_factor: f64,
}

fn default_render_distance_factor() -> f64 {
    DEFAULT_RENDER_DISTANCE_FACTOR
}

impl LodSettings {
    /// Derives the depth bounds from the size of the planet: larger planets start deeper and may
    /// go deeper.
    pub fn for_radius(radius: f64) -> LodSettings {
        let depth = |bias: f64| ((radius.log2() - bias).round().max(0.0) as usize).min(MAX_CHUNK_DEPTH);
        LodSettings {
            min_depth: depth(19.0),
            max_depth: depth(12.0),
            render_distance_factor: DEFAULT_RENDER_DISTANCE_FACTOR,
        }
    }
}

/// Sizing of the worker pool of the forge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgeSettings {
    /// Number of workers, derived from the available cores when absent
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u8,
}

fn default_max_retries() -> u8 {
    DEFAULT_MAX_RETRIES
}

impl Default for ForgeSettings {
    fn default() -> Self {
        ForgeSettings { workers: None, max_retries: DEFAULT_MAX_RETRIES }
    }
}

impl ForgeSettings {
    /// Leaves one core for the controlling thread and one for the renderer
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| num_cpus::get().saturating_sub(2)).max(1)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanetConfig {
    pub name: String,
    pub radius: f64,
    pub kind: PlanetKind,
    /// Offset added to every noise sample so equal settings still yield different planets
    #[serde(default = "default_seed")]
    pub seed: Vector3<f64>,
    /// Derived from the radius when absent
    #[serde(default)]
    pub lod: Option<LodSettings>,
    #[serde(default)]
    pub forge: ForgeSettings,
}

fn default_seed() -> Vector3<f64> {
    Vector3::zeros()
}

impl PlanetConfig {
    /// An earth sized telluric planet with the default terrain
    pub fn telluric(name: &str, radius: f64) -> PlanetConfig {
        PlanetConfig {
            name: name.to_owned(),
            radius,
            kind: PlanetKind::Telluric { terrain: TerrainSettings::default() },
            seed: Vector3::zeros(),
            lod: None,
            forge: ForgeSettings::default(),
        }
    }

    /// Reads a configuration, the format follows from the extension of the file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<PlanetConfig> {
        let path = path.as_ref();
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("").to_lowercase();
        let contents = fs::read_to_string(path)?;
        let config = match extension.as_str() {
            "yaml" | "yml" => PlanetConfig::from_yaml_str(&contents)?,
            "json" => PlanetConfig::from_json_str(&contents)?,
            _ => return Err(Error::UnsupportedFormat(path.display().to_string())),
        };
        debug!("loaded planet '{}' from {}", config.name, path.display());
        Ok(config)
    }

    pub fn from_yaml_str(contents: &str) -> Result<PlanetConfig> {
        Ok(serde_yaml::from_str(contents)?)
    }

    pub fn from_json_str(contents: &str) -> Result<PlanetConfig> {
        Ok(serde_json::from_str(contents)?)
    }

    /// The configured depth bounds, or those that fit the radius
    pub fn lod_settings(&self) -> LodSettings {
        let mut lod = self.lod.clone().unwrap_or_else(|| LodSettings::for_radius(self.radius));
        lod.max_depth = lod.max_depth.min(MAX_CHUNK_DEPTH);
        lod.min_depth = lod.min_depth.min(lod.max_depth);
        lod
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planet::terrain::Crater;

    #[test]
    fn depth_bounds_follow_the_radius() {
        let lod = LodSettings::for_radius(6_000_000.0);
        // log2(6e6) is about 22.5
        assert_eq!(lod.min_depth, 4);
        assert_eq!(lod.max_depth, 11);
        assert_eq!(lod.render_distance_factor, 2.0);

        let small = LodSettings::for_radius(1000.0);
        assert_eq!(small.min_depth, 0);
        assert_eq!(small.max_depth, 0);
    }

    #[test]
    fn worker_count_is_at_least_one() {
        assert!(ForgeSettings::default().worker_count() >= 1);
        assert_eq!(ForgeSettings { workers: Some(0), max_retries: 1 }.worker_count(), 1);
        assert_eq!(ForgeSettings { workers: Some(3), max_retries: 1 }.worker_count(), 3);
    }

    #[test]
    fn parses_yaml() {
        let config = PlanetConfig::from_yaml_str(
            r#"
name: Luna
radius: 1737000
kind:
  type: anomaly
  terrain:
    continentsFragmentation: 0.47
    continentBaseHeight: 0
    maxBumpHeight: 800
    bumpsFrequency: 0.00003
    maxMountainHeight: 0
    mountainsFrequency: 0.00001
    mountainsMinValue: 0.5
  craters:
    - position: [0.0, 0.0, 1.0]
      radius: 0.05
      maxDepth: 3000
      steepness: 1.5
lod:
  minDepth: 1
  maxDepth: 9
forge:
  workers: 2
"#,
        )
        .unwrap();

        assert_eq!(config.name, "Luna");
        assert_eq!(config.seed, Vector3::zeros());
        assert_eq!(config.forge, ForgeSettings { workers: Some(2), max_retries: 1 });
        let lod = config.lod_settings();
        assert_eq!((lod.min_depth, lod.max_depth), (1, 9));
        assert_eq!(lod.render_distance_factor, 2.0);
        match config.kind {
            PlanetKind::Anomaly { craters, .. } => assert_eq!(
                craters,
                vec![Crater { position: Vector3::new(0.0, 0.0, 1.0), radius: 0.05, max_depth: 3000.0, steepness: 1.5 }]
            ),
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn parses_json() {
        let config = PlanetConfig::from_json_str(
            r#"{ "name": "Jupiter", "radius": 69911000, "kind": { "type": "gas" }, "seed": [1, 2, 3] }"#,
        )
        .unwrap();
        assert_eq!(config.kind, PlanetKind::Gas);
        assert_eq!(config.seed, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(config.lod_settings(), LodSettings::for_radius(69_911_000.0));
    }

    #[test]
    fn written_config_reads_back() {
        let config = PlanetConfig::telluric("Terra", 6_371_000.0);
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert_eq!(PlanetConfig::from_yaml_str(&yaml).unwrap(), config);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let path = std::env::temp_dir().join("planetforge-config-test.toml");
        fs::write(&path, "name = 'x'").unwrap();
        match PlanetConfig::load(&path) {
            Err(Error::UnsupportedFormat(_)) => {}
            other => panic!("unexpected result {:?}", other.map(|c| c.name)),
        }
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        match PlanetConfig::load("/this/file/does/not/exist.yaml") {
            Err(Error::Io(_)) => {}
            other => panic!("unexpected result {:?}", other.map(|c| c.name)),
        }
    }
}
