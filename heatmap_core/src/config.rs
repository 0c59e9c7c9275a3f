use crate::heatmap::HeatmapKind;
use crate::mutator::{DEFAULT_MAX_MUTATIONS, HeatmapMutator};
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file at {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse TOML from config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct SamplerSettings {
    #[serde(default)]
    pub heatmap: HeatmapKind,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct MutatorSettings {
    #[serde(default = "default_max_mutations")]
    pub max_mutations: usize,
    /// Treat inputs as gzip-compressed images.
    #[serde(default)]
    pub compressed: bool,
}

pub fn default_max_mutations() -> usize {
    DEFAULT_MAX_MUTATIONS
}

impl Default for MutatorSettings {
    fn default() -> Self {
        Self {
            max_mutations: default_max_mutations(),
            compressed: false,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct RngSettings {
    #[serde(default)]
    pub seed: u64,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct HeatmapConfig {
    #[serde(default)]
    pub sampler: SamplerSettings,
    #[serde(default)]
    pub mutator: MutatorSettings,
    #[serde(default)]
    pub rng: RngSettings,
}

impl HeatmapConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn heatmap_mutator(&self) -> HeatmapMutator {
        HeatmapMutator::new(self.sampler.heatmap, self.mutator.max_mutations)
    }

    /// A generator seeded from `rng.seed`, so runs with the same config repeat exactly.
    pub fn seeded_rng(&self) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.rng.seed)
    }
}
