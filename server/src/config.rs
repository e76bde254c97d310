use serde::{Deserialize, Serialize};
use std::{
    fs,
    net::{IpAddr, Ipv4Addr},
    path::{Path, PathBuf},
    str::FromStr,
};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum ConfigErrors {
    #[error("Failed to read config file")]
    UnreadableConfig(#[from] std::io::Error),
    #[error("Failed to parse config file")]
    InvalidConfig(#[from] serde_yaml::Error),
    #[error("Required file missing: {0}")]
    MissingDataset(PathBuf),
    #[error("Failed to create results directory {0}")]
    ResultsDir(PathBuf),
    #[error("Dataset route must start with '/', got {0:?}")]
    InvalidRoute(String),
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default)]
    pub listen: ListenConfig,
    #[serde(default)]
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub results: ResultsConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct ListenConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct DatasetConfig {
    // route the expression table is served under, workers fetch it directly
    #[serde(default = "default_dataset_route")]
    pub route: String,
    #[serde(default = "default_dataset_path")]
    pub path: PathBuf,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct ResultsConfig {
    #[serde(default = "default_results_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_results_prefix")]
    pub prefix: String,
}

impl ServerConfig {
    /// load the config from a YAML file, or fall back to the built-in defaults
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigErrors> {
        match path {
            Some(path) => {
                let raw = fs::read_to_string(path)?;
                Ok(serde_yaml::from_str(&raw)?)
            }
            None => {
                warn!("No config file given, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// validate everything the routes depend on before binding the socket
    /// a missing dataset file aborts startup instead of 404ing forever
    pub fn preflight_checks(&self) -> Result<(), ConfigErrors> {
        if !self.dataset.route.starts_with('/') {
            return Err(ConfigErrors::InvalidRoute(self.dataset.route.clone()));
        }

        if !self.dataset.path.is_file() {
            return Err(ConfigErrors::MissingDataset(self.dataset.path.clone()));
        }

        fs::create_dir_all(&self.results.dir)
            .map_err(|_| ConfigErrors::ResultsDir(self.results.dir.clone()))
    }
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            route: default_dataset_route(),
            path: default_dataset_path(),
        }
    }
}

impl Default for ResultsConfig {
    fn default() -> Self {
        Self {
            dir: default_results_dir(),
            prefix: default_results_prefix(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    5001
}

fn default_dataset_route() -> String {
    String::from("/GSE57383_ps_psa")
}

fn default_dataset_path() -> PathBuf {
    PathBuf::from_str("data/GSE57383_ps_psa.txt").unwrap()
}

fn default_results_dir() -> PathBuf {
    PathBuf::from_str("results").unwrap()
}

fn default_results_prefix() -> String {
    String::from("GSE57383_PsA_vs_Ps")
}
