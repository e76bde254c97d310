use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}};
use thiserror::Error;
use tracing::{error, warn};

#[derive(Error, Debug)]
pub enum ConfigErrors {
    #[error("Failed to read config file")]
    UnreadableConfig(#[from] std::io::Error),
    #[error("Failed to parse config file")]
    InvalidConfig(#[from] serde_yaml::Error),
    #[error("Config failed preflight checks")]
    FailedPreflight,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct SubmitConfig {
    // parameters of the signature sweep itself
    #[serde(default)]
    pub sweep: SweepConfig,
    // everything the external compute platform needs
    #[serde(default)]
    pub platform: PlatformConfig,
    // where workers fetch data and post results
    #[serde(default)]
    pub server: ServerEndpoints,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct SweepConfig {
    #[serde(default = "default_n_signatures")]
    pub n_signatures: u32,
    #[serde(default = "default_min_sig_length")]
    pub min_sig_length: u32,
    #[serde(default = "default_max_sig_length")]
    pub max_sig_length: u32,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct PlatformConfig {
    #[serde(default = "default_scheduler_url")]
    pub scheduler_url: String,
    // compute groups the job joins, empty means the public pool
    #[serde(default)]
    pub compute_groups: Vec<ComputeGroup>,
    // keystore names resolved against the keystore dir, or absolute
    // paths ending in .keystore
    #[serde(default = "default_identity_keystore")]
    pub identity_keystore: String,
    #[serde(default = "default_payment_keystore")]
    pub payment_keystore: String,
    // defaults to ~/.dcp when unset
    #[serde(default)]
    pub keystore_dir: Option<PathBuf>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ComputeGroup {
    pub join_key: String,
    pub join_secret: String,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct ServerEndpoints {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl SubmitConfig {
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

    /// validate the sweep bounds before anything is charged to the
    /// payment account, collecting every error instead of failing
    /// piece-by-piece
    pub fn preflight_checks(&mut self) -> Result<(), ConfigErrors> {
        let mut contains_error = false;

        if self.sweep.n_signatures == 0 {
            error!("sweep.n_signatures cannot be 0, the sweep would be a NOP");
            contains_error = true;
        }

        if self.sweep.min_sig_length == 0 {
            warn!("sweep.min_sig_length cannot be 0, clamping to 1");
            self.sweep.min_sig_length = 1;
        }

        if self.sweep.min_sig_length > self.sweep.max_sig_length {
            error!(
                "sweep.min_sig_length ({}) exceeds sweep.max_sig_length ({})",
                self.sweep.min_sig_length, self.sweep.max_sig_length
            );
            contains_error = true;
        }

        for url in [&self.platform.scheduler_url, &self.server.base_url] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                error!("{url:?} is not an absolute http(s) URL");
                contains_error = true;
            }
        }

        if contains_error {
            Err(ConfigErrors::FailedPreflight)
        } else {
            Ok(())
        }
    }
}

impl ServerEndpoints {
    pub fn dataset_url(&self) -> String {
        format!("{}/GSE57383_ps_psa", self.base_url.trim_end_matches('/'))
    }

    pub fn results_url(&self) -> String {
        format!("{}/dcp-results", self.base_url.trim_end_matches('/'))
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            n_signatures: default_n_signatures(),
            min_sig_length: default_min_sig_length(),
            max_sig_length: default_max_sig_length(),
            seed: default_seed(),
        }
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            scheduler_url: default_scheduler_url(),
            compute_groups: Vec::new(),
            identity_keystore: default_identity_keystore(),
            payment_keystore: default_payment_keystore(),
            keystore_dir: None,
        }
    }
}

impl Default for ServerEndpoints {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

fn default_n_signatures() -> u32 {
    9
}

fn default_min_sig_length() -> u32 {
    5
}

fn default_max_sig_length() -> u32 {
    9
}

fn default_seed() -> u64 {
    42
}

fn default_scheduler_url() -> String {
    String::from("https://scheduler.distributed.computer")
}

fn default_identity_keystore() -> String {
    String::from("id")
}

fn default_payment_keystore() -> String {
    String::from("default")
}

fn default_base_url() -> String {
    String::from("http://127.0.0.1:5001")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_mapping_is_a_valid_config() {
        let config: SubmitConfig = serde_yaml::from_str("{}").unwrap();

        assert_eq!(config.sweep.n_signatures, 9);
        assert_eq!(config.sweep.min_sig_length, 5);
        assert_eq!(config.sweep.max_sig_length, 9);
        assert_eq!(config.sweep.seed, 42);
        assert!(config.platform.compute_groups.is_empty());
    }

    #[test]
    fn compute_groups_use_camel_case_keys() {
        let config: SubmitConfig = serde_yaml::from_str(
            "platform:\n  compute_groups:\n    - joinKey: ibm\n      joinSecret: dcp\n",
        )
        .unwrap();

        assert_eq!(
            config.platform.compute_groups,
            vec![ComputeGroup {
                join_key: String::from("ibm"),
                join_secret: String::from("dcp"),
            }]
        );
    }

    #[test]
    fn endpoints_are_derived_from_the_base_url() {
        let endpoints = ServerEndpoints {
            base_url: String::from("http://192.168.6.49:5001/"),
        };

        assert_eq!(
            endpoints.dataset_url(),
            "http://192.168.6.49:5001/GSE57383_ps_psa"
        );
        assert_eq!(
            endpoints.results_url(),
            "http://192.168.6.49:5001/dcp-results"
        );
    }

    #[test]
    fn preflight_rejects_inverted_signature_lengths() {
        let mut config = SubmitConfig::default();
        config.sweep.min_sig_length = 12;

        assert!(matches!(
            config.preflight_checks(),
            Err(ConfigErrors::FailedPreflight)
        ));
    }

    #[test]
    fn preflight_clamps_zero_min_length() {
        let mut config = SubmitConfig::default();
        config.sweep.min_sig_length = 0;

        config.preflight_checks().unwrap();
        assert_eq!(config.sweep.min_sig_length, 1);
    }

    #[test]
    fn preflight_rejects_relative_urls() {
        let mut config = SubmitConfig::default();
        config.server.base_url = String::from("192.168.6.49:5001");

        assert!(config.preflight_checks().is_err());
    }
}
