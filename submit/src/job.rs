use crate::{
    config::{ComputeGroup, SubmitConfig},
    wallet::Keystore,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// the work function shipped verbatim to workers, executed once per slice
/// it is payload for the platform, never run by this program
pub const WORK_FUNCTION: &str = include_str!("work/search_signatures.py");

/// modules the platform installs in the worker sandbox
pub const WORKER_MODULES: [&str; 3] = ["pandas", "numpy", "scikit-learn"];

/// an exclusive integer range, the platform turns each element into one slice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RangeObject {
    pub start: i64,
    pub end: i64,
    pub step: i64,
}

impl RangeObject {
    /// `step` must be positive, descending ranges are not a thing the
    /// platform accepts
    pub fn new(start: i64, end: i64, step: i64) -> Self {
        debug_assert!(step > 0);

        Self { start, end, step }
    }

    pub fn len(&self) -> u64 {
        if self.end <= self.start {
            0
        } else {
            (self.end - self.start).unsigned_abs().div_ceil(self.step.unsigned_abs())
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = i64> {
        (self.start..self.end).step_by(self.step.unsigned_abs() as usize)
    }
}

/// full job description handed to the platform scheduler
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSpec {
    pub input: RangeObject,
    pub work_function: String,
    pub arguments: Vec<Value>,
    pub modules: Vec<String>,
    pub compute_groups: Vec<ComputeGroup>,
    pub result_storage: ResultStorage,
    pub public: PublicInfo,
    // opaque keystore records, the platform checks ownership and
    // withdraws compute credits from these
    pub identity: Value,
    pub payment: Value,
}

/// where workers send their results, bypassing the scheduler
#[derive(Debug, Clone, Serialize)]
pub struct ResultStorage {
    pub url: String,
    // static form fields sent along with every result envelope
    pub fields: BTreeMap<String, String>,
}

/// publicly-viewable optional info shown to worker owners
#[derive(Debug, Clone, Serialize)]
pub struct PublicInfo {
    pub name: String,
    pub description: String,
    pub link: String,
}

impl JobSpec {
    /// build the probeset-signature sweep: one slice per signature to
    /// try, workers fetch the expression table straight from the data
    /// server and post results straight back to it
    pub fn signature_sweep(config: &SubmitConfig, identity: &Keystore, payment: &Keystore) -> Self {
        let sweep = &config.sweep;

        Self {
            input: RangeObject::new(1, i64::from(sweep.n_signatures) + 1, 1),
            work_function: WORK_FUNCTION.to_owned(),
            arguments: vec![
                json!(sweep.n_signatures),
                json!(sweep.min_sig_length),
                json!(sweep.max_sig_length),
                json!(sweep.seed),
                json!(config.server.dataset_url()),
            ],
            modules: WORKER_MODULES.iter().map(|module| module.to_string()).collect(),
            compute_groups: config.platform.compute_groups.clone(),
            result_storage: ResultStorage {
                url: config.server.results_url(),
                fields: BTreeMap::from([(String::from("elementType"), String::from("results"))]),
            },
            public: PublicInfo::default(),
            identity: identity.record.clone(),
            payment: payment.record.clone(),
        }
    }
}

impl Default for PublicInfo {
    fn default() -> Self {
        Self {
            name: String::from("PsA sig search"),
            description: String::from(
                "Analyzing gene subsets to identify biomarkers for psoriatic arthritis",
            ),
            link: String::from("https://www.youtube.com/watch?v=p6Tf0guqqGw"),
        }
    }
}
