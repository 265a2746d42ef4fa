use crate::fitness::{Evaluation, EvaluationSettings};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "snake_case")]
pub struct EvaluateRequest {
    pub genome: Vec<u8>,
    pub width: usize,
    pub height: usize,
    #[serde(default)]
    pub settings: EvaluationSettings,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "snake_case")]
pub struct EvaluateResponse {
    pub fitness: f64,
    pub average_score: f64,
    pub scores: Vec<u32>,
    pub repairs: usize,
    pub replay: Vec<String>,
}

impl From<Evaluation> for EvaluateResponse {
    fn from(eval: Evaluation) -> Self {
        Self {
            fitness: eval.fitness(),
            average_score: eval.average_score,
            scores: eval.scores,
            repairs: eval.repairs,
            replay: eval.replay.lines(),
        }
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "snake_case")]
pub struct ErrorResponse {
    pub error: String,
}
