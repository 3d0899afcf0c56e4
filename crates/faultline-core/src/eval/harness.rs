//! Drive localization over many tasks and aggregate hit rates.
//!
//! Ground truth stays on the task and is only consulted after the
//! prediction is made.

use std::path::PathBuf;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::LocalizeConfig;
use crate::eval::metrics::{evaluate_prediction, HitRates};
use crate::models::LocalizeRequest;
use crate::pipeline::localize;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalTask {
    pub instance_id: String,
    #[serde(default)]
    pub workspace: Option<PathBuf>,
    #[serde(default)]
    pub problem_statement: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub gold_files: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum EvalOutcome {
    #[serde(rename_all = "camelCase")]
    Evaluated {
        instance_id: String,
        predicted: Vec<String>,
        hits: HitRates,
    },
    #[serde(rename_all = "camelCase")]
    NotEvaluated { instance_id: String, reason: String },
}

impl EvalOutcome {
    pub fn instance_id(&self) -> &str {
        match self {
            EvalOutcome::Evaluated { instance_id, .. } => instance_id,
            EvalOutcome::NotEvaluated { instance_id, .. } => instance_id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalReport {
    pub evaluated: usize,
    pub not_evaluated: usize,
    pub top1_rate: f64,
    pub top3_rate: f64,
    pub top5_rate: f64,
    pub outcomes: Vec<EvalOutcome>,
}

fn not_evaluated(task: &EvalTask, reason: impl Into<String>) -> EvalOutcome {
    EvalOutcome::NotEvaluated {
        instance_id: task.instance_id.clone(),
        reason: reason.into(),
    }
}

/// Predict target files for one task, then score them.
pub fn evaluate_task(task: &EvalTask, config: &LocalizeConfig) -> EvalOutcome {
    let Some(workspace) = task.workspace.as_ref() else {
        return not_evaluated(task, "missing workspace");
    };
    let Some(problem) = task
        .problem_statement
        .as_deref()
        .filter(|p| !p.trim().is_empty())
    else {
        return not_evaluated(task, "missing problem statement");
    };

    let mut request = LocalizeRequest::new(workspace, problem);
    if let Some(hint) = task.hint.as_deref() {
        request = request.with_hint(hint);
    }
    let predicted = match localize(&request, config) {
        Ok(result) => result.target_files,
        Err(e) => {
            warn!(instance = %task.instance_id, error = %e, "localization failed");
            return not_evaluated(task, format!("localization failed: {e}"));
        }
    };

    let hits = evaluate_prediction(&task.gold_files, &predicted);
    EvalOutcome::Evaluated {
        instance_id: task.instance_id.clone(),
        predicted,
        hits,
    }
}

fn rate(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

fn summarize(outcomes: Vec<EvalOutcome>) -> EvalReport {
    let hits: Vec<HitRates> = outcomes
        .iter()
        .filter_map(|o| match o {
            EvalOutcome::Evaluated { hits, .. } => Some(*hits),
            EvalOutcome::NotEvaluated { .. } => None,
        })
        .collect();
    let evaluated = hits.len();
    EvalReport {
        evaluated,
        not_evaluated: outcomes.len() - evaluated,
        top1_rate: rate(hits.iter().filter(|h| h.top1).count(), evaluated),
        top3_rate: rate(hits.iter().filter(|h| h.top3).count(), evaluated),
        top5_rate: rate(hits.iter().filter(|h| h.top5).count(), evaluated),
        outcomes,
    }
}

/// Evaluate `tasks` with at most `concurrency` running at once.
///
/// Outcomes keep task order.
pub fn run_evaluation(tasks: &[EvalTask], config: &LocalizeConfig, concurrency: usize) -> EvalReport {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(concurrency.max(1))
        .build();

    let outcomes: Vec<EvalOutcome> = match pool {
        Ok(pool) => pool.install(|| tasks.par_iter().map(|t| evaluate_task(t, config)).collect()),
        Err(e) => {
            warn!(error = %e, "thread pool unavailable, evaluating sequentially");
            tasks.iter().map(|t| evaluate_task(t, config)).collect()
        }
    };

    let report = summarize(outcomes);
    info!(
        evaluated = report.evaluated,
        not_evaluated = report.not_evaluated,
        top1 = report.top1_rate,
        top5 = report.top5_rate,
        "evaluation done"
    );
    report
}
