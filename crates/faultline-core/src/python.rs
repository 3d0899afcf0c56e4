//! Python bindings. Results cross the boundary as JSON and are handed back
//! as native dicts via `json.loads`.

use std::path::PathBuf;

use pyo3::prelude::*;
use pyo3::wrap_pyfunction;
use serde::Serialize;

use crate::config::LocalizeConfig;
use crate::errors::FaultlineResult;
use crate::eval::harness::{run_evaluation, EvalTask};
use crate::eval::metrics;
use crate::eval::sample;
use crate::models::LocalizeRequest;
use crate::pipeline::localize;
use crate::query::guards::DEFAULT_MAX_KEYWORDS;
use crate::query::tokenizer;

fn to_py<T: Serialize>(py: Python<'_>, value: &T) -> PyResult<PyObject> {
    let json_str = serde_json::to_string(value)
        .map_err(|e| pyo3::exceptions::PyRuntimeError::new_err(e.to_string()))?;
    let json_module = py.import("json")?;
    json_module
        .call_method1("loads", (json_str,))
        .map(|o| o.into())
}

fn resolve_config(config_json: Option<&str>) -> FaultlineResult<LocalizeConfig> {
    match config_json {
        Some(raw) if !raw.trim().is_empty() => LocalizeConfig::from_json(raw),
        _ => Ok(LocalizeConfig::from_env()),
    }
}

/// Rank files and symbols of `repo_root` for `issue_text`.
#[pyfunction]
#[pyo3(signature = (repo_root, issue_text, hint=None, config_json=None))]
pub fn localize_issue(
    py: Python<'_>,
    repo_root: PathBuf,
    issue_text: &str,
    hint: Option<String>,
    config_json: Option<&str>,
) -> PyResult<PyObject> {
    let config = resolve_config(config_json)?;
    let mut request = LocalizeRequest::new(repo_root, issue_text);
    if let Some(hint) = hint {
        request = request.with_hint(hint);
    }
    let result = py.allow_threads(|| localize(&request, &config))?;
    to_py(py, &result)
}

#[pyfunction]
#[pyo3(signature = (text, limit=DEFAULT_MAX_KEYWORDS))]
pub fn extract_keywords(text: &str, limit: usize) -> Vec<String> {
    tokenizer::extract_keywords(text, limit)
}

#[pyfunction]
pub fn paths_match(predicted: &str, gold: &str) -> bool {
    metrics::paths_match(predicted, gold)
}

#[pyfunction]
pub fn evaluate_prediction(
    py: Python<'_>,
    gold: Vec<String>,
    predicted: Vec<String>,
) -> PyResult<PyObject> {
    to_py(py, &metrics::evaluate_prediction(&gold, &predicted))
}

/// Run the harness over a JSON array of tasks.
#[pyfunction]
#[pyo3(signature = (tasks_json, config_json=None, concurrency=4))]
pub fn evaluate_tasks(
    py: Python<'_>,
    tasks_json: &str,
    config_json: Option<&str>,
    concurrency: usize,
) -> PyResult<PyObject> {
    let config = resolve_config(config_json)?;
    let tasks: Vec<EvalTask> = serde_json::from_str(tasks_json)
        .map_err(crate::errors::FaultlineError::from)?;
    let report = py.allow_threads(|| run_evaluation(&tasks, &config, concurrency));
    to_py(py, &report)
}

#[pyfunction]
#[pyo3(signature = (instances_file, dataset="SWE-bench/SWE-bench_Verified", split="test", seed=42, count=100))]
pub fn build_sample(
    py: Python<'_>,
    instances_file: PathBuf,
    dataset: &str,
    split: &str,
    seed: u64,
    count: usize,
) -> PyResult<PyObject> {
    let instances = sample::load_instances_file(&instances_file)?;
    let manifest = sample::build_sample(&instances, dataset, split, seed, count)?;
    to_py(py, &manifest)
}

#[pymodule]
fn _faultline_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add("METHOD_ID", crate::models::METHOD_ID)?;
    m.add("METHOD_ID_RERANKED", crate::models::METHOD_ID_RERANKED)?;

    m.add_function(wrap_pyfunction!(localize_issue, m)?)?;
    m.add_function(wrap_pyfunction!(extract_keywords, m)?)?;
    m.add_function(wrap_pyfunction!(paths_match, m)?)?;
    m.add_function(wrap_pyfunction!(evaluate_prediction, m)?)?;
    m.add_function(wrap_pyfunction!(evaluate_tasks, m)?)?;
    m.add_function(wrap_pyfunction!(build_sample, m)?)?;
    Ok(())
}
