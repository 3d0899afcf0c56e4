//! Reproducible, repo-stratified benchmark samples.
//!
//! Selection order comes from SHA-256 digests of seeded keys rather than a
//! random generator, so the same instances, seed, and count always yield
//! the same manifest.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::errors::{FaultlineError, FaultlineResult};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub instance_id: String,
    pub repo: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stratum {
    pub repo: String,
    pub available: usize,
    pub selected: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampledInstance {
    pub instance_id: String,
    pub repo: String,
    pub stratum: String,
    #[serde(rename = "instanceIndex")]
    pub instance_index: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleManifest {
    pub dataset: String,
    pub split: String,
    pub seed: u64,
    pub count: usize,
    pub sample_id: String,
    pub strata: Vec<Stratum>,
    pub instances: Vec<SampledInstance>,
}

fn digest(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Parse a JSON array of `{instance_id, repo}` rows, dropping invalid ones.
pub fn parse_instances(raw: &str) -> FaultlineResult<Vec<Instance>> {
    let payload: Value = serde_json::from_str(raw)?;
    let Value::Array(rows) = payload else {
        return Err(FaultlineError::InvalidInput(
            "instances file must be a JSON array".to_string(),
        ));
    };
    let field = |row: &Value, name: &str| -> String {
        match row.get(name) {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        }
    };
    let instances: Vec<Instance> = rows
        .iter()
        .filter(|row| row.is_object())
        .filter_map(|row| {
            let instance_id = field(row, "instance_id");
            let repo = field(row, "repo");
            (!instance_id.is_empty() && !repo.is_empty()).then_some(Instance { instance_id, repo })
        })
        .collect();
    if instances.is_empty() {
        return Err(FaultlineError::InvalidInput(
            "instances file has no valid rows".to_string(),
        ));
    }
    Ok(instances)
}

pub fn load_instances_file(path: &Path) -> FaultlineResult<Vec<Instance>> {
    parse_instances(&std::fs::read_to_string(path)?)
}

/// Split `target` across groups in proportion to their sizes.
///
/// Floors first, then hands out the remainder by largest fractional part
/// (repo name breaks ties), never exceeding a group's size.
pub fn proportional_allocations(
    group_sizes: &BTreeMap<String, usize>,
    target: usize,
) -> FaultlineResult<BTreeMap<String, usize>> {
    let total: usize = group_sizes.values().sum();
    if total == 0 {
        return Err(FaultlineError::InvalidInput(
            "cannot allocate from empty groups".to_string(),
        ));
    }

    let mut allocations = BTreeMap::new();
    let mut fractional: Vec<(&str, f64)> = Vec::with_capacity(group_sizes.len());
    let mut allocated = 0usize;
    for (repo, &size) in group_sizes {
        let exact = target as f64 * size as f64 / total as f64;
        let floor = exact.floor();
        let initial = size.min(floor as usize);
        allocations.insert(repo.clone(), initial);
        allocated += initial;
        fractional.push((repo.as_str(), exact - floor));
    }

    fractional.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(b.0))
    });

    let mut remainder = target.saturating_sub(allocated);
    while remainder > 0 {
        let mut progressed = false;
        for (repo, _) in &fractional {
            if remainder == 0 {
                break;
            }
            let size = group_sizes[*repo];
            let Some(slot) = allocations.get_mut(*repo) else {
                continue;
            };
            if *slot >= size {
                continue;
            }
            *slot += 1;
            remainder -= 1;
            progressed = true;
        }
        if !progressed {
            break;
        }
    }

    Ok(allocations)
}

/// Build a stratified manifest of at most `count` instances.
pub fn build_sample(
    instances: &[Instance],
    dataset: &str,
    split: &str,
    seed: u64,
    count: usize,
) -> FaultlineResult<SampleManifest> {
    if count == 0 {
        return Err(FaultlineError::InvalidInput("count must be >= 1".to_string()));
    }

    let mut groups: BTreeMap<String, Vec<&Instance>> = BTreeMap::new();
    for instance in instances {
        groups.entry(instance.repo.clone()).or_default().push(instance);
    }
    let sizes: BTreeMap<String, usize> = groups.iter().map(|(k, v)| (k.clone(), v.len())).collect();
    let target = count.min(instances.len());
    let allocations = proportional_allocations(&sizes, target)?;

    let mut selected: Vec<&Instance> = Vec::with_capacity(target);
    let mut strata = Vec::with_capacity(groups.len());
    for (repo, rows) in &groups {
        let n = allocations.get(repo).copied().unwrap_or(0);
        let mut keyed: Vec<(String, &Instance)> = rows
            .iter()
            .map(|row| (digest(&format!("{seed}:{repo}:{}", row.instance_id)), *row))
            .collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.instance_id.cmp(&b.1.instance_id)));
        selected.extend(keyed.into_iter().take(n).map(|(_, row)| row));
        strata.push(Stratum {
            repo: repo.clone(),
            available: rows.len(),
            selected: n,
        });
    }

    let mut ordered: Vec<(String, &Instance)> = selected
        .into_iter()
        .map(|row| (digest(&format!("{seed}:{}", row.instance_id)), row))
        .collect();
    ordered.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.repo.cmp(&b.1.repo)));

    let instances = ordered
        .into_iter()
        .enumerate()
        .map(|(i, (_, row))| SampledInstance {
            instance_id: row.instance_id.clone(),
            repo: row.repo.clone(),
            stratum: row.repo.clone(),
            instance_index: i + 1,
        })
        .collect();

    Ok(SampleManifest {
        dataset: dataset.to_string(),
        split: split.to_string(),
        seed,
        count: target,
        sample_id: format!("swebench-{split}-n{target}-seed{seed}"),
        strata,
        instances,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instances() -> Vec<Instance> {
        let mut rows = Vec::new();
        for (repo, n) in [("django/django", 7), ("psf/requests", 2), ("sympy/sympy", 3)] {
            for i in 0..n {
                rows.push(Instance {
                    instance_id: format!("{}-{i}", repo.replace('/', "__")),
                    repo: repo.to_string(),
                });
            }
        }
        rows
    }

    fn sizes(items: &[(&str, usize)]) -> BTreeMap<String, usize> {
        items.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn allocations_sum_to_target_and_respect_sizes() {
        let groups = sizes(&[("a", 7), ("b", 2), ("c", 3)]);
        for target in 1..=12 {
            let alloc = proportional_allocations(&groups, target).unwrap();
            assert_eq!(alloc.values().sum::<usize>(), target);
            for (repo, n) in &alloc {
                assert!(*n <= groups[repo]);
            }
        }
    }

    #[test]
    fn remainder_goes_to_largest_fraction_then_name() {
        // exact: a=1.5, b=1.5 -> floors 1+1, one left for "a"
        let alloc = proportional_allocations(&sizes(&[("b", 3), ("a", 3)]), 3).unwrap();
        assert_eq!(alloc["a"], 2);
        assert_eq!(alloc["b"], 1);
    }

    #[test]
    fn empty_groups_rejected() {
        assert!(proportional_allocations(&BTreeMap::new(), 3).is_err());
    }

    #[test]
    fn sample_is_reproducible_and_indexed() {
        let rows = instances();
        let a = build_sample(&rows, "SWE-bench/SWE-bench_Verified", "test", 42, 6).unwrap();
        let b = build_sample(&rows, "SWE-bench/SWE-bench_Verified", "test", 42, 6).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.count, 6);
        assert_eq!(a.sample_id, "swebench-test-n6-seed42");
        assert_eq!(a.instances.len(), 6);
        let indices: Vec<usize> = a.instances.iter().map(|i| i.instance_index).collect();
        assert_eq!(indices, (1..=6).collect::<Vec<_>>());
        let repos: Vec<&str> = a.strata.iter().map(|s| s.repo.as_str()).collect();
        assert_eq!(repos, vec!["django/django", "psf/requests", "sympy/sympy"]);
        assert_eq!(a.strata.iter().map(|s| s.selected).sum::<usize>(), 6);
        assert!(a.instances.iter().all(|i| i.stratum == i.repo));
    }

    #[test]
    fn count_is_capped_at_available() {
        let rows = instances();
        let manifest = build_sample(&rows, "d", "test", 1, 100).unwrap();
        assert_eq!(manifest.count, rows.len());
        assert_eq!(manifest.sample_id, "swebench-test-n12-seed1");
    }

    #[test]
    fn seed_changes_selection_order() {
        let rows = instances();
        let a = build_sample(&rows, "d", "test", 1, 12).unwrap();
        let b = build_sample(&rows, "d", "test", 2, 12).unwrap();
        let ids = |m: &SampleManifest| m.instances.iter().map(|i| i.instance_id.clone()).collect::<Vec<_>>();
        assert_ne!(ids(&a), ids(&b));
    }

    #[test]
    fn parse_drops_invalid_rows() {
        let raw = r#"[{"instance_id": "a-1", "repo": "a/a"}, {"instance_id": "", "repo": "a/a"}, 3,
                      {"repo": "b/b"}, {"instance_id": " b-2 ", "repo": "b/b"}]"#;
        let parsed = parse_instances(raw).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].instance_id, "b-2");
        assert!(parse_instances("{}").is_err());
        assert!(parse_instances("[{}]").is_err());
    }

    #[test]
    fn manifest_serializes_expected_keys() {
        let manifest = build_sample(&instances(), "d", "test", 42, 2).unwrap();
        let json = serde_json::to_value(&manifest).unwrap();
        assert!(json.get("sampleId").is_some());
        assert!(json["instances"][0].get("instanceIndex").is_some());
        assert!(json["instances"][0].get("instance_id").is_some());
    }
}
