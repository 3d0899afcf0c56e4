//! Top-k hit metrics for predicted file lists.

use serde::{Deserialize, Serialize};

fn normalize_path(path: &str) -> String {
    let forward = path.trim().replace('\\', "/");
    let mut rest = forward.as_str();
    while let Some(stripped) = rest.strip_prefix("./") {
        rest = stripped;
    }
    rest.to_string()
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Whether a predicted path names the gold path.
///
/// Exact match after normalization, or equal non-empty basenames. Substring
/// containment never counts.
pub fn paths_match(predicted: &str, gold: &str) -> bool {
    let predicted = normalize_path(predicted);
    let gold = normalize_path(gold);
    if predicted.is_empty() || gold.is_empty() {
        return false;
    }
    if predicted == gold {
        return true;
    }
    let (p, g) = (basename(&predicted), basename(&gold));
    !p.is_empty() && p == g
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HitRates {
    pub top1: bool,
    pub top3: bool,
    pub top5: bool,
}

fn hit_within(gold: &[String], predicted: &[String], k: usize) -> bool {
    predicted
        .iter()
        .take(k)
        .any(|p| gold.iter().any(|g| paths_match(p, g)))
}

pub fn evaluate_prediction(gold: &[String], predicted: &[String]) -> HitRates {
    HitRates {
        top1: hit_within(gold, predicted, 1),
        top3: hit_within(gold, predicted, 3),
        top5: hit_within(gold, predicted, 5),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn exact_and_normalized_matches() {
        assert!(paths_match("django/urls/base.py", "django/urls/base.py"));
        assert!(paths_match("./django\\urls\\base.py", "django/urls/base.py"));
    }

    #[test]
    fn basename_matches() {
        assert!(paths_match("urls/base.py", "django/urls/base.py"));
    }

    #[test]
    fn substring_never_matches() {
        assert!(!paths_match("base.py", "django/urls/database.py"));
        assert!(!paths_match("django/urls", "django/urls/base.py"));
        assert!(!paths_match("", "a.py"));
        assert!(!paths_match("dir/", "other/dir/"));
    }

    #[test]
    fn hit_rates_by_position() {
        let gold = v(&["django/urls/base.py"]);
        let predicted = v(&["a.py", "b.py", "c.py", "base.py", "e.py"]);
        let rates = evaluate_prediction(&gold, &predicted);
        assert_eq!(
            rates,
            HitRates {
                top1: false,
                top3: false,
                top5: true
            }
        );
        let first = evaluate_prediction(&gold, &v(&["django/urls/base.py"]));
        assert!(first.top1 && first.top3 && first.top5);
        assert_eq!(evaluate_prediction(&gold, &[]), HitRates::default());
    }
}
