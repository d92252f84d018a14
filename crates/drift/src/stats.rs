use std::collections::BTreeMap;

/// PSI above this signals a categorical distribution shift.
pub const DEFAULT_PSI_THRESHOLD: f64 = 0.2;
/// KS distance above this signals a continuous distribution shift.
pub const DEFAULT_KS_THRESHOLD: f64 = 0.1;

/// Keeps categories observed on only one side from producing infinite
/// log-ratios.
const SMOOTHING_EPSILON: f64 = 1e-6;

/// Population stability index between two categorical count tables.
///
/// Computed over the union of categories, so a class that appears on only
/// one side still contributes. Symmetric in the sense that any shift adds a
/// positive term; identical proportions score 0.
pub fn population_stability_index(
    reference: &BTreeMap<String, usize>,
    current: &BTreeMap<String, usize>,
) -> f64 {
    let reference_total: usize = reference.values().sum();
    let current_total: usize = current.values().sum();
    if reference_total == 0 || current_total == 0 {
        return 0.0;
    }

    let mut categories: Vec<&str> = reference.keys().map(String::as_str).collect();
    for category in current.keys() {
        if !reference.contains_key(category) {
            categories.push(category);
        }
    }

    categories
        .iter()
        .map(|category| {
            let ref_share = proportion(reference.get(*category), reference_total);
            let cur_share = proportion(current.get(*category), current_total);
            (cur_share - ref_share) * (cur_share / ref_share).ln()
        })
        .sum()
}

fn proportion(count: Option<&usize>, total: usize) -> f64 {
    let share = count.copied().unwrap_or(0) as f64 / total as f64;
    share.max(SMOOTHING_EPSILON)
}

/// Two-sample Kolmogorov-Smirnov statistic: the maximum distance between
/// the empirical CDFs of the two samples. Returns 0 when either sample is
/// empty; callers guard against empty datasets before scoring.
pub fn ks_statistic(reference: &[f64], current: &[f64]) -> f64 {
    if reference.is_empty() || current.is_empty() {
        return 0.0;
    }

    let mut reference: Vec<f64> = reference.to_vec();
    let mut current: Vec<f64> = current.to_vec();
    reference.sort_by(|a, b| a.total_cmp(b));
    current.sort_by(|a, b| a.total_cmp(b));

    let (n, m) = (reference.len() as f64, current.len() as f64);
    let (mut i, mut j) = (0usize, 0usize);
    let mut max_distance = 0.0f64;

    // The ECDFs only differ at sample values, and every element tied at a
    // value must be consumed on both sides before the step is measured.
    while i < reference.len() && j < current.len() {
        let value = if reference[i] <= current[j] {
            reference[i]
        } else {
            current[j]
        };
        while i < reference.len() && reference[i] == value {
            i += 1;
        }
        while j < current.len() && current[j] == value {
            j += 1;
        }
        let distance = (i as f64 / n - j as f64 / m).abs();
        max_distance = max_distance.max(distance);
    }

    max_distance
}
