//! Null-aware descriptive statistics over `Option<f64>` slices.
//!
//! `None` and NaN are both treated as missing. Functions that have no
//! defined result on empty input return `None` instead of a sentinel.

fn present(values: &[Option<f64>]) -> impl Iterator<Item = f64> + '_ {
    values.iter().filter_map(|v| v.filter(|x| !x.is_nan()))
}

/// Pairs where the value is present and the weight is strictly positive.
/// A missing weight counts as zero.
fn weighted_pairs(values: &[Option<f64>], weights: &[Option<f64>]) -> Vec<(f64, f64)> {
    values
        .iter()
        .zip(weights)
        .filter_map(|(v, w)| {
            let v = v.filter(|x| !x.is_nan())?;
            let w = w.filter(|x| !x.is_nan()).unwrap_or(0.0);
            (w > 0.0).then_some((v, w))
        })
        .collect()
}

/// Σ(v·w) / Σw over usable pairs.
pub fn weighted_mean(values: &[Option<f64>], weights: &[Option<f64>]) -> Option<f64> {
    let pairs = weighted_pairs(values, weights);
    if pairs.is_empty() {
        return None;
    }
    let total: f64 = pairs.iter().map(|(_, w)| w).sum();
    let weighted: f64 = pairs.iter().map(|(v, w)| v * w).sum();
    Some(weighted / total)
}

/// Σ(v·w) over rows with a value, divided by Σw over every row.
///
/// Rows with a missing value still count in the denominator and weights are
/// taken as given, so this is not a mean of the present values. A missing
/// weight is zero; a zero total gives `None`.
pub fn respondent_mean(values: &[Option<f64>], weights: &[Option<f64>]) -> Option<f64> {
    let weight = |w: &Option<f64>| w.filter(|x| !x.is_nan()).unwrap_or(0.0);
    let total: f64 = weights.iter().map(weight).sum();
    if total == 0.0 {
        return None;
    }
    let weighted: f64 = values
        .iter()
        .zip(weights)
        .filter_map(|(v, w)| v.filter(|x| !x.is_nan()).map(|v| v * weight(w)))
        .sum();
    Some(weighted / total)
}

/// Lower weighted median: the smallest value whose cumulative weight reaches
/// half of the total weight. Always one of the input values.
pub fn weighted_median(values: &[Option<f64>], weights: &[Option<f64>]) -> Option<f64> {
    let mut pairs = weighted_pairs(values, weights);
    if pairs.is_empty() {
        return None;
    }
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let cutoff = pairs.iter().map(|(_, w)| w).sum::<f64>() / 2.0;
    let mut cumulative = 0.0;
    for (value, weight) in &pairs {
        cumulative += weight;
        if cumulative >= cutoff {
            return Some(*value);
        }
    }
    pairs.last().map(|(v, _)| *v)
}

/// Arithmetic mean of the present values.
pub fn mean(values: &[Option<f64>]) -> Option<f64> {
    let (sum, count) = present(values).fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Ordinary median; averages the two middle values for even counts.
pub fn median(values: &[Option<f64>]) -> Option<f64> {
    quantile(values, 0.5)
}

/// Sum of the present values, `0.0` when there are none.
pub fn sum(values: &[Option<f64>]) -> f64 {
    present(values).sum()
}

/// Quantile with linear interpolation between closest ranks.
///
/// `q` is clamped into `[0, 1]`.
pub fn quantile(values: &[Option<f64>], q: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = present(values).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    let rank = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Smallest and largest present values.
pub fn min_max(values: &[Option<f64>]) -> Option<(f64, f64)> {
    present(values).fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}
