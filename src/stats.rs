//! Elementary statistics over rows with missing cells.
//!
//! Every function skips `None` cells and returns `None` when there are not enough
//! observations for the statistic to be defined.

/// Arithmetic mean of the recorded values. Needs at least one observation.
pub fn mean(values: &[Option<f64>]) -> Option<f64> {
    let (count, sum) = values
        .iter()
        .flatten()
        .fold((0usize, 0.0), |(n, s), v| (n + 1, s + v));

    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Sample standard deviation (divides by `n - 1`). Needs at least two observations.
pub fn sample_std(values: &[Option<f64>]) -> Option<f64> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.len() < 2 {
        return None;
    }

    let n = present.len() as f64;
    let mean = present.iter().sum::<f64>() / n;
    let sum_sq: f64 = present.iter().map(|v| (v - mean).powi(2)).sum();
    Some((sum_sq / (n - 1.0)).sqrt())
}

/// Least-squares slope of `y` against `x`: `cov(x, y) / var(x)`.
///
/// Returns `None` for fewer than two points or when every `x` is identical.
pub fn ols_slope(points: &[(f64, f64)]) -> Option<f64> {
    if points.len() < 2 {
        return None;
    }

    let n = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (sxy, sxx) = points.iter().fold((0.0, 0.0), |(sxy, sxx), (x, y)| {
        let dx = x - mean_x;
        (sxy + dx * (y - mean_y), sxx + dx * dx)
    });

    if sxx == 0.0 {
        None
    } else {
        Some(sxy / sxx)
    }
}

/// Index and value of the smallest recorded value; the first one wins on ties.
pub fn min_with_index(values: &[Option<f64>]) -> Option<(usize, f64)> {
    extreme_with_index(values, |candidate, best| candidate < best)
}

/// Index and value of the largest recorded value; the first one wins on ties.
pub fn max_with_index(values: &[Option<f64>]) -> Option<(usize, f64)> {
    extreme_with_index(values, |candidate, best| candidate > best)
}

fn extreme_with_index<F>(values: &[Option<f64>], better: F) -> Option<(usize, f64)>
where
    F: Fn(f64, f64) -> bool,
{
    values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i, v)))
        .fold(None, |best, (i, v)| match best {
            Some((_, b)) if !better(v, b) => best,
            _ => Some((i, v)),
        })
}

/// Sum of the recorded values, treating missing cells as zero.
pub fn sum(values: &[Option<f64>]) -> f64 {
    values.iter().flatten().sum()
}
