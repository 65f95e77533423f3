use crate::matrix::SensorMatrix;

/// Positions used as the x axis for interpolation.
///
/// Seconds since the first row when every row has a timestamp and the
/// timestamps never go backwards; row numbers otherwise.
pub fn interpolation_axis(matrix: &SensorMatrix) -> Vec<f64> {
    let by_row = || (0..matrix.height()).map(|i| i as f64).collect();

    let Some(ts) = matrix.timestamps() else {
        return by_row();
    };
    let Some(known) = ts.iter().copied().collect::<Option<Vec<_>>>() else {
        return by_row();
    };
    if known.windows(2).any(|w| w[1] < w[0]) {
        return by_row();
    }

    let Some(&origin) = known.first() else {
        return Vec::new();
    };
    known
        .iter()
        .map(|t| (*t - origin).num_milliseconds() as f64 / 1000.0)
        .collect()
}

/// Fill `None` (and `NaN`) cells by linear interpolation along `axis`.
///
/// Cells before the first or after the last known value take that edge
/// value. A series with no known value comes back unchanged.
pub fn interpolate_linear(values: &[Option<f64>], axis: &[f64]) -> Vec<Option<f64>> {
    debug_assert_eq!(values.len(), axis.len());

    let known: Vec<usize> = values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_some_and(|x| !x.is_nan()))
        .map(|(i, _)| i)
        .collect();

    let (Some(&first), Some(&last)) = (known.first(), known.last()) else {
        return values.to_vec();
    };

    let mut out = values.to_vec();
    let value_at = |i: usize| values[i].unwrap_or(f64::NAN);

    for cell in out.iter_mut().take(first) {
        *cell = Some(value_at(first));
    }
    for cell in out.iter_mut().skip(last + 1) {
        *cell = Some(value_at(last));
    }

    for pair in known.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        if hi - lo < 2 {
            continue;
        }
        let (x0, x1) = (axis[lo], axis[hi]);
        let (y0, y1) = (value_at(lo), value_at(hi));
        let span = x1 - x0;

        for (i, cell) in out.iter_mut().enumerate().take(hi).skip(lo + 1) {
            let value = if span > 0.0 {
                y0 + (y1 - y0) * (axis[i] - x0) / span
            } else {
                y0
            };
            *cell = Some(value);
        }
    }

    out
}
