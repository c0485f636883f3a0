/// Discrete gradient: central differences inside, one-sided at the ends.
pub fn gradient(data: &[f64]) -> Vec<f64> {
    let n = data.len();
    match n {
        0 => Vec::new(),
        1 => vec![0.0],
        _ => {
            let mut out = Vec::with_capacity(n);
            out.push(data[1] - data[0]);
            out.extend(data.windows(3).map(|w| 0.5 * (w[2] - w[0])));
            out.push(data[n - 1] - data[n - 2]);
            out
        }
    }
}

/// `q`-th percentile (0..=100), interpolating linearly between order statistics.
pub fn percentile(data: &[f64], q: f64) -> Option<f64> {
    if data.is_empty() || !(0.0..=100.0).contains(&q) {
        return None;
    }
    let mut sorted = data.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Index of the first maximum.
pub fn argmax(data: &[f64]) -> Option<usize> {
    data.iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if v <= b => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Index of the first minimum.
pub fn argmin(data: &[f64]) -> Option<usize> {
    data.iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if v >= b => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Local maxima of `data`, optionally at least `min_height` tall and at least
/// `min_distance` samples apart.
///
/// A flat-topped maximum reports the middle of its plateau (rounded down). The
/// first and last samples are never peaks. When two peaks are closer than
/// `min_distance` the taller one wins; equal heights keep the earlier one.
pub fn find_peaks(data: &[f64], min_height: Option<f64>, min_distance: usize) -> Vec<usize> {
    let mut peaks = local_maxima(data);
    if let Some(height) = min_height {
        peaks.retain(|&i| data[i] >= height);
    }
    if min_distance > 1 && peaks.len() > 1 {
        peaks = select_by_distance(data, &peaks, min_distance);
    }
    peaks
}

fn local_maxima(data: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    let n = data.len();
    if n < 3 {
        return peaks;
    }
    let last = n - 1;
    let mut i = 1;
    while i < last {
        if data[i - 1] < data[i] {
            let mut ahead = i + 1;
            while ahead < last && data[ahead] == data[i] {
                ahead += 1;
            }
            if data[ahead] < data[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

fn select_by_distance(data: &[f64], peaks: &[usize], distance: usize) -> Vec<usize> {
    let mut keep = vec![true; peaks.len()];
    let mut by_priority: Vec<usize> = (0..peaks.len()).collect();
    by_priority.sort_by(|&a, &b| data[peaks[b]].total_cmp(&data[peaks[a]]).then(a.cmp(&b)));

    for &j in &by_priority {
        if !keep[j] {
            continue;
        }
        let mut k = j;
        while k > 0 && peaks[j] - peaks[k - 1] < distance {
            keep[k - 1] = false;
            k -= 1;
        }
        let mut k = j + 1;
        while k < peaks.len() && peaks[k] - peaks[j] < distance {
            keep[k] = false;
            k += 1;
        }
    }

    peaks
        .iter()
        .zip(keep)
        .filter_map(|(&p, kept)| kept.then_some(p))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gradient_matches_central_differences() {
        let g = gradient(&[1.0, 2.0, 4.0, 7.0, 11.0]);
        assert_eq!(g, vec![1.0, 1.5, 2.5, 3.5, 4.0]);
        assert_eq!(gradient(&[5.0]), vec![0.0]);
    }

    #[test]
    fn percentile_interpolates() {
        let data: Vec<f64> = (1..=5).map(|v| v as f64).collect();
        assert_eq!(percentile(&data, 50.0), Some(3.0));
        assert!((percentile(&data, 95.0).unwrap() - 4.8).abs() < 1e-12);
        assert_eq!(percentile(&data, 0.0), Some(1.0));
        assert_eq!(percentile(&data, 100.0), Some(5.0));
        assert_eq!(percentile(&[], 50.0), None);
    }

    #[test]
    fn plateaus_report_their_middle_and_edges_are_skipped() {
        let data = [5.0, 1.0, 3.0, 3.0, 3.0, 1.0, 2.0, 2.0, 0.0, 4.0];
        assert_eq!(find_peaks(&data, None, 1), vec![3, 6]);
    }

    #[test]
    fn height_and_distance_keep_the_tallest() {
        let data = [0.0, 2.0, 0.0, 5.0, 0.0, 1.0, 0.0, 0.0, 3.0, 0.0];
        assert_eq!(find_peaks(&data, Some(1.5), 1), vec![1, 3, 8]);
        assert_eq!(find_peaks(&data, None, 3), vec![3, 8]);
        assert_eq!(find_peaks(&data, Some(4.0), 3), vec![3]);
    }

    #[test]
    fn equal_heights_prefer_the_earlier_peak() {
        let data = [0.0, 1.0, 0.0, 1.0, 0.0];
        assert_eq!(find_peaks(&data, None, 3), vec![1]);
    }

    #[test]
    fn arg_extrema_take_first_occurrence() {
        let data = [1.0, 3.0, 3.0, -2.0, -2.0];
        assert_eq!(argmax(&data), Some(1));
        assert_eq!(argmin(&data), Some(3));
        assert_eq!(argmax(&[]), None);
    }
}
