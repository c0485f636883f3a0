/// Sliding-window median with mirrored edges.
///
/// Window positions that fall off either end are reflected back into the
/// signal (`-1 -> 1`, `n -> n - 2`), so a lone spike in the first or last
/// sample is removed like any other. Signals too short to reflect fall back
/// to repeating the edge sample.
pub fn median_filter(data: &[f64], window: usize) -> Vec<f64> {
    let n = data.len();
    if n == 0 || window <= 1 {
        return data.to_vec();
    }
    let half = (window / 2) as isize;
    let mut scratch = Vec::with_capacity(window);
    let mut out = Vec::with_capacity(n);
    for i in 0..n as isize {
        scratch.clear();
        for k in -half..=half {
            scratch.push(data[reflect(i + k, n)]);
        }
        scratch.sort_by(|a, b| a.total_cmp(b));
        out.push(scratch[scratch.len() / 2]);
    }
    out
}

fn reflect(idx: isize, n: usize) -> usize {
    let last = n as isize - 1;
    let mut i = idx;
    if i < 0 {
        i = -i;
    }
    if i > last {
        i = 2 * last - i;
    }
    i.clamp(0, last) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_isolated_spikes() {
        let data = [1.0, 1.0, 100.0, 1.0, 1.0, -80.0, 1.0, 1.0];
        let out = median_filter(&data, 5);
        assert_eq!(out.len(), data.len());
        assert!(out.iter().all(|&v| (v - 1.0).abs() < 1e-12), "{:?}", out);
    }

    #[test]
    fn removes_spike_on_first_sample() {
        let data = [50.0, 2.0, 2.0, 2.0, 2.0, 2.0];
        let out = median_filter(&data, 5);
        assert_eq!(out[0], 2.0);
    }

    #[test]
    fn preserves_step_edges() {
        let data = [0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        assert_eq!(median_filter(&data, 5), data.to_vec());
    }

    #[test]
    fn short_signals_do_not_index_out_of_bounds() {
        assert_eq!(median_filter(&[3.0], 5), vec![3.0]);
        assert_eq!(median_filter(&[1.0, 9.0], 5).len(), 2);
        assert!(median_filter(&[], 5).is_empty());
    }
}
