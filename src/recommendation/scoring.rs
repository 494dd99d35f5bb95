//! Pure scoring primitives shared by every component above the repository
//! boundary: linear rescale, cosine similarity, clamping, deterministic
//! top-K selection. No I/O, no async, no crate dependency beyond `std`.

use std::collections::HashMap;
use std::hash::Hash;

/// Rounds to `decimals` places, half away from zero.
///
/// `f64::round()` is documented as round-half-away-from-zero, which is
/// exactly what the source's `scale()` helper relies on.
pub fn round_to(x: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (x * factor).round() / factor
}

/// Linear map from `(a,b)` to `(c,d)`, rounded to 3 decimals.
pub fn rescale(x: f64, src: (f64, f64), dst: (f64, f64)) -> f64 {
    let (a, b) = src;
    let (c, d) = dst;
    round_to((x - a) * (d - c) / (b - a) + c, 3)
}

pub fn clamp01(x: f64) -> f64 {
    clamp_to(x, 0.0, 1.0)
}

pub fn clamp_to(x: f64, min: f64, max: f64) -> f64 {
    if x < min {
        min
    } else if x > max {
        max
    } else {
        x
    }
}

/// Cosine similarity over two `key -> rating` maps. Zero when either norm is
/// zero or the key intersection is empty. Norms are computed over the full
/// map, not just the shared intersection.
pub fn cosine<K: Eq + Hash>(a: &HashMap<K, f64>, b: &HashMap<K, f64>) -> f64 {
    let common: Vec<&K> = a.keys().filter(|k| b.contains_key(*k)).collect();
    if common.is_empty() {
        return 0.0;
    }
    let dot: f64 = common.iter().map(|k| a[*k] * b[*k]).sum();
    let norm_a = a.values().map(|v| v * v).sum::<f64>().sqrt();
    let norm_b = b.values().map(|v| v * v).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Sorts `(score, id)` pairs descending by score, ascending by id on ties,
/// and truncates to the first `k`. Deterministic given the same input,
/// regardless of input order.
pub fn topk_stable<Id: Ord + Copy, T>(mut seq: Vec<(f64, Id, T)>, k: usize) -> Vec<(f64, Id, T)> {
    seq.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.1.cmp(&b.1))
    });
    seq.truncate(k);
    seq
}
