//! Stratified train/test split

use crate::error::{CkdError, CkdResult};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Row indices of the two sides of a split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Partition rows so each side keeps the class proportions of `labels`.
///
/// The test side holds `ceil(n * test_size)` rows; per-class test counts are
/// allocated by largest remainder. Reproducible for a given seed.
pub fn stratified_split(labels: &[u8], test_size: f64, seed: u64) -> CkdResult<SplitIndices> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(CkdError::data(format!(
            "test size must be between 0 and 1, got {}",
            test_size
        )));
    }

    let n = labels.len();
    let n_test = (n as f64 * test_size).ceil() as usize;
    let n_train = n - n_test.min(n);

    let mut by_class: [Vec<usize>; 2] = [Vec::new(), Vec::new()];
    for (i, &label) in labels.iter().enumerate() {
        let class = by_class
            .get_mut(label as usize)
            .ok_or_else(|| CkdError::data(format!("label {} is not binary", label)))?;
        class.push(i);
    }

    for (class, members) in by_class.iter().enumerate() {
        if members.len() < 2 {
            return Err(CkdError::data(format!(
                "class {} has {} row(s); a stratified split needs at least 2",
                class,
                members.len()
            )));
        }
    }
    if n_test < 2 || n_train < 2 {
        return Err(CkdError::data(format!(
            "{} rows cannot be split into {} train / {} test",
            n, n_train, n_test
        )));
    }

    let test_counts = allocate(&[by_class[0].len(), by_class[1].len()], n_test);

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(n_train);
    let mut test = Vec::with_capacity(n_test);
    for (members, &count) in by_class.iter_mut().zip(&test_counts) {
        members.shuffle(&mut rng);
        test.extend_from_slice(&members[..count]);
        train.extend_from_slice(&members[count..]);
    }
    train.shuffle(&mut rng);
    test.shuffle(&mut rng);

    Ok(SplitIndices { train, test })
}

/// Proportional integer allocation of `total` over class sizes
fn allocate(sizes: &[usize; 2], total: usize) -> [usize; 2] {
    let n: usize = sizes.iter().sum();
    let exact: Vec<f64> = sizes
        .iter()
        .map(|&size| total as f64 * size as f64 / n as f64)
        .collect();

    let mut counts = [exact[0].floor() as usize, exact[1].floor() as usize];
    let mut remaining = total - counts[0] - counts[1];

    // Hand out the rest by descending fractional part, class 0 first on ties
    let mut order = [0usize, 1];
    order.sort_by(|&a, &b| {
        let fa = exact[a] - exact[a].floor();
        let fb = exact[b] - exact[b].floor();
        fb.total_cmp(&fa)
    });
    for &class in order.iter().cycle() {
        if remaining == 0 {
            break;
        }
        // Keep at least one row of every class on the training side
        if counts[class] + 1 < sizes[class] {
            counts[class] += 1;
            remaining -= 1;
        } else if order.iter().all(|&c| counts[c] + 1 >= sizes[c]) {
            break;
        }
    }

    counts
}
