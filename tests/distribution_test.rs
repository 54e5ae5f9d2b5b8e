//! Integration tests for the online frequency distribution.

use covisit::Distribution;

fn from_samples(samples: &[i64]) -> Distribution {
    let mut dist = Distribution::new();
    for &v in samples {
        dist.add_value(v);
    }
    dist
}

#[test]
fn test_empty() {
    let dist = Distribution::new();
    assert!(dist.is_empty());
    assert_eq!(dist.count(), 0);
    assert_eq!(dist.average(), 0.0);
    assert_eq!(dist.median(), 0.0);
}

#[test]
fn test_average_matches_sum_over_count() {
    let samples = [3, 7, 7, 0, 12, 5, 5, 5, 100];
    let dist = from_samples(&samples);

    let expected = samples.iter().sum::<i64>() as f64 / samples.len() as f64;
    assert!((dist.average() - expected).abs() < 1e-9);
    assert_eq!(dist.count(), samples.len() as u64);
}

#[test]
fn test_average_independent_of_insertion_order() {
    let forward = from_samples(&[1, 2, 3, 4, 5, 6, 7, 8]);
    let backward = from_samples(&[8, 7, 6, 5, 4, 3, 2, 1]);
    assert!((forward.average() - backward.average()).abs() < 1e-9);
}

#[test]
fn test_median_odd_count() {
    let dist = from_samples(&[9, 1, 5]);
    assert_eq!(dist.median(), 5.0);
}

#[test]
fn test_median_even_count_between_keys() {
    // Half-way point falls between two distinct values.
    let dist = from_samples(&[1, 2]);
    assert_eq!(dist.median(), 1.5);

    let dist = from_samples(&[1, 1, 2, 2]);
    assert_eq!(dist.median(), 1.5);

    let dist = from_samples(&[1, 2, 3, 4]);
    assert_eq!(dist.median(), 2.5);
}

#[test]
fn test_median_even_count_within_key() {
    // Both central elements share the same value.
    let dist = from_samples(&[1, 2, 2, 5]);
    assert_eq!(dist.median(), 2.0);
}

#[test]
fn test_median_single_value() {
    let dist = from_samples(&[42]);
    assert_eq!(dist.median(), 42.0);
}

#[test]
fn test_median_repeated_value() {
    let dist = from_samples(&[7, 7, 7, 7]);
    assert_eq!(dist.median(), 7.0);
}

#[test]
fn test_median_independent_of_insertion_order() {
    let a = from_samples(&[10, 0, 30, 20, 40]);
    let b = from_samples(&[40, 30, 20, 10, 0]);
    let c = from_samples(&[20, 40, 0, 30, 10]);
    assert_eq!(a.median(), 20.0);
    assert_eq!(a.median(), b.median());
    assert_eq!(a.median(), c.median());
}

#[test]
fn test_median_with_zero_samples_present() {
    let dist = from_samples(&[0, 0, 0, 200, 200]);
    assert_eq!(dist.median(), 0.0);
}

#[test]
fn test_histogram_is_ordered() {
    let dist = from_samples(&[5, 1, 5, 3]);
    let entries: Vec<(i64, u64)> = dist.histogram().collect();
    assert_eq!(entries, vec![(1, 1), (3, 1), (5, 2)]);
}
