//! Resistance clustering: grouping broken peaks into price zones.
//!
//! Peaks are sorted by price and split wherever the gap between neighbours,
//! relative to the lower price, exceeds the density threshold. Clusters are
//! recomputed on every scoring call and never stored.

use crate::domain::Peak;

/// Group peaks into clusters of adjacent prices, lowest zone first.
pub fn group_into_clusters(peaks: &[Peak], density_threshold: f64) -> Vec<Vec<&Peak>> {
    let mut sorted: Vec<&Peak> = peaks.iter().collect();
    sorted.sort_by(|a, b| a.price.total_cmp(&b.price));

    let mut clusters: Vec<Vec<&Peak>> = Vec::new();
    for peak in sorted {
        match clusters.last_mut() {
            Some(current) => {
                let prev = current[current.len() - 1].price;
                if prev > 0.0 && (peak.price - prev) / prev <= density_threshold {
                    current.push(peak);
                } else {
                    clusters.push(vec![peak]);
                }
            }
            None => clusters.push(vec![peak]),
        }
    }
    clusters
}

/// The largest cluster; the lowest-priced one wins ties. Empty input gives an empty cluster.
pub fn largest_cluster(peaks: &[Peak], density_threshold: f64) -> Vec<&Peak> {
    let mut best: Vec<&Peak> = Vec::new();
    for cluster in group_into_clusters(peaks, density_threshold) {
        if cluster.len() > best.len() {
            best = cluster;
        }
    }
    best
}
