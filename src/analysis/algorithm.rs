use crate::analysis::config::ClusterConfig;
use crate::geo::haversine_m;
use crate::models::{DeadZoneCluster, SignalMeasurement};

/// Cluster weak-signal points with the default thresholds.
///
/// Callers filter to weak readings first (see [`super::weak_only`]).
pub fn identify_dead_zones(points: &[SignalMeasurement]) -> Vec<DeadZoneCluster> {
    identify_dead_zones_with(points, &ClusterConfig::default())
}

/// Seed clustering: each unprocessed point in input order gathers every other
/// unprocessed point within `radius_m` of itself. Membership is not
/// transitive, so a point close to a member but far from the seed stays out.
///
/// Groups smaller than `min_points` are discarded and their points stay
/// available to later seeds. The reported radius is the configured radius,
/// not the spread of the members.
pub fn identify_dead_zones_with(
    points: &[SignalMeasurement],
    config: &ClusterConfig,
) -> Vec<DeadZoneCluster> {
    let mut processed = vec![false; points.len()];
    let mut clusters = Vec::new();

    for (seed_index, seed) in points.iter().enumerate() {
        if processed[seed_index] {
            continue;
        }

        let members: Vec<usize> = points
            .iter()
            .enumerate()
            .filter(|(index, candidate)| {
                !processed[*index]
                    && (*index == seed_index
                        || haversine_m(
                            seed.latitude(),
                            seed.longitude(),
                            candidate.latitude(),
                            candidate.longitude(),
                        ) <= config.radius_m)
            })
            .map(|(index, _)| index)
            .collect();

        if members.len() < config.min_points {
            continue;
        }

        for &index in &members {
            processed[index] = true;
        }
        clusters.push(build_cluster(clusters.len(), &members, points, config));
    }

    clusters
}

fn build_cluster(
    ordinal: usize,
    members: &[usize],
    points: &[SignalMeasurement],
    config: &ClusterConfig,
) -> DeadZoneCluster {
    let count = members.len() as f64;
    let (lat_sum, lon_sum) = members.iter().fold((0.0, 0.0), |(lat, lon), &index| {
        (lat + points[index].latitude(), lon + points[index].longitude())
    });

    DeadZoneCluster {
        id: format!("dead-zone-{ordinal}"),
        center_latitude: lat_sum / count,
        center_longitude: lon_sum / count,
        radius_meters: config.radius_m,
        member_count: members.len(),
        source_points: members.iter().map(|&index| points[index].clone()).collect(),
    }
}
