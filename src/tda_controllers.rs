// Controllers for the Transit Delay Analysis dashboard: the pure computation
// layer between the fetched record set and the views. Everything here is a
// read-only pass over `&[VehicleRecord]`; nothing touches the network.
use crate::tda_models::{DelayCategory, VehicleRecord};
use std::collections::{HashMap, HashSet};

// ============================================================================
// Filtering
// ============================================================================

/// Up to three optional equality selectors, combined with logical AND.
/// A `None` selector places no constraint; an all-`None` filter is the
/// identity transform.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VehicleFilter {
    pub vehicle_id: Option<String>,
    pub route: Option<String>,
    pub category: Option<DelayCategory>,
}

impl VehicleFilter {
    pub fn is_empty(&self) -> bool {
        self.vehicle_id.is_none() && self.route.is_none() && self.category.is_none()
    }

    pub fn matches(&self, record: &VehicleRecord) -> bool {
        self.vehicle_id
            .as_ref()
            .map_or(true, |id| &record.vehicle_id == id)
            && self.route.as_ref().map_or(true, |route| &record.route == route)
            && self
                .category
                .map_or(true, |category| record.delay_category == category)
    }

    /// Returns the matching subset in original order.
    pub fn apply(&self, records: &[VehicleRecord]) -> Vec<VehicleRecord> {
        records.iter().filter(|r| self.matches(r)).cloned().collect()
    }
}

// ============================================================================
// Aggregation Results
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryStats {
    pub total_vehicles: usize,
    pub unique_routes: usize,
    pub mean_delay: f64,
    pub on_time: usize,
    pub high_delay: usize,
    pub most_delayed: Option<String>,
    pub least_delayed: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RouteComparison {
    /// Filtered set is empty, nothing to anchor the comparison on.
    NoSelection,
    /// Exactly one vehicle on the anchor route.
    NothingToCompare { route: String },
    /// Vehicles on the anchor route, sorted descending by delay.
    Ranked {
        route: String,
        vehicles: Vec<(String, u8)>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Prediction {
    NoData,
    Best {
        hour: u32,
        vehicle_id: String,
        delay_minutes: u8,
    },
}

// ============================================================================
// Main Implementation
// ============================================================================

pub struct TdaControllers;

impl TdaControllers {
    /// Summary statistics over the full (unfiltered) record set.
    pub fn summary(records: &[VehicleRecord]) -> SummaryStats {
        let total_vehicles = records.len();
        let unique_routes = records
            .iter()
            .map(|r| r.route.as_str())
            .collect::<HashSet<_>>()
            .len();

        let mean_delay = if records.is_empty() {
            0.0
        } else {
            let sum: u32 = records.iter().map(|r| u32::from(r.delay_minutes)).sum();
            f64::from(sum) / total_vehicles as f64
        };

        let on_time = records
            .iter()
            .filter(|r| r.delay_category == DelayCategory::OnTime)
            .count();
        let high_delay = records
            .iter()
            .filter(|r| r.delay_category == DelayCategory::HighDelay)
            .count();

        SummaryStats {
            total_vehicles,
            unique_routes,
            mean_delay,
            on_time,
            high_delay,
            most_delayed: Self::most_delayed(records).map(|r| r.vehicle_id.clone()),
            least_delayed: Self::least_delayed(records).map(|r| r.vehicle_id.clone()),
        }
    }

    /// Anchors on the first filtered record's route, then ranks every vehicle
    /// of that route from the FULL set by delay, descending. Stable sort, so
    /// equal delays keep their original order.
    pub fn route_comparison(
        full: &[VehicleRecord],
        filtered: &[VehicleRecord],
    ) -> RouteComparison {
        let Some(first) = filtered.first() else {
            return RouteComparison::NoSelection;
        };
        let route = first.route.clone();

        let mut vehicles: Vec<(String, u8)> = full
            .iter()
            .filter(|r| r.route == route)
            .map(|r| (r.vehicle_id.clone(), r.delay_minutes))
            .collect();

        if vehicles.len() < 2 {
            return RouteComparison::NothingToCompare { route };
        }

        vehicles.sort_by(|a, b| b.1.cmp(&a.1));
        RouteComparison::Ranked { route, vehicles }
    }

    /// Mean delay per route over the full set, one entry per distinct route,
    /// sorted descending by the average (route id breaks ties).
    pub fn route_averages(records: &[VehicleRecord]) -> Vec<(String, f64)> {
        let mut per_route: HashMap<&str, (u32, usize)> = HashMap::new();
        for record in records {
            let entry = per_route.entry(record.route.as_str()).or_insert((0, 0));
            entry.0 += u32::from(record.delay_minutes);
            entry.1 += 1;
        }

        let mut averages: Vec<(String, f64)> = per_route
            .into_iter()
            .map(|(route, (sum, count))| (route.to_string(), f64::from(sum) / count as f64))
            .collect();

        averages.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        averages
    }

    /// Best hour and best vehicle for a route. The query is matched
    /// case-insensitively against trimmed route ids.
    pub fn predict(records: &[VehicleRecord], route_query: &str) -> Prediction {
        let query = route_query.trim().to_lowercase();
        let route_records: Vec<&VehicleRecord> = records
            .iter()
            .filter(|r| r.route.trim().to_lowercase() == query)
            .collect();

        if route_records.is_empty() {
            return Prediction::NoData;
        }

        let mut per_hour: HashMap<u32, (u32, usize)> = HashMap::new();
        for record in &route_records {
            let entry = per_hour.entry(record.hour).or_insert((0, 0));
            entry.0 += u32::from(record.delay_minutes);
            entry.1 += 1;
        }

        // Scan hours in ascending order with a strict comparison, so equal
        // means resolve to the smallest hour.
        let mut hours: Vec<(u32, f64)> = per_hour
            .into_iter()
            .map(|(hour, (sum, count))| (hour, f64::from(sum) / count as f64))
            .collect();
        hours.sort_by_key(|&(hour, _)| hour);

        let mut best = hours[0];
        for &(hour, mean) in &hours[1..] {
            if mean < best.1 {
                best = (hour, mean);
            }
        }

        // First record in original order wins a delay tie.
        let mut best_vehicle = route_records[0];
        for record in &route_records[1..] {
            if record.delay_minutes < best_vehicle.delay_minutes {
                best_vehicle = record;
            }
        }

        Prediction::Best {
            hour: best.0,
            vehicle_id: best_vehicle.vehicle_id.clone(),
            delay_minutes: best_vehicle.delay_minutes,
        }
    }

    /// Distinct vehicle ids in first-seen order, for the filter dropdown.
    pub fn distinct_vehicle_ids(records: &[VehicleRecord]) -> Vec<String> {
        let mut seen = HashSet::new();
        records
            .iter()
            .filter(|r| seen.insert(r.vehicle_id.as_str()))
            .map(|r| r.vehicle_id.clone())
            .collect()
    }

    /// Distinct route ids in first-seen order, for the filter dropdown.
    pub fn distinct_routes(records: &[VehicleRecord]) -> Vec<String> {
        let mut seen = HashSet::new();
        records
            .iter()
            .filter(|r| seen.insert(r.route.as_str()))
            .map(|r| r.route.clone())
            .collect()
    }

    /// Sorted distinct routes, for the prediction selector.
    pub fn sorted_routes(records: &[VehicleRecord]) -> Vec<String> {
        let mut routes = Self::distinct_routes(records);
        routes.sort();
        routes
    }

    // ========================================================================
    // Helper Functions
    // ========================================================================

    /// First record holding the maximum delay (original order breaks ties).
    fn most_delayed(records: &[VehicleRecord]) -> Option<&VehicleRecord> {
        let mut best: Option<&VehicleRecord> = None;
        for record in records {
            match best {
                Some(current) if record.delay_minutes <= current.delay_minutes => {}
                _ => best = Some(record),
            }
        }
        best
    }

    /// First record holding the minimum delay (original order breaks ties).
    fn least_delayed(records: &[VehicleRecord]) -> Option<&VehicleRecord> {
        let mut best: Option<&VehicleRecord> = None;
        for record in records {
            match best {
                Some(current) if record.delay_minutes >= current.delay_minutes => {}
                _ => best = Some(record),
            }
        }
        best
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn rec(vehicle_id: &str, route: &str, delay_minutes: u8, hour: u32) -> VehicleRecord {
        let stamp = format!("2026-08-06T{:02}:15:00-04:00", hour);
        VehicleRecord::new(
            vehicle_id.to_string(),
            route.to_string(),
            42.36,
            -71.06,
            "IN_TRANSIT_TO".to_string(),
            DateTime::parse_from_rfc3339(&stamp).unwrap(),
            delay_minutes,
        )
    }

    fn fixture() -> Vec<VehicleRecord> {
        vec![
            rec("v0", "A", 0, 8),
            rec("v1", "B", 2, 9),
            rec("v2", "A", 5, 10),
            rec("v3", "C", 6, 11),
        ]
    }

    // ========================================================================
    // Filtering
    // ========================================================================

    #[test]
    fn test_empty_filter_is_identity() {
        let records = fixture();
        let filter = VehicleFilter::default();
        assert!(filter.is_empty());

        let filtered = filter.apply(&records);
        assert_eq!(filtered.len(), records.len());
        for (a, b) in filtered.iter().zip(records.iter()) {
            assert_eq!(a.vehicle_id, b.vehicle_id);
        }
    }

    #[test]
    fn test_filter_is_idempotent() {
        let records = fixture();
        let filter = VehicleFilter {
            route: Some("A".to_string()),
            category: Some(DelayCategory::HighDelay),
            ..Default::default()
        };

        let once = filter.apply(&records);
        let twice = filter.apply(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_filter_selectors_combine_with_and() {
        let records = fixture();

        let by_route = VehicleFilter {
            route: Some("A".to_string()),
            ..Default::default()
        };
        assert_eq!(by_route.apply(&records).len(), 2);

        let by_route_and_category = VehicleFilter {
            route: Some("A".to_string()),
            category: Some(DelayCategory::OnTime),
            ..Default::default()
        };
        let hits = by_route_and_category.apply(&records);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].vehicle_id, "v0");

        let by_vehicle = VehicleFilter {
            vehicle_id: Some("v3".to_string()),
            ..Default::default()
        };
        let hits = by_vehicle.apply(&records);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].route, "C");
    }

    // ========================================================================
    // Summary statistics
    // ========================================================================

    #[test]
    fn test_summary_known_values() {
        // Delays [0, 2, 5, 6]: mean 3.25, one On Time, two High Delay.
        let records = fixture();
        let stats = TdaControllers::summary(&records);

        assert_eq!(stats.total_vehicles, 4);
        assert_eq!(stats.unique_routes, 3);
        assert!((stats.mean_delay - 3.25).abs() < 1e-9);
        assert_eq!(stats.on_time, 1);
        assert_eq!(stats.high_delay, 2);
        assert_eq!(stats.most_delayed.as_deref(), Some("v3"));
        assert_eq!(stats.least_delayed.as_deref(), Some("v0"));
    }

    #[test]
    fn test_summary_tie_breaks_by_original_order() {
        let records = vec![
            rec("first-max", "A", 4, 8),
            rec("low", "A", 2, 9),
            rec("second-max", "A", 4, 10),
            rec("second-min", "A", 2, 11),
        ];
        let stats = TdaControllers::summary(&records);
        assert_eq!(stats.most_delayed.as_deref(), Some("first-max"));
        assert_eq!(stats.least_delayed.as_deref(), Some("low"));
    }

    #[test]
    fn test_summary_empty_set() {
        let stats = TdaControllers::summary(&[]);
        assert_eq!(stats.total_vehicles, 0);
        assert_eq!(stats.mean_delay, 0.0);
        assert_eq!(stats.most_delayed, None);
        assert_eq!(stats.least_delayed, None);
    }

    // ========================================================================
    // Per-route comparison
    // ========================================================================

    #[test]
    fn test_comparison_ranks_descending() {
        let full = vec![rec("a", "A", 3, 8), rec("b", "A", 5, 9), rec("c", "B", 1, 10)];
        let filter = VehicleFilter {
            route: Some("A".to_string()),
            ..Default::default()
        };
        let filtered = filter.apply(&full);

        match TdaControllers::route_comparison(&full, &filtered) {
            RouteComparison::Ranked { route, vehicles } => {
                assert_eq!(route, "A");
                let delays: Vec<u8> = vehicles.iter().map(|(_, d)| *d).collect();
                assert_eq!(delays, vec![5, 3]);
            }
            other => panic!("expected ranked comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_comparison_uses_full_set_not_filtered() {
        // The filter narrows route A down to the high-delay vehicle, but the
        // ranking must still cover every route-A vehicle.
        let full = vec![rec("a", "A", 3, 8), rec("b", "A", 5, 9)];
        let filter = VehicleFilter {
            category: Some(DelayCategory::HighDelay),
            ..Default::default()
        };
        let filtered = filter.apply(&full);
        assert_eq!(filtered.len(), 1);

        match TdaControllers::route_comparison(&full, &filtered) {
            RouteComparison::Ranked { vehicles, .. } => assert_eq!(vehicles.len(), 2),
            other => panic!("expected ranked comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_comparison_single_vehicle_is_degenerate() {
        let full = vec![rec("a", "A", 3, 8), rec("c", "B", 1, 10)];
        let filtered = vec![full[0].clone()];

        assert_eq!(
            TdaControllers::route_comparison(&full, &filtered),
            RouteComparison::NothingToCompare {
                route: "A".to_string()
            }
        );
    }

    #[test]
    fn test_comparison_empty_filtered_set() {
        let full = fixture();
        assert_eq!(
            TdaControllers::route_comparison(&full, &[]),
            RouteComparison::NoSelection
        );
    }

    #[test]
    fn test_comparison_equal_delays_keep_original_order() {
        let full = vec![rec("a", "A", 4, 8), rec("b", "A", 4, 9), rec("c", "A", 6, 10)];
        match TdaControllers::route_comparison(&full, &full.clone()) {
            RouteComparison::Ranked { vehicles, .. } => {
                let ids: Vec<&str> = vehicles.iter().map(|(id, _)| id.as_str()).collect();
                assert_eq!(ids, vec!["c", "a", "b"]);
            }
            other => panic!("expected ranked comparison, got {:?}", other),
        }
    }

    // ========================================================================
    // All-routes average
    // ========================================================================

    #[test]
    fn test_route_averages_one_value_per_route() {
        let records = vec![
            rec("a", "A", 2, 8),
            rec("b", "A", 4, 9),
            rec("c", "B", 1, 10),
            rec("d", "C", 6, 11),
        ];
        let averages = TdaControllers::route_averages(&records);

        assert_eq!(averages.len(), 3);
        assert_eq!(averages[0], ("C".to_string(), 6.0));
        assert_eq!(averages[1], ("A".to_string(), 3.0));
        assert_eq!(averages[2], ("B".to_string(), 1.0));
    }

    // ========================================================================
    // Prediction
    // ========================================================================

    #[test]
    fn test_prediction_best_hour_and_vehicle() {
        let records = vec![rec("morning", "A", 4, 8), rec("late", "A", 1, 9)];

        assert_eq!(
            TdaControllers::predict(&records, "A"),
            Prediction::Best {
                hour: 9,
                vehicle_id: "late".to_string(),
                delay_minutes: 1,
            }
        );
    }

    #[test]
    fn test_prediction_route_match_is_trimmed_and_case_insensitive() {
        let records = vec![rec("v", "Red", 2, 14)];
        match TdaControllers::predict(&records, "  red ") {
            Prediction::Best { vehicle_id, .. } => assert_eq!(vehicle_id, "v"),
            Prediction::NoData => panic!("query should have matched route Red"),
        }
    }

    #[test]
    fn test_prediction_no_data() {
        assert_eq!(TdaControllers::predict(&fixture(), "Z"), Prediction::NoData);
        assert_eq!(TdaControllers::predict(&[], "A"), Prediction::NoData);
    }

    #[test]
    fn test_prediction_hour_tie_takes_smallest_hour() {
        // Hours 7 and 12 both average 3.0.
        let records = vec![
            rec("a", "A", 3, 12),
            rec("b", "A", 3, 7),
            rec("c", "A", 5, 15),
        ];
        match TdaControllers::predict(&records, "A") {
            Prediction::Best { hour, .. } => assert_eq!(hour, 7),
            Prediction::NoData => panic!("route A has data"),
        }
    }

    #[test]
    fn test_prediction_vehicle_tie_takes_first_in_order() {
        let records = vec![rec("early", "A", 1, 8), rec("later", "A", 1, 9)];
        match TdaControllers::predict(&records, "A") {
            Prediction::Best { vehicle_id, .. } => assert_eq!(vehicle_id, "early"),
            Prediction::NoData => panic!("route A has data"),
        }
    }

    // ========================================================================
    // Dropdown helpers
    // ========================================================================

    #[test]
    fn test_distinct_lists() {
        let records = vec![
            rec("v1", "B", 0, 8),
            rec("v2", "A", 1, 9),
            rec("v1", "B", 2, 10),
        ];
        assert_eq!(
            TdaControllers::distinct_vehicle_ids(&records),
            vec!["v1".to_string(), "v2".to_string()]
        );
        assert_eq!(
            TdaControllers::distinct_routes(&records),
            vec!["B".to_string(), "A".to_string()]
        );
        assert_eq!(
            TdaControllers::sorted_routes(&records),
            vec!["A".to_string(), "B".to_string()]
        );
    }
}
