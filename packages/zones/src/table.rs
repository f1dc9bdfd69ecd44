//! Zone table construction, filtering, and summary statistics.

use tree_zones_models::{NormalizedTreeRecord, ZoneRecord};

use crate::policy::protection_zone;

/// Which records make it into the zone table.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ZoneFilter {
    /// Minimum trunk diameter in inches (inclusive).
    pub min_diameter: f64,
}

impl ZoneFilter {
    /// Whether `record` passes the filter.
    #[must_use]
    pub fn matches(&self, record: &NormalizedTreeRecord) -> bool {
        record.diameter >= self.min_diameter
    }
}

/// Builds the zone table for the records passing `filter`.
///
/// Returns a new table; `records` is left untouched so the same set can be
/// re-filtered with different parameters.
#[must_use]
pub fn zone_records(records: &[NormalizedTreeRecord], filter: &ZoneFilter) -> Vec<ZoneRecord> {
    records
        .iter()
        .filter(|record| filter.matches(record))
        .map(|record| ZoneRecord::new(record.clone(), protection_zone(record.diameter)))
        .collect()
}

/// Headline numbers for a filtered zone table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneSummary {
    /// Trees before filtering.
    pub total_trees: usize,
    /// Trees after filtering.
    pub filtered_trees: usize,
    /// Mean diameter of the filtered trees (0 when none).
    pub average_diameter: f64,
    /// Mean protection radius in feet of the filtered trees (0 when none).
    pub average_radius_feet: f64,
}

impl ZoneSummary {
    #[must_use]
    pub fn new(total_trees: usize, zones: &[ZoneRecord]) -> Self {
        Self {
            total_trees,
            filtered_trees: zones.len(),
            average_diameter: mean(zones.iter().map(|z| z.diameter)),
            average_radius_feet: mean(zones.iter().map(|z| z.protection_radius_feet)),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(diameter: f64) -> NormalizedTreeRecord {
        NormalizedTreeRecord {
            longitude: -89.385_608,
            latitude: 43.056_392,
            diameter,
            species_common: "Honeylocust".to_string(),
            species_botanical: "Gleditsia triacanthos".to_string(),
            status: "Active".to_string(),
            site_id: "1".to_string(),
            object_id: Some(1),
        }
    }

    #[test]
    fn default_filter_keeps_everything() {
        let records = vec![record(0.0), record(3.0), record(30.0)];
        assert_eq!(zone_records(&records, &ZoneFilter::default()).len(), 3);
    }

    #[test]
    fn filter_is_inclusive_and_does_not_mutate_input() {
        let records = vec![record(4.0), record(10.0), record(12.0)];
        let filter = ZoneFilter { min_diameter: 10.0 };
        let zones = zone_records(&records, &filter);
        assert_eq!(zones.len(), 2);
        assert_eq!(records.len(), 3);
        assert!((zones[0].diameter - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zone_row_carries_record_and_radii() {
        let zones = zone_records(&[record(6.0)], &ZoneFilter::default());
        let zone = &zones[0];
        assert_eq!(zone.species_common, "Honeylocust");
        assert_eq!(zone.object_id, Some(1));
        assert!((zone.protection_radius_feet - 6.0).abs() < f64::EPSILON);
        assert!((zone.protection_radius_meters - 1.8288).abs() < 1e-9);
    }

    #[test]
    fn summary_averages_filtered_rows() {
        let records = vec![record(2.0), record(10.0), record(20.0)];
        let zones = zone_records(&records, &ZoneFilter { min_diameter: 10.0 });
        let summary = ZoneSummary::new(records.len(), &zones);
        assert_eq!(summary.total_trees, 3);
        assert_eq!(summary.filtered_trees, 2);
        assert!((summary.average_diameter - 15.0).abs() < f64::EPSILON);
        assert!((summary.average_radius_feet - 15.0).abs() < f64::EPSILON);
    }

    #[test]
    fn summary_of_empty_table_is_zero() {
        let summary = ZoneSummary::new(4, &[]);
        assert_eq!(summary.filtered_trees, 0);
        assert!(summary.average_diameter.abs() < f64::EPSILON);
        assert!(summary.average_radius_feet.abs() < f64::EPSILON);
    }
}
