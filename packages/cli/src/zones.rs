//! `zones`: normalize a collection and write its protection zone table.

use std::path::PathBuf;

use clap::{Args, ValueEnum};
use tree_zones::io::{write_zones_csv, write_zones_geojson};
use tree_zones::normalize::normalize_collection;
use tree_zones::table::{ZoneFilter, ZoneSummary, zone_records};
use tree_zones_models::{FeatureCollection, FieldMapping};

#[derive(Clone, Copy, ValueEnum)]
pub enum ZoneFormat {
    Csv,
    Geojson,
}

impl ZoneFormat {
    const fn default_path(self) -> &'static str {
        match self {
            Self::Csv => "tree_protection_zones.csv",
            Self::Geojson => "tree_protection_zones.geojson",
        }
    }
}

#[derive(Args)]
pub struct ZoneArgs {
    /// Keep only trees with at least this trunk diameter (inches)
    #[arg(long, default_value_t = 0.0)]
    min_diameter: f64,
    /// Zone table format
    #[arg(long, value_enum, default_value_t = ZoneFormat::Csv)]
    format: ZoneFormat,
    /// Where to write the zone table. Defaults to
    /// `tree_protection_zones.<format>`.
    #[arg(long)]
    zones_output: Option<PathBuf>,
}

pub fn run(
    args: &ZoneArgs,
    collection: &FeatureCollection,
    fields: &FieldMapping,
) -> Result<(), Box<dyn std::error::Error>> {
    let normalized = normalize_collection(collection, fields);

    let filter = ZoneFilter {
        min_diameter: args.min_diameter,
    };
    let zones = zone_records(&normalized.records, &filter);
    let summary = ZoneSummary::new(normalized.records.len(), &zones);

    println!("Total trees:            {}", summary.total_trees);
    println!("Skipped features:       {}", normalized.skipped.len());
    println!(
        "Trees >= {:<5} inches:  {}",
        args.min_diameter, summary.filtered_trees
    );
    println!("Average diameter:       {:.1} inches", summary.average_diameter);
    println!(
        "Average radius:         {:.1} feet",
        summary.average_radius_feet
    );

    if zones.is_empty() {
        log::warn!("No trees match the filter; nothing to write");
        return Ok(());
    }

    let path = args
        .zones_output
        .clone()
        .unwrap_or_else(|| PathBuf::from(args.format.default_path()));
    match args.format {
        ZoneFormat::Csv => write_zones_csv(&path, &zones)?,
        ZoneFormat::Geojson => write_zones_geojson(&path, &zones)?,
    }

    Ok(())
}
