//! Construction protection zone policy.
//!
//! Every tree gets a minimum 5 foot zone, plus one foot for every inch of
//! trunk diameter over 5 inches.

use tree_zones_models::ProtectionZone;

/// Zone radius for trees at or under [`DIAMETER_THRESHOLD_INCHES`].
pub const MIN_RADIUS_FEET: f64 = 5.0;

/// Diameter above which the zone grows.
pub const DIAMETER_THRESHOLD_INCHES: f64 = 5.0;

/// Exact length of the international foot.
pub const METERS_PER_FOOT: f64 = 0.3048;

/// Protection zone radius in feet for a trunk diameter in inches.
#[must_use]
pub fn protection_radius_feet(diameter_inches: f64) -> f64 {
    if diameter_inches <= DIAMETER_THRESHOLD_INCHES {
        MIN_RADIUS_FEET
    } else {
        MIN_RADIUS_FEET + (diameter_inches - DIAMETER_THRESHOLD_INCHES)
    }
}

/// Converts feet to meters.
#[must_use]
pub fn feet_to_meters(feet: f64) -> f64 {
    feet * METERS_PER_FOOT
}

/// Converts meters to feet.
#[must_use]
pub fn meters_to_feet(meters: f64) -> f64 {
    meters / METERS_PER_FOOT
}

/// Both radii of the zone for a trunk diameter in inches.
#[must_use]
pub fn protection_zone(diameter_inches: f64) -> ProtectionZone {
    let radius_feet = protection_radius_feet(diameter_inches);
    ProtectionZone {
        radius_feet,
        radius_meters: feet_to_meters(radius_feet),
    }
}
