//! APRS-IS server-side range filter.
//!
//! Sent once in the login line to restrict the inbound feed to stations
//! around a point. Messages addressed to the logged-in station are passed
//! by the server regardless of the filter.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LinkError;

const KM_PER_MILE: f64 = 1.609_344;

/// `r/<lat>/<lon>/<range>` filter around an origin.
///
/// The radius is configured in statute miles and rendered in whole
/// kilometres, the unit APRS-IS expects.
///
/// # Examples
///
/// ```
/// use aprsbot_link::RangeFilter;
///
/// let filter = RangeFilter::new(30.27, -97.74, 50.0).unwrap();
/// assert_eq!(filter.to_string(), "r/30.27/-97.74/80");
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct RangeFilter {
    /// Origin latitude in decimal degrees.
    pub lat: f64,
    /// Origin longitude in decimal degrees.
    pub lon: f64,
    /// Radius in statute miles.
    pub radius_miles: f64,
}

impl RangeFilter {
    /// Build a filter, validating coordinates and radius.
    pub fn new(lat: f64, lon: f64, radius_miles: f64) -> Result<Self, LinkError> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(LinkError::Config(format!("filter latitude {lat} out of range")));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(LinkError::Config(format!("filter longitude {lon} out of range")));
        }
        if !radius_miles.is_finite() || radius_miles <= 0.0 {
            return Err(LinkError::Config(format!(
                "filter radius {radius_miles} must be a positive number of miles"
            )));
        }
        Ok(Self {
            lat,
            lon,
            radius_miles,
        })
    }

    /// Radius converted to whole kilometres (at least 1).
    pub fn radius_km(&self) -> u32 {
        // Bounded by the validation above; APRS-IS caps ranges well below u32::MAX.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let km = (self.radius_miles * KM_PER_MILE).round().max(1.0) as u32;
        km
    }
}

impl fmt::Display for RangeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r/{}/{}/{}", self.lat, self.lon, self.radius_km())
    }
}
