//! Fare computation
//!
//! A fare is a base charge plus a per-kilometre and a per-minute charge,
//! never below the minimum fare. Distance is the great-circle distance
//! between pickup and dropoff; duration assumes a constant average speed.

use event_consumer::{LatLng, PricingQuoted};
use serde::Serialize;

pub const CURRENCY: &str = "DKK";

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Pricing parameters, all amounts in DKK
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FareRule {
    pub base_fare: f64,
    pub per_km: f64,
    pub per_minute: f64,
    pub minimum_fare: f64,
    pub avg_speed_kmh: f64,
}

impl Default for FareRule {
    fn default() -> Self {
        Self {
            base_fare: 25.0,
            per_km: 8.5,
            per_minute: 2.0,
            minimum_fare: 45.0,
            avg_speed_kmh: 30.0,
        }
    }
}

/// Price breakdown for one route
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fare {
    pub distance_km: f64,
    pub base_fare: f64,
    pub distance_fare: f64,
    pub time_fare: f64,
    pub estimated_price_dkk: f64,
    pub currency: &'static str,
}

impl Fare {
    /// The `pricing.quoted` payload for a trip
    pub fn quoted(&self, trip_id: &str) -> PricingQuoted {
        PricingQuoted {
            trip_id: trip_id.to_string(),
            estimated_price_dkk: self.estimated_price_dkk,
            base_fare: Some(self.base_fare),
            distance_fare: Some(self.distance_fare),
            time_fare: Some(self.time_fare),
            distance_km: Some(self.distance_km),
            currency: Some(CURRENCY.to_string()),
        }
    }
}

impl FareRule {
    pub fn validate(&self) -> Result<(), String> {
        let amounts = [
            ("base_fare", self.base_fare),
            ("per_km", self.per_km),
            ("per_minute", self.per_minute),
            ("minimum_fare", self.minimum_fare),
        ];
        for (name, value) in amounts {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("{} must be a non-negative number, got {}", name, value));
            }
        }
        if !self.avg_speed_kmh.is_finite() || self.avg_speed_kmh <= 0.0 {
            return Err(format!(
                "avg_speed_kmh must be positive, got {}",
                self.avg_speed_kmh
            ));
        }
        Ok(())
    }

    pub fn fare(&self, pickup: LatLng, dropoff: LatLng) -> Fare {
        let distance_km = haversine_km(pickup, dropoff);
        let minutes = distance_km / self.avg_speed_kmh * 60.0;

        let distance_fare = self.per_km * distance_km;
        let time_fare = self.per_minute * minutes;
        let total = (self.base_fare + distance_fare + time_fare).max(self.minimum_fare);

        Fare {
            distance_km: round2(distance_km),
            base_fare: round2(self.base_fare),
            distance_fare: round2(distance_fare),
            time_fare: round2(time_fare),
            estimated_price_dkk: round2(total),
            currency: CURRENCY,
        }
    }
}

/// Great-circle distance in kilometres
pub fn haversine_km(a: LatLng, b: LatLng) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
