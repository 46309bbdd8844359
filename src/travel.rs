use std::collections::HashMap;

use anyhow::{Result, anyhow};
use once_cell::sync::Lazy;

pub const EARTH_RADIUS_KM: f64 = 6371.0;
/// Distance assigned to teams without a known capital.
pub const UNKNOWN_TEAM_DISTANCE_KM: f64 = 5000.0;
pub const DEFAULT_FALLBACK_CITY: &str = "Rabat";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

const fn ll(lat: f64, lon: f64) -> LatLon {
    LatLon { lat, lon }
}

static CAF_CAPITALS: Lazy<HashMap<&'static str, LatLon>> = Lazy::new(|| {
    HashMap::from([
        ("Algeria", ll(36.7538, 3.0588)),
        ("Angola", ll(-8.8390, 13.2894)),
        ("Benin", ll(6.4969, 2.6289)),
        ("Botswana", ll(-24.6282, 25.9231)),
        ("Burkina Faso", ll(12.3714, -1.5197)),
        ("Burundi", ll(-3.3614, 29.3599)),
        ("Cameroon", ll(3.8480, 11.5021)),
        ("Cape Verde", ll(14.9330, -23.5133)),
        ("Central African Republic", ll(4.3947, 18.5582)),
        ("Chad", ll(12.1348, 15.0557)),
        ("Comoros", ll(-11.7172, 43.2473)),
        ("Congo", ll(-4.2634, 15.2429)),
        ("DR Congo", ll(-4.4419, 15.2663)),
        ("Djibouti", ll(11.5721, 43.1456)),
        ("Egypt", ll(30.0444, 31.2357)),
        ("Equatorial Guinea", ll(3.7504, 8.7371)),
        ("Eritrea", ll(15.3229, 38.9251)),
        ("Eswatini", ll(-26.3054, 31.1367)),
        ("Ethiopia", ll(9.0300, 38.7400)),
        ("Gabon", ll(0.4162, 9.4673)),
        ("Gambia", ll(13.4549, -16.5790)),
        ("Ghana", ll(5.6037, -0.1870)),
        ("Guinea", ll(9.6412, -13.5784)),
        ("Guinea-Bissau", ll(11.8817, -15.6178)),
        ("Ivory Coast", ll(6.8276, -5.2893)),
        ("Kenya", ll(-1.2921, 36.8219)),
        ("Lesotho", ll(-29.3151, 27.4869)),
        ("Liberia", ll(6.3156, -10.8074)),
        ("Libya", ll(32.8872, 13.1913)),
        ("Madagascar", ll(-18.8792, 47.5079)),
        ("Malawi", ll(-13.9626, 33.7741)),
        ("Mali", ll(12.6392, -8.0029)),
        ("Mauritania", ll(18.0735, -15.9582)),
        ("Mauritius", ll(-20.1609, 57.5012)),
        ("Morocco", ll(34.0209, -6.8416)),
        ("Mozambique", ll(-25.9692, 32.5732)),
        ("Namibia", ll(-22.5609, 17.0658)),
        ("Niger", ll(13.5116, 2.1254)),
        ("Nigeria", ll(9.0765, 7.3986)),
        ("Rwanda", ll(-1.9441, 30.0619)),
        ("Sao Tome and Principe", ll(0.3365, 6.7273)),
        ("Senegal", ll(14.7167, -17.4677)),
        ("Seychelles", ll(-4.6191, 55.4513)),
        ("Sierra Leone", ll(8.4657, -13.2317)),
        ("Somalia", ll(2.0469, 45.3182)),
        ("South Africa", ll(-25.7479, 28.2293)),
        ("South Sudan", ll(4.8594, 31.5713)),
        ("Sudan", ll(15.5007, 32.5599)),
        ("Tanzania", ll(-6.1630, 35.7516)),
        ("Togo", ll(6.1725, 1.2314)),
        ("Tunisia", ll(36.8065, 10.1815)),
        ("Uganda", ll(0.3476, 32.5825)),
        ("Zambia", ll(-15.3875, 28.3228)),
        ("Zimbabwe", ll(-17.8252, 31.0335)),
    ])
});

// AFCON 2025 venues, with common alternate spellings.
static HOST_CITIES: Lazy<HashMap<&'static str, LatLon>> = Lazy::new(|| {
    HashMap::from([
        ("Rabat", ll(34.0209, -6.8416)),
        ("Casablanca", ll(33.5731, -7.5898)),
        ("Marrakech", ll(31.6295, -7.9811)),
        ("Marrakesh", ll(31.6295, -7.9811)),
        ("Fes", ll(34.0181, -5.0078)),
        ("Fez", ll(34.0181, -5.0078)),
        ("Tangier", ll(35.7595, -5.8340)),
        ("Tanger", ll(35.7595, -5.8340)),
        ("Agadir", ll(30.4278, -9.5981)),
    ])
});

/// Great-circle distance in kilometres.
pub fn haversine_km(a: LatLon, b: LatLon) -> f64 {
    let (lat1, lon1) = (a.lat.to_radians(), a.lon.to_radians());
    let (lat2, lon2) = (b.lat.to_radians(), b.lon.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * h.sqrt().min(1.0).asin() * EARTH_RADIUS_KM
}

/// Capital-to-venue distances. Venues outside the host-city table resolve to
/// the fallback host city.
#[derive(Debug, Clone, Copy)]
pub struct TravelEstimator {
    fallback: LatLon,
}

impl Default for TravelEstimator {
    fn default() -> Self {
        Self {
            fallback: HOST_CITIES[DEFAULT_FALLBACK_CITY],
        }
    }
}

impl TravelEstimator {
    pub fn new(fallback_city: &str) -> Result<Self> {
        let fallback = host_city(fallback_city)
            .ok_or_else(|| anyhow!("fallback host city {fallback_city:?} is not a known venue"))?;
        Ok(Self { fallback })
    }

    pub fn distance_km(&self, team: &str, city: &str) -> f64 {
        let Some(home) = capital(team) else {
            return UNKNOWN_TEAM_DISTANCE_KM;
        };
        let venue = host_city(city).unwrap_or(self.fallback);
        haversine_km(home, venue)
    }
}

pub fn capital(team: &str) -> Option<LatLon> {
    CAF_CAPITALS.get(team).copied()
}

pub fn host_city(city: &str) -> Option<LatLon> {
    HOST_CITIES.get(city.trim()).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_matches_known_distance() {
        // Rabat to Casablanca is roughly 87 km.
        let d = haversine_km(ll(34.0209, -6.8416), ll(33.5731, -7.5898));
        assert!((d - 87.0).abs() < 3.0, "{d}");
        assert_eq!(haversine_km(ll(1.0, 2.0), ll(1.0, 2.0)), 0.0);
    }

    #[test]
    fn unknown_team_is_far_away() {
        let t = TravelEstimator::default();
        assert_eq!(t.distance_km("Brazil", "Rabat"), UNKNOWN_TEAM_DISTANCE_KM);
    }

    #[test]
    fn unknown_city_uses_fallback() {
        let t = TravelEstimator::default();
        assert!(t.distance_km("Morocco", "Rabat") < 1e-9);
        assert!(t.distance_km("Morocco", "Kumasi") < 1e-9);
        assert!(t.distance_km("Senegal", "Agadir") > 1000.0);
    }

    #[test]
    fn fallback_must_be_a_venue() {
        assert!(TravelEstimator::new("Casablanca").is_ok());
        assert!(TravelEstimator::new("Atlantis").is_err());
    }
}
