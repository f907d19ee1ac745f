use serde::{Deserialize, Serialize};

/// Catalog filters that the isochrone log g estimator understands, with its band names
pub const ISOCHRONE_BANDS: [(&str, &str); 8] = [
    ("2MASS_H", "H"),
    ("2MASS_J", "J"),
    ("2MASS_Ks", "Ks"),
    ("GaiaDR2v2_G", "G"),
    ("GaiaDR2v2_RP", "RP"),
    ("GaiaDR2v2_BP", "BP"),
    ("WISE_RSR_W1", "W1"),
    ("WISE_RSR_W2", "W2"),
];

/// Measured value with its 1-sigma uncertainty
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Measurement {
    pub value: f64,
    pub error: f64,
}

impl Measurement {
    pub fn new(value: f64, error: f64) -> Self {
        Self { value, error }
    }
}

/// Photometry in a single filter
///
/// `flux` and `flux_error` are what the likelihood compares with the model grid, the magnitudes
/// only feed the isochrone log g estimate. Filters with `used == false` stay in the record but
/// are excluded from the likelihood.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Photometry {
    pub filter: String,
    pub magnitude: f64,
    pub magnitude_error: f64,
    pub flux: f64,
    pub flux_error: f64,
    pub used: bool,
}

/// Star descriptor assembled from catalog queries
///
/// `None` marks quantities the catalogs did not provide.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Star {
    pub name: String,
    pub temperature: Option<Measurement>,
    pub luminosity: Option<Measurement>,
    pub radius: Option<Measurement>,
    pub parallax: Option<Measurement>,
    /// Distance in pc
    pub distance: Option<Measurement>,
    /// Catalog (dust map) extinction in the V band, exactly zero means no extinction is fitted
    pub extinction: f64,
    pub photometry: Vec<Photometry>,
}

impl Star {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            temperature: None,
            luminosity: None,
            radius: None,
            parallax: None,
            distance: None,
            extinction: 0.0,
            photometry: vec![],
        }
    }

    pub fn with_temperature(mut self, value: f64, error: f64) -> Self {
        self.temperature = Some(Measurement::new(value, error));
        self
    }

    pub fn with_luminosity(mut self, value: f64, error: f64) -> Self {
        self.luminosity = Some(Measurement::new(value, error));
        self
    }

    pub fn with_radius(mut self, value: f64, error: f64) -> Self {
        self.radius = Some(Measurement::new(value, error));
        self
    }

    pub fn with_parallax(mut self, value: f64, error: f64) -> Self {
        self.parallax = Some(Measurement::new(value, error));
        self
    }

    pub fn with_distance(mut self, value: f64, error: f64) -> Self {
        self.distance = Some(Measurement::new(value, error));
        self
    }

    pub fn with_extinction(mut self, av: f64) -> Self {
        self.extinction = av;
        self
    }

    pub fn with_photometry(mut self, photometry: Photometry) -> Self {
        self.photometry.push(photometry);
        self
    }

    /// Photometry entering the likelihood
    pub fn used_photometry(&self) -> impl Iterator<Item = &Photometry> {
        self.photometry.iter().filter(|p| p.used)
    }

    /// Magnitudes in the isochrone bands, keyed by the estimator's band name
    ///
    /// Zero or non-finite magnitudes mean "not observed" and are skipped.
    pub fn isochrone_magnitudes(&self) -> Vec<(&'static str, Measurement)> {
        ISOCHRONE_BANDS
            .iter()
            .filter_map(|&(filter, band)| {
                self.photometry
                    .iter()
                    .find(|p| p.filter == filter)
                    .filter(|p| p.magnitude != 0.0 && p.magnitude.is_finite())
                    .map(|p| (band, Measurement::new(p.magnitude, p.magnitude_error)))
            })
            .collect()
    }
}
