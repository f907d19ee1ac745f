use itertools::izip;
use sed_fit::{FitMode, ISOCHRONE_BANDS, ModelGrid, Parameter, Photometry, SedTheta, Star};

/// teff, logg, z, dist, rad, Av, inflation used by [synthetic_star]
pub const TRUE_PHYSICAL_THETA: [f64; 7] = [5800.0, 4.4, 0.0, 100.0, 1.0, 0.0, 0.0];

/// Analytic stand-in for an atmosphere grid
///
/// The `i`-th filter has an effective wavelength of `0.5 + 0.5 i` micron. The flux is a
/// Rayleigh-Jeans-like power law in temperature with weak `logg` and `z` terms, scaled by
/// `(rad / dist)^2` or `norm`, and reddened with an extinction curve `A_lambda = Av / lambda`.
#[derive(Clone, Copy, Debug, Default)]
pub struct PowerLawGrid;

impl PowerLawGrid {
    pub fn wavelength(i: usize) -> f64 {
        0.5 + 0.5 * i as f64
    }
}

impl ModelGrid for PowerLawGrid {
    fn synthetic_fluxes(&self, theta: SedTheta<'_>, filters: &[String], fluxes: &mut [f64]) {
        let scale = match theta.mode() {
            FitMode::Physical => {
                let rad = theta.get(Parameter::Rad).unwrap_or(f64::NAN);
                let dist = theta.get(Parameter::Dist).unwrap_or(f64::NAN);
                (rad / dist).powi(2)
            }
            FitMode::Normalized => theta.get(Parameter::Norm).unwrap_or(f64::NAN),
        };
        let surface = (theta.teff() / 5800.0).powi(4)
            * (1.0 + 0.01 * (theta.logg() - 4.4))
            * (1.0 + 0.1 * theta.z());
        for (i, (flux, _filter)) in fluxes.iter_mut().zip(filters).enumerate() {
            let lambda = Self::wavelength(i);
            *flux = 1e4 * scale * surface / lambda.powi(2) * 10f64.powf(-0.4 * theta.av() / lambda);
        }
    }
}

/// Noise-free star observed in every isochrone band at [TRUE_PHYSICAL_THETA]
///
/// Flux uncertainties are `relative_error` times the flux. The catalog extinction is zero, so
/// `Av` is fixed by default.
pub fn synthetic_star(name: &str, relative_error: f64) -> Star {
    let filters: Vec<String> = ISOCHRONE_BANDS
        .iter()
        .map(|(filter, _)| (*filter).to_owned())
        .collect();
    let mut fluxes = vec![0.0; filters.len()];
    PowerLawGrid.synthetic_fluxes(
        SedTheta::new(FitMode::Physical, &TRUE_PHYSICAL_THETA),
        &filters,
        &mut fluxes,
    );

    let mut star = Star::new(name)
        .with_temperature(5800.0, 100.0)
        .with_radius(1.0, 0.1)
        .with_parallax(10.0, 0.5)
        .with_distance(100.0, 5.0)
        .with_luminosity(1.0, 0.1);
    for (filter, &flux, magnitude) in izip!(filters, &fluxes, 8u8..) {
        star = star.with_photometry(Photometry {
            filter,
            magnitude: f64::from(magnitude),
            magnitude_error: 0.02,
            flux,
            flux_error: relative_error * flux,
            used: true,
        });
    }
    star
}
