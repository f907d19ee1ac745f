use sed_fit::PriorTables;
use sed_fit::prior::EmpiricalPrior;

/// Small empirical population priors: teff spans 3000-9000 K, logg spans 3-5 dex
pub fn toy_prior_tables() -> PriorTables {
    PriorTables {
        teff: EmpiricalPrior::new(vec![3000.0, 4500.0, 5500.0, 6500.0, 9000.0])
            .expect("valid teff table"),
        logg: EmpiricalPrior::new(vec![3.0, 4.0, 4.4, 4.6, 5.0]).expect("valid logg table"),
    }
}
