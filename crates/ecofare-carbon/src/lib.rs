//! Ecofare Carbon: emissions avoided by riding transit
//!
//! A pure function over a per-mode factor table (grams CO₂ per km):
//!
//! ```text
//! saved = max(0, km × factor[alternative] − km × factor[reference])
//! ```

use ecofare_core::{CarbonAnalysis, CarbonConfig, JourneyDraft};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("CARBON/UNKNOWN_MODE: no emission factor for '{0}'")]
pub struct UnknownModeError(pub String);

/// Grams CO₂ per kilometer, keyed by lowercase mode name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissionFactors(BTreeMap<String, f64>);

impl EmissionFactors {
    pub fn new(factors: BTreeMap<String, f64>) -> Self {
        Self(
            factors
                .into_iter()
                .map(|(mode, grams)| (mode.trim().to_lowercase(), grams))
                .collect(),
        )
    }

    pub fn get(&self, mode: &str) -> Result<f64, UnknownModeError> {
        self.0
            .get(&mode.trim().to_lowercase())
            .copied()
            .ok_or_else(|| UnknownModeError(mode.to_string()))
    }

    pub fn modes(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct CarbonCalculator {
    factors: EmissionFactors,
    reference_mode: String,
    alternative_mode: String,
}

impl CarbonCalculator {
    pub fn new(config: CarbonConfig) -> Self {
        Self {
            factors: EmissionFactors::new(config.factors),
            reference_mode: config.reference_mode,
            alternative_mode: config.alternative_mode,
        }
    }

    pub fn factors(&self) -> &EmissionFactors {
        &self.factors
    }

    /// Emissions delta for `distance_meters` travelled by `reference`
    /// instead of `alternative`
    pub fn calculate(
        &self,
        distance_meters: u32,
        reference: &str,
        alternative: &str,
    ) -> Result<CarbonAnalysis, UnknownModeError> {
        let reference_factor = self.factors.get(reference)?;
        let alternative_factor = self.factors.get(alternative)?;

        let distance_km = f64::from(distance_meters) / 1000.0;
        let reference_emission_grams = distance_km * reference_factor;
        let alternative_emission_grams = distance_km * alternative_factor;

        Ok(CarbonAnalysis {
            distance_km,
            reference_mode: reference.trim().to_lowercase(),
            alternative_mode: alternative.trim().to_lowercase(),
            reference_emission_grams,
            alternative_emission_grams,
            carbon_saved_grams: (alternative_emission_grams - reference_emission_grams).max(0.0),
        })
    }

    /// [`Self::calculate`] with the configured modes
    pub fn analyze(&self, draft: &JourneyDraft) -> Result<CarbonAnalysis, UnknownModeError> {
        self.calculate(
            draft.distance_meters,
            &self.reference_mode,
            &self.alternative_mode,
        )
    }
}

impl Default for CarbonCalculator {
    fn default() -> Self {
        Self::new(CarbonConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_car_versus_transit() {
        let analysis = CarbonCalculator::default()
            .calculate(10_000, "transit", "car")
            .unwrap();
        assert!(approx(analysis.reference_emission_grams, 410.0));
        assert!(approx(analysis.alternative_emission_grams, 1_920.0));
        assert!(approx(analysis.carbon_saved_grams, 1_510.0));
    }

    #[test]
    fn test_cleaner_alternative_saves_nothing() {
        let calc = CarbonCalculator::default();
        for alternative in ["bicycle", "walking", "train", "transit"] {
            let analysis = calc.calculate(12_345, "transit", alternative).unwrap();
            assert_eq!(analysis.carbon_saved_grams, 0.0, "{}", alternative);
        }
    }

    #[test]
    fn test_savings_never_negative() {
        let calc = CarbonCalculator::default();
        let modes: Vec<String> = calc.factors().modes().map(String::from).collect();
        for distance in [1, 99, 1_000, 50_000, 350_000] {
            for reference in &modes {
                for alternative in &modes {
                    let analysis = calc.calculate(distance, reference, alternative).unwrap();
                    assert!(analysis.carbon_saved_grams >= 0.0);
                }
            }
        }
    }

    #[test]
    fn test_mode_names_are_case_insensitive() {
        let analysis = CarbonCalculator::default()
            .calculate(1_000, "Transit", " CAR ")
            .unwrap();
        assert_eq!(analysis.alternative_mode, "car");
    }

    #[test]
    fn test_unknown_mode() {
        let err = CarbonCalculator::default()
            .calculate(1_000, "transit", "hovercraft")
            .unwrap_err();
        assert_eq!(err, UnknownModeError("hovercraft".to_string()));
    }

    #[test]
    fn test_analyze_uses_configured_modes() {
        use chrono::Utc;
        use ecofare_core::{Fingerprint, SourceFormat, StationId};

        let mut config = CarbonConfig::default();
        config.alternative_mode = "taxi".to_string();
        let draft = JourneyDraft {
            from_station: StationId::new("CAI"),
            to_station: StationId::new("ORI"),
            distance_meters: 1_000,
            observed_at: Utc::now(),
            raw_encoding_fingerprint: Fingerprint::of(b"TRANSIT:CAI:ORI:1778576400"),
            source_format: SourceFormat::ColonDelimited,
            duration_seconds: None,
        };

        let analysis = CarbonCalculator::new(config).analyze(&draft).unwrap();
        assert_eq!(analysis.alternative_mode, "taxi");
        assert!(approx(analysis.carbon_saved_grams, 169.0));
    }
}
