use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

// ============================================================================
// Configuration
// ============================================================================
//
// Process settings come from the environment. Conversion and impact factors
// are versioned data: the built-in set can be replaced by a JSON file without
// touching code.
//
// ============================================================================

pub const DEFAULT_METRICS_PORT: u16 = 9090;
pub const DEFAULT_TRACKING_NUMBER_ATTEMPTS: u32 = 5;

/// Unit conversion and environmental impact multipliers.
///
/// The defaults are coarse estimates pending review by a domain expert,
/// which is why they travel with a `version` label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImpactFactors {
    pub version: String,
    /// kg per tonne
    pub tonne_to_kg: f64,
    /// Assumed bulk density, kg per cubic metre
    pub m3_to_kg: f64,
    /// kg of CO2 avoided per recycled kg
    pub co2_kg_per_kg: f64,
    /// Litres of water saved per recycled kg
    pub water_l_per_kg: f64,
    /// kWh saved per recycled kg
    pub energy_kwh_per_kg: f64,
}

impl Default for ImpactFactors {
    fn default() -> Self {
        Self {
            version: "legacy-2024".to_string(),
            tonne_to_kg: 1000.0,
            m3_to_kg: 500.0,
            co2_kg_per_kg: 0.5,
            water_l_per_kg: 10.0,
            energy_kwh_per_kg: 2.0,
        }
    }
}

impl ImpactFactors {
    pub fn from_json(json: &str) -> Result<Self> {
        let factors: Self = serde_json::from_str(json).context("invalid impact factors document")?;
        factors.validate()?;
        Ok(factors)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading impact factors from {}", path.display()))?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.version.trim().is_empty() {
            bail!("impact factors must carry a version label");
        }

        let named = [
            ("tonneToKg", self.tonne_to_kg),
            ("m3ToKg", self.m3_to_kg),
            ("co2KgPerKg", self.co2_kg_per_kg),
            ("waterLPerKg", self.water_l_per_kg),
            ("energyKwhPerKg", self.energy_kwh_per_kg),
        ];
        for (name, value) in named {
            if !value.is_finite() || value < 0.0 {
                bail!("impact factor {} must be a non-negative number, got {}", name, value);
            }
        }

        Ok(())
    }
}

/// Process configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Postgres connection string; the in-memory store is used when absent
    pub database_url: Option<String>,
    pub metrics_enabled: bool,
    pub metrics_port: u16,
    pub tracking_number_max_attempts: u32,
    pub factors: ImpactFactors,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            metrics_enabled: true,
            metrics_port: DEFAULT_METRICS_PORT,
            tracking_number_max_attempts: DEFAULT_TRACKING_NUMBER_ATTEMPTS,
            factors: ImpactFactors::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()) {
            config.database_url = Some(url);
        }

        if let Some(raw) = lookup("METRICS_ENABLED") {
            config.metrics_enabled = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => bail!("METRICS_ENABLED must be a boolean, got {:?}", other),
            };
        }

        if let Some(raw) = lookup("METRICS_PORT") {
            config.metrics_port = raw
                .trim()
                .parse()
                .with_context(|| format!("METRICS_PORT must be a port number, got {:?}", raw))?;
        }

        if let Some(raw) = lookup("TRACKING_NUMBER_MAX_ATTEMPTS") {
            let attempts: u32 = raw
                .trim()
                .parse()
                .with_context(|| format!("TRACKING_NUMBER_MAX_ATTEMPTS must be an integer, got {:?}", raw))?;
            if attempts == 0 {
                bail!("TRACKING_NUMBER_MAX_ATTEMPTS must be at least 1");
            }
            config.tracking_number_max_attempts = attempts;
        }

        if let Some(path) = lookup("WASTE_FACTORS_PATH").filter(|v| !v.trim().is_empty()) {
            config.factors = ImpactFactors::load(path.trim())?;
        }

        Ok(config)
    }
}
