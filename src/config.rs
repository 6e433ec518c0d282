use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::bucketing::DayCalendar;
use crate::error::HealthError;
use crate::logging::LogConfig;
use crate::models::SampleCategory;

/// Which categories an aggregation request fetches
///
/// Every flag is off by default. `hrv_derived` additionally fetches the heartbeat
/// series behind HRV readings and attaches derived HRV indices to HRV samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfiguration {
    pub hrv: bool,
    pub heart_rate: bool,
    pub resting_heart_rate: bool,
    pub steps: bool,
    pub blood_pressure_systolic: bool,
    pub blood_pressure_diastolic: bool,
    pub body_mass: bool,
    pub height: bool,
    pub insulin: bool,
    pub blood_glucose: bool,
    pub sound_exposure: bool,
    pub respiratory_rate: bool,
    pub distance: bool,
    pub flights_climbed: bool,
    pub active_energy: bool,
    pub sleep: bool,
    pub mindful: bool,

    /// Derived HRV indices from beat-to-beat data
    pub hrv_derived: bool,
}

impl RequestConfiguration {
    /// Nothing enabled
    pub fn none() -> Self {
        Self::default()
    }

    /// Every category plus derived HRV
    pub fn all() -> Self {
        let mut config = Self::default();
        for category in SampleCategory::ALL {
            config.enable(category);
        }
        config.hrv_derived = true;
        config
    }

    /// Builder form of [`RequestConfiguration::enable`]
    pub fn with(mut self, category: SampleCategory) -> Self {
        self.enable(category);
        self
    }

    pub fn with_hrv_derived(mut self) -> Self {
        self.hrv_derived = true;
        self
    }

    pub fn enable(&mut self, category: SampleCategory) {
        *self.flag_mut(category) = true;
    }

    pub fn is_enabled(&self, category: SampleCategory) -> bool {
        match category {
            SampleCategory::HrvSdnn => self.hrv,
            SampleCategory::HeartRate => self.heart_rate,
            SampleCategory::RestingHeartRate => self.resting_heart_rate,
            SampleCategory::StepCount => self.steps,
            SampleCategory::BloodPressureSystolic => self.blood_pressure_systolic,
            SampleCategory::BloodPressureDiastolic => self.blood_pressure_diastolic,
            SampleCategory::BodyMass => self.body_mass,
            SampleCategory::Height => self.height,
            SampleCategory::Insulin => self.insulin,
            SampleCategory::BloodGlucose => self.blood_glucose,
            SampleCategory::SoundExposure => self.sound_exposure,
            SampleCategory::RespiratoryRate => self.respiratory_rate,
            SampleCategory::Distance => self.distance,
            SampleCategory::FlightsClimbed => self.flights_climbed,
            SampleCategory::ActiveEnergy => self.active_energy,
            SampleCategory::SleepAnalysis => self.sleep,
            SampleCategory::MindfulSession => self.mindful,
        }
    }

    fn flag_mut(&mut self, category: SampleCategory) -> &mut bool {
        match category {
            SampleCategory::HrvSdnn => &mut self.hrv,
            SampleCategory::HeartRate => &mut self.heart_rate,
            SampleCategory::RestingHeartRate => &mut self.resting_heart_rate,
            SampleCategory::StepCount => &mut self.steps,
            SampleCategory::BloodPressureSystolic => &mut self.blood_pressure_systolic,
            SampleCategory::BloodPressureDiastolic => &mut self.blood_pressure_diastolic,
            SampleCategory::BodyMass => &mut self.body_mass,
            SampleCategory::Height => &mut self.height,
            SampleCategory::Insulin => &mut self.insulin,
            SampleCategory::BloodGlucose => &mut self.blood_glucose,
            SampleCategory::SoundExposure => &mut self.sound_exposure,
            SampleCategory::RespiratoryRate => &mut self.respiratory_rate,
            SampleCategory::Distance => &mut self.distance,
            SampleCategory::FlightsClimbed => &mut self.flights_climbed,
            SampleCategory::ActiveEnergy => &mut self.active_energy,
            SampleCategory::SleepAnalysis => &mut self.sleep,
            SampleCategory::MindfulSession => &mut self.mindful,
        }
    }

    /// Enabled categories in declaration order
    pub fn enabled_categories(&self) -> Vec<SampleCategory> {
        SampleCategory::ALL
            .into_iter()
            .filter(|&c| self.is_enabled(c))
            .collect()
    }

    /// Nothing would be fetched
    pub fn is_empty(&self) -> bool {
        !self.hrv_derived && self.enabled_categories().is_empty()
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application metadata
    pub metadata: ConfigMetadata,

    /// Categories fetched when the command line selects none
    #[serde(default)]
    pub request: RequestConfiguration,

    /// Day bucketing and history
    #[serde(default)]
    pub aggregation: AggregationSettings,

    /// Logging setup
    #[serde(default)]
    pub logging: LogConfig,

    /// Where samples come from
    #[serde(default)]
    pub source: SourceSettings,
}

/// Configuration metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigMetadata {
    /// Configuration format version
    pub version: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

/// Aggregation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationSettings {
    /// Days of trailing history attached to each record
    pub history_days: u32,

    /// Order records and samples oldest first
    pub ascending: bool,

    /// Fixed UTC offset for day boundaries (None uses the local offset)
    pub utc_offset_minutes: Option<i32>,
}

impl AggregationSettings {
    /// Day calendar for the configured offset
    pub fn calendar(&self) -> Result<DayCalendar, HealthError> {
        match self.utc_offset_minutes {
            None => Ok(DayCalendar::local()),
            Some(minutes) => DayCalendar::from_offset_minutes(minutes).ok_or_else(|| {
                HealthError::Configuration(format!("UTC offset out of range: {} minutes", minutes))
            }),
        }
    }
}

/// Sample source settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    /// JSON dataset used when none is given on the command line
    pub dataset: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let now = Utc::now();

        AppConfig {
            metadata: ConfigMetadata {
                version: "1.0".to_string(),
                created_at: now,
                updated_at: now,
            },
            request: RequestConfiguration::default(),
            aggregation: AggregationSettings::default(),
            logging: LogConfig::default(),
            source: SourceSettings::default(),
        }
    }
}

impl Default for AggregationSettings {
    fn default() -> Self {
        AggregationSettings {
            history_days: 30,
            ascending: true,
            utc_offset_minutes: None,
        }
    }
}

/// Configuration management implementation
impl AppConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;

        config.aggregation.calendar()?;

        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.metadata.updated_at = Utc::now();

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let toml_content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Get default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".quickhealth")
            .join("config.toml")
    }

    /// Load configuration with fallback to defaults
    ///
    /// A missing file silently yields the defaults; an unreadable one is reported.
    pub fn load_or_default() -> Self {
        let config_path = Self::default_config_path();
        if !config_path.exists() {
            return Self::default();
        }

        match Self::load_from_file(&config_path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Ignoring config file {}: {:#}", config_path.display(), e);
                Self::default()
            }
        }
    }

    /// Save configuration to default location
    pub fn save_default(&mut self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to_file(config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_request_configuration_defaults_off() {
        let config = RequestConfiguration::default();
        assert!(config.enabled_categories().is_empty());
        assert!(!config.hrv_derived);
        assert!(config.is_empty());
    }

    #[test]
    fn test_enabled_categories_in_declaration_order() {
        let config = RequestConfiguration::none()
            .with(SampleCategory::StepCount)
            .with(SampleCategory::HrvSdnn);
        assert_eq!(
            config.enabled_categories(),
            vec![SampleCategory::HrvSdnn, SampleCategory::StepCount]
        );

        let all = RequestConfiguration::all();
        assert_eq!(all.enabled_categories().len(), SampleCategory::ALL.len());
        assert!(all.hrv_derived);
    }

    #[test]
    fn test_flag_mapping_is_consistent() {
        for category in SampleCategory::ALL {
            let config = RequestConfiguration::none().with(category);
            assert_eq!(config.enabled_categories(), vec![category]);
        }
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.metadata.version, deserialized.metadata.version);
        assert_eq!(config.aggregation, deserialized.aggregation);
        assert_eq!(deserialized.aggregation.history_days, 30);
    }

    #[test]
    fn test_partial_request_section() {
        let toml_str = r#"
            [metadata]
            version = "1.0"
            created_at = "2025-03-01T00:00:00Z"
            updated_at = "2025-03-01T00:00:00Z"

            [request]
            heart_rate = true
            steps = true
        "#;

        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.request.enabled_categories(),
            vec![SampleCategory::HeartRate, SampleCategory::StepCount]
        );
        assert!(config.aggregation.ascending);
    }

    #[test]
    fn test_calendar_offset_validation() {
        let settings = AggregationSettings {
            utc_offset_minutes: Some(-300),
            ..AggregationSettings::default()
        };
        assert_eq!(settings.calendar().unwrap().offset().local_minus_utc(), -300 * 60);

        let settings = AggregationSettings {
            utc_offset_minutes: Some(100_000),
            ..AggregationSettings::default()
        };
        assert!(matches!(
            settings.calendar(),
            Err(HealthError::Configuration(_))
        ));
    }

    #[test]
    fn test_config_file_io() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut original = AppConfig::default();
        original.request = RequestConfiguration::none()
            .with(SampleCategory::BloodGlucose)
            .with_hrv_derived();
        original.source.dataset = Some(PathBuf::from("/data/health.json"));

        original.save_to_file(&config_path).unwrap();
        let loaded = AppConfig::load_from_file(&config_path).unwrap();

        assert_eq!(loaded.request, original.request);
        assert_eq!(loaded.source, original.source);
    }
}
