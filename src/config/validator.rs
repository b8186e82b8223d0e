use crate::config::Config;
use crate::error::{DecayError, Result, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_storage(config, &mut errors);
        Self::validate_thresholds(config, &mut errors);
        Self::validate_analysis(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DecayError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_storage(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.storage.data_dir.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.data_dir",
                "Data directory cannot be empty",
            ));
        }
    }

    fn validate_thresholds(config: &Config, errors: &mut Vec<ValidationError>) {
        let t = &config.thresholds;
        let checks = [
            ("thresholds.clicks_drop_percent", t.clicks_drop_percent),
            ("thresholds.impressions_drop_percent", t.impressions_drop_percent),
            ("thresholds.position_drop_threshold", t.position_drop_threshold),
            ("thresholds.min_previous_clicks", t.min_previous_clicks),
        ];

        for (path, value) in checks {
            if !value.is_finite() || value < 0.0 {
                errors.push(ValidationError::new(
                    path,
                    format!("Must be a non-negative number, got {}", value),
                ));
            }
        }

        if t.lookback_days == 0 {
            errors.push(ValidationError::new(
                "thresholds.lookback_days",
                "Lookback days must be greater than 0",
            ));
        }
    }

    fn validate_analysis(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.analysis.max_pages == 0 {
            errors.push(ValidationError::new(
                "analysis.max_pages",
                "Max pages must be greater than 0",
            ));
        }

        if config.analysis.top_recommendations == 0 {
            errors.push(ValidationError::new(
                "analysis.top_recommendations",
                "Top recommendations must be greater than 0",
            ));
        }
    }
}
