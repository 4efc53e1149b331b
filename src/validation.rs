// Validation utilities module
// Provides custom validation functions for domain-specific rules

use chrono::NaiveDate;
use validator::ValidationError;

/// Validates that a currency code is a 3-letter uppercase ISO-4217 style code
pub fn validate_currency_code(code: &str) -> Result<(), ValidationError> {
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase()) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_currency_code"))
    }
}

/// Validates that a source channel is one of the accepted values
/// Valid values: "direct", "ota", "gds", "travel_agent", "corporate"
pub fn validate_source_channel(channel: &str) -> Result<(), ValidationError> {
    let valid_channels = ["direct", "ota", "gds", "travel_agent", "corporate"];
    if valid_channels.contains(&channel.to_lowercase().as_str()) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_source_channel"))
    }
}

/// Validates that a stay date range is well-formed (check-out after check-in)
pub fn validate_stay_range(check_in: NaiveDate, check_out: NaiveDate) -> Result<(), ValidationError> {
    if check_out > check_in {
        Ok(())
    } else {
        Err(ValidationError::new("check_out_not_after_check_in"))
    }
}

/// Validates that an hour-of-day value fits a 24h clock
pub fn validate_cutoff_hour(hour: u32) -> Result<(), ValidationError> {
    if hour < 24 {
        Ok(())
    } else {
        Err(ValidationError::new("cutoff_hour_out_of_range"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_code_accepts_iso_codes() {
        assert!(validate_currency_code("USD").is_ok());
        assert!(validate_currency_code("EUR").is_ok());
    }

    #[test]
    fn test_currency_code_rejects_malformed() {
        assert!(validate_currency_code("usd").is_err());
        assert!(validate_currency_code("US").is_err());
        assert!(validate_currency_code("DOLLARS").is_err());
    }

    #[test]
    fn test_source_channel_accepts_known_channels() {
        assert!(validate_source_channel("direct").is_ok());
        assert!(validate_source_channel("OTA").is_ok());
    }

    #[test]
    fn test_source_channel_rejects_unknown() {
        assert!(validate_source_channel("walkup").is_err());
    }

    #[test]
    fn test_stay_range_requires_positive_nights() {
        let d1 = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2025, 6, 3).unwrap();
        assert!(validate_stay_range(d1, d2).is_ok());
        assert!(validate_stay_range(d2, d1).is_err());
        assert!(validate_stay_range(d1, d1).is_err());
    }

    #[test]
    fn test_cutoff_hour_range() {
        assert!(validate_cutoff_hour(0).is_ok());
        assert!(validate_cutoff_hour(23).is_ok());
        assert!(validate_cutoff_hour(24).is_err());
    }
}
