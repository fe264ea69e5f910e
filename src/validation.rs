use chrono::{Datelike, NaiveDate, NaiveTime};

use crate::error::ApiError;

pub fn validate_weeks(value: u8) -> Result<u8, ApiError> {
    if (1..=6).contains(&value) {
        Ok(value)
    } else {
        Err(ApiError::BadRequest("weeks must be between 1 and 6".into()))
    }
}

pub fn validate_month(value: u32) -> Result<u32, ApiError> {
    if (1..=12).contains(&value) {
        Ok(value)
    } else {
        Err(ApiError::BadRequest("month must be between 1 and 12".into()))
    }
}

/// Week starts are Monday-anchored; any other weekday is rejected instead of
/// silently snapped.
pub fn validate_monday(date: NaiveDate) -> Result<NaiveDate, ApiError> {
    if date.weekday().num_days_from_monday() == 0 {
        Ok(date)
    } else {
        Err(ApiError::BadRequest("start date must be a Monday".into()))
    }
}

pub fn validate_time_range(start: NaiveTime, end: NaiveTime) -> Result<(), ApiError> {
    if start < end {
        Ok(())
    } else {
        Err(ApiError::BadRequest("start time must be before end time".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_weeks() {
        assert!(validate_weeks(1).is_ok());
        assert!(validate_weeks(6).is_ok());
        assert!(validate_weeks(0).is_err());
        assert!(validate_weeks(7).is_err());
    }

    #[test]
    fn test_validate_month() {
        assert!(validate_month(1).is_ok());
        assert!(validate_month(12).is_ok());
        assert!(validate_month(0).is_err());
        assert!(validate_month(13).is_err());
    }

    #[test]
    fn test_validate_monday() {
        let monday = NaiveDate::from_ymd_opt(2024, 3, 11).unwrap();
        let tuesday = NaiveDate::from_ymd_opt(2024, 3, 12).unwrap();
        assert!(validate_monday(monday).is_ok());
        assert!(validate_monday(tuesday).is_err());
    }

    #[test]
    fn test_validate_time_range() {
        let a = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let b = NaiveTime::from_hms_opt(10, 0, 0).unwrap();
        assert!(validate_time_range(a, b).is_ok());
        assert!(validate_time_range(b, a).is_err());
        assert!(validate_time_range(a, a).is_err());
    }
}
