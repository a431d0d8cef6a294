//! Validated user records for CSV processing.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MIN_AGE: i64 = 0;
pub const MAX_AGE: i64 = 150;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("city must not be empty")]
    EmptyCity,

    #[error("age {0} is outside 0..=150")]
    AgeOutOfRange(i64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserData {
    pub name: String,
    pub age: i64,
    pub city: String,
    #[serde(default)]
    pub processed: bool,
}

impl UserData {
    /// Validate and normalize. Name and city are trimmed.
    pub fn new(
        name: impl AsRef<str>,
        age: i64,
        city: impl AsRef<str>,
    ) -> Result<Self, ValidationError> {
        let name = name.as_ref().trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        let city = city.as_ref().trim();
        if city.is_empty() {
            return Err(ValidationError::EmptyCity);
        }
        if !(MIN_AGE..=MAX_AGE).contains(&age) {
            return Err(ValidationError::AgeOutOfRange(age));
        }
        Ok(Self {
            name: name.to_string(),
            age,
            city: city.to_string(),
            processed: false,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedUserData {
    pub name: String,
    pub age: i64,
    pub city: String,
    pub processed: bool,
    pub processed_at: DateTime<Local>,
}

impl From<UserData> for ProcessedUserData {
    fn from(data: UserData) -> Self {
        Self {
            name: data.name,
            age: data.age,
            city: data.city,
            processed: true,
            processed_at: Local::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_user_is_trimmed() {
        let user = UserData::new("  Alice ", 30, " Beijing").unwrap();
        assert_eq!(user.name, "Alice");
        assert_eq!(user.city, "Beijing");
        assert!(!user.processed);
    }

    #[test]
    fn test_blank_fields_rejected() {
        assert_eq!(
            UserData::new("   ", 30, "Paris"),
            Err(ValidationError::EmptyName)
        );
        assert_eq!(UserData::new("Bob", 30, ""), Err(ValidationError::EmptyCity));
    }

    #[test]
    fn test_age_bounds() {
        assert!(UserData::new("A", 0, "B").is_ok());
        assert!(UserData::new("A", 150, "B").is_ok());
        assert_eq!(
            UserData::new("A", -1, "B"),
            Err(ValidationError::AgeOutOfRange(-1))
        );
        assert_eq!(
            UserData::new("A", 151, "B"),
            Err(ValidationError::AgeOutOfRange(151))
        );
    }

    #[test]
    fn test_processed_user_data() {
        let before = Local::now();
        let processed = ProcessedUserData::from(UserData::new("Carol", 41, "Lima").unwrap());
        assert!(processed.processed);
        assert!(processed.processed_at >= before);
        assert_eq!(processed.name, "Carol");
    }
}
