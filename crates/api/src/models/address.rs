//! Shipping address types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shopfront_core::{AddressId, UserId};

const MAX_FIELD_LENGTH: usize = 500;

/// A saved shipping address owned by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub address: String,
    pub city: String,
    pub pincode: String,
    pub phone: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Address payload for create and update.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressInput {
    pub address: String,
    pub city: String,
    pub pincode: String,
    pub phone: String,
    #[serde(default)]
    pub notes: Option<String>,
}

impl AddressInput {
    /// Trim every field and require the mandatory ones.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first missing or oversized field.
    pub fn normalize(self) -> Result<Self, String> {
        Ok(Self {
            address: required("address", &self.address)?,
            city: required("city", &self.city)?,
            pincode: required("pincode", &self.pincode)?,
            phone: required("phone", &self.phone)?,
            notes: self
                .notes
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
        })
    }
}

fn required(name: &str, value: &str) -> Result<String, String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(format!("{name} is required"));
    }
    if value.chars().count() > MAX_FIELD_LENGTH {
        return Err(format!("{name} must be at most {MAX_FIELD_LENGTH} characters"));
    }
    Ok(value.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input() -> AddressInput {
        AddressInput {
            address: " 12 Main St ".to_string(),
            city: "Springfield".to_string(),
            pincode: "12345".to_string(),
            phone: "555-0100".to_string(),
            notes: Some("   ".to_string()),
        }
    }

    #[test]
    fn test_normalize_trims_and_drops_blank_notes() {
        let normalized = input().normalize().unwrap();
        assert_eq!(normalized.address, "12 Main St");
        assert_eq!(normalized.notes, None);
    }

    #[test]
    fn test_normalize_requires_fields() {
        let mut missing_city = input();
        missing_city.city = String::new();
        assert_eq!(missing_city.normalize().unwrap_err(), "city is required");
    }
}
