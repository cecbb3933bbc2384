//! Input validation for API requests.
//!
//! Validators return `Err(message)` and are collected per field with
//! `ValidationErrorBuilder` from the `error` module.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Loose email shape check: something@something.tld
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[^\s@]+@[^\s@]+\.[^\s@]+$"
    ).unwrap();

    /// Property types are short lowercase words (e.g. "apartment", "tiny-house")
    static ref PROPERTY_TYPE_REGEX: Regex = Regex::new(
        r"^[a-z][a-z0-9_-]*$"
    ).unwrap();
}

fn validate_text(value: &str, label: &str, max: usize) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{} is required", label));
    }

    if value.chars().count() > max {
        return Err(format!("{} is too long (max {} characters)", label, max));
    }

    Ok(())
}

/// Validate a listing title
pub fn validate_title(title: &str) -> Result<(), String> {
    validate_text(title, "Title", 200)
}

/// Validate a listing location
pub fn validate_location(location: &str) -> Result<(), String> {
    validate_text(location, "Location", 200)
}

/// Validate a listing description (may be empty)
pub fn validate_description(description: &str) -> Result<(), String> {
    if description.chars().count() > 5000 {
        return Err("Description is too long (max 5000 characters)".to_string());
    }
    Ok(())
}

/// Validate a property type
pub fn validate_property_type(property_type: &str) -> Result<(), String> {
    validate_text(property_type, "Property type", 50)?;

    if !PROPERTY_TYPE_REGEX.is_match(property_type) {
        return Err(
            "Property type must be lowercase letters, digits, dashes or underscores".to_string(),
        );
    }

    Ok(())
}

/// Validate a nightly price
pub fn validate_price(price: f64) -> Result<(), String> {
    if !price.is_finite() || price <= 0.0 {
        return Err("Price per night must be greater than 0".to_string());
    }
    if price > 1_000_000.0 {
        return Err("Price per night is too high (max 1000000)".to_string());
    }
    Ok(())
}

/// Validate guest capacity
pub fn validate_guest_count(guests: i64) -> Result<(), String> {
    if guests < 1 {
        return Err("Number of guests must be at least 1".to_string());
    }
    if guests > 100 {
        return Err("Number of guests is too high (max 100)".to_string());
    }
    Ok(())
}

/// Parse a `YYYY-MM-DD` date
pub fn parse_date(value: &str, label: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| format!("{} must be a date in YYYY-MM-DD format", label))
}

/// Validate that a stay ends after it starts
pub fn validate_stay(check_in: NaiveDate, check_out: NaiveDate) -> Result<(), String> {
    if check_out <= check_in {
        return Err("Check-out date must be after check-in date".to_string());
    }
    Ok(())
}

/// Validate an email address
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }
    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }
    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email address".to_string());
    }
    Ok(())
}

/// Validate a display name
pub fn validate_name(name: &str) -> Result<(), String> {
    validate_text(name, "Name", 100)
}

/// Validate password strength
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < 8 {
        return Err("Password must be at least 8 characters".to_string());
    }
    if !password.chars().any(|c| c.is_alphabetic()) {
        return Err("Password must contain at least one letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one digit".to_string());
    }
    Ok(())
}

/// Validate a UUID string
pub fn validate_uuid(id: &str, field_name: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err(format!("{} is required", field_name));
    }

    if uuid::Uuid::parse_str(id).is_err() {
        return Err(format!("Invalid {} format", field_name));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_title() {
        assert!(validate_title("Cozy loft").is_ok());
        assert!(validate_title("").is_err());
        assert!(validate_title("   ").is_err());
        assert!(validate_title(&"x".repeat(201)).is_err());
    }

    #[test]
    fn test_validate_property_type() {
        assert!(validate_property_type("apartment").is_ok());
        assert!(validate_property_type("tiny-house").is_ok());
        assert!(validate_property_type("bed_and_breakfast").is_ok());

        assert!(validate_property_type("").is_err());
        assert!(validate_property_type("Apartment").is_err());
        assert!(validate_property_type("two words").is_err());
    }

    #[test]
    fn test_validate_price() {
        assert!(validate_price(0.01).is_ok());
        assert!(validate_price(120.0).is_ok());

        assert!(validate_price(0.0).is_err());
        assert!(validate_price(-5.0).is_err());
        assert!(validate_price(f64::NAN).is_err());
        assert!(validate_price(f64::INFINITY).is_err());
    }

    #[test]
    fn test_validate_guest_count() {
        assert!(validate_guest_count(1).is_ok());
        assert!(validate_guest_count(12).is_ok());
        assert!(validate_guest_count(0).is_err());
        assert!(validate_guest_count(-3).is_err());
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2030-02-28", "Check-in date"),
            Ok(NaiveDate::from_ymd_opt(2030, 2, 28).unwrap())
        );
        assert!(parse_date("2030-02-30", "Check-in date").is_err());
        assert!(parse_date("28/02/2030", "Check-in date").is_err());
        assert!(parse_date("", "Check-in date").is_err());
    }

    #[test]
    fn test_validate_stay() {
        let d1 = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2030, 1, 2).unwrap();
        assert!(validate_stay(d1, d2).is_ok());
        assert!(validate_stay(d1, d1).is_err());
        assert!(validate_stay(d2, d1).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("host@example.com").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("a b@example.com").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("hunter22x").is_ok());
        assert!(validate_password("short1").is_err());
        assert!(validate_password("lettersonly").is_err());
        assert!(validate_password("1234567890").is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000", "listing_id").is_ok());
        assert!(validate_uuid("", "listing_id").is_err());
        assert!(validate_uuid("not-a-uuid", "listing_id").is_err());
    }
}
