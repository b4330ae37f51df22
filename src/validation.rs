//! Custom field validators used by `#[derive(Validate)]` models.

use rust_decimal::Decimal;
use validator::ValidationError;

use crate::domain::constants::money_transfer::{AMOUNT_MAX_CENTS, AMOUNT_SCALE};
use crate::domain::constants::user::{PASSWORD_MAX_LENGTH, PASSWORD_MIN_LENGTH};

fn error(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(message.into());
    error
}

/// Required string: rejects empty and whitespace-only values.
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(error("required", "is required"));
    }
    Ok(())
}

/// Amount must fit the `NUMERIC(18, 2)` columns without rounding.
fn storable_amount(value: &Decimal) -> Result<(), ValidationError> {
    if value.normalize().scale() > AMOUNT_SCALE {
        return Err(error("amount_scale", "amount must have at most 2 decimal places"));
    }
    if value.abs() > Decimal::new(AMOUNT_MAX_CENTS, AMOUNT_SCALE) {
        return Err(error("amount_range", "amount is too large"));
    }
    Ok(())
}

pub fn non_zero_amount(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_zero() {
        return Err(error("non_zero", "amount must not be zero"));
    }
    storable_amount(value)
}

pub fn positive_amount(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        return Err(error("positive", "amount must be positive"));
    }
    storable_amount(value)
}

/// At least one letter and one digit, within the length bounds.
pub fn password_strength(password: &str) -> Result<(), ValidationError> {
    let length = password.chars().count();
    if !(PASSWORD_MIN_LENGTH..=PASSWORD_MAX_LENGTH).contains(&length) {
        return Err(error(
            "password_length",
            "password must be between 8 and 128 characters",
        ));
    }

    let has_letter = password.chars().any(|c| c.is_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !has_letter || !has_digit {
        return Err(error(
            "password_strength",
            "password must contain at least one letter and one digit",
        ));
    }

    Ok(())
}
