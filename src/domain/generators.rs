//! Identifier generators
//!
//! Reference numbers, bank account unique ids and card credentials.

use chrono::{DateTime, Datelike, Utc};
use rand::Rng;

use super::constants::{bank_account, card, money_transfer};

fn random_digits<R: Rng + ?Sized>(rng: &mut R, count: usize) -> String {
    (0..count)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// New transfer reference number: 17 digits, never starting with zero.
pub fn reference_number() -> String {
    let mut rng = rand::thread_rng();
    let first = char::from(b'0' + rng.gen_range(1..10u8));
    let rest = random_digits(&mut rng, money_transfer::REFERENCE_NUMBER_LENGTH - 1);
    format!("{first}{rest}")
}

/// New bank account unique id: the bank prefix followed by ten digits.
pub fn unique_id(prefix: &str) -> String {
    let mut rng = rand::thread_rng();
    let digits = random_digits(&mut rng, bank_account::UNIQUE_ID_DIGITS);
    format!("{}{}", prefix.to_ascii_uppercase(), digits)
}

/// Luhn check digit for a string of digits
fn luhn_check_digit(payload: &str) -> u32 {
    let sum: u32 = payload
        .chars()
        .rev()
        .filter_map(|c| c.to_digit(10))
        .enumerate()
        .map(|(i, d)| {
            if i % 2 == 0 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();
    (10 - sum % 10) % 10
}

/// Check a full card number against its Luhn check digit.
pub fn is_luhn_valid(number: &str) -> bool {
    if number.len() < 2 || !number.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    let (payload, check) = number.split_at(number.len() - 1);
    check.parse::<u32>().ok() == Some(luhn_check_digit(payload))
}

/// New 16-digit card number under the given issuer prefix.
pub fn card_number(issuer_prefix: &str) -> String {
    let mut rng = rand::thread_rng();
    let body_len = card::NUMBER_LENGTH - 1 - issuer_prefix.len();
    let payload = format!("{}{}", issuer_prefix, random_digits(&mut rng, body_len));
    let check = luhn_check_digit(&payload);
    format!("{payload}{check}")
}

/// Expiry date (`MM/yy`) for a card issued at `issued_on`.
pub fn card_expiry_date(issued_on: DateTime<Utc>) -> String {
    let year = issued_on.year() + card::VALIDITY_YEARS;
    format!("{:02}/{:02}", issued_on.month(), year % 100)
}

pub fn card_security_code() -> String {
    let mut rng = rand::thread_rng();
    random_digits(&mut rng, card::SECURITY_CODE_LENGTH)
}
