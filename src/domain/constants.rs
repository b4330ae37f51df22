//! Model constants
//!
//! Column limits shared by validation and the SQL schema. Length limits are
//! `u64` because that is what `validator` compares string lengths against.

pub mod user {
    pub const FULL_NAME_MAX_LENGTH: u64 = 50;
    pub const USER_NAME_MAX_LENGTH: u64 = 256;
    pub const EMAIL_MAX_LENGTH: u64 = 256;
    pub const PASSWORD_MIN_LENGTH: usize = 8;
    pub const PASSWORD_MAX_LENGTH: usize = 128;
}

pub mod bank_account {
    pub const NAME_MAX_LENGTH: u64 = 35;
    pub const UNIQUE_ID_MAX_LENGTH: u64 = 34;
    pub const UNIQUE_ID_PREFIX_LENGTH: usize = 4;
    pub const UNIQUE_ID_DIGITS: usize = 10;
}

pub mod card {
    pub const NAME_MAX_LENGTH: u64 = 50;
    pub const NUMBER_LENGTH: usize = 16;
    pub const EXPIRY_DATE_LENGTH: usize = 5;
    pub const SECURITY_CODE_LENGTH: usize = 3;
    pub const VALIDITY_YEARS: i32 = 4;
}

pub mod money_transfer {
    pub const DESCRIPTION_MAX_LENGTH: u64 = 150;
    pub const REFERENCE_NUMBER_LENGTH: usize = 17;
    /// Decimal places of the `NUMERIC(18, 2)` amount and balance columns
    pub const AMOUNT_SCALE: u32 = 2;
    /// Largest absolute amount the columns hold, in cents
    pub const AMOUNT_MAX_CENTS: i64 = 999_999_999_999_999_999;
    /// Size of the "recent transfers" window
    pub const RECENT_LIMIT: i64 = 10;
}

/// Identity token coordinates in `user_tokens`
pub mod token {
    pub const LOGIN_PROVIDER: &str = "BankSystem";
    pub const ACCESS_TOKEN_NAME: &str = "AccessToken";
    pub const TOKEN_BYTES: usize = 32;
}
