//! Fixed test IDs and credentials for deterministic tests.

use uuid::Uuid;

// User IDs (100-199)
pub const TEST_USER_ALICE: Uuid = Uuid::from_u128(100);
pub const TEST_USER_BOB: Uuid = Uuid::from_u128(101);
pub const TEST_USER_CHARLIE: Uuid = Uuid::from_u128(102);

// Chat group IDs (1000-1099)
pub const TEST_GROUP_GENERAL: Uuid = Uuid::from_u128(1000);
pub const TEST_GROUP_RANDOM: Uuid = Uuid::from_u128(1001);

// Message IDs (2000-2099)
pub const TEST_MESSAGE_1: Uuid = Uuid::from_u128(2000);

// Contact details
pub const TEST_EMAIL_ALICE: &str = "alice@example.com";
pub const TEST_EMAIL_BOB: &str = "bob@example.com";
pub const TEST_PHONE_CHARLIE: &str = "+15551234567";

/// Satisfies the password strength rules (length, upper, lower, digit, special).
pub const TEST_PASSWORD: &str = "Sup3r!Secret";

pub const TEST_WRONG_PASSWORD: &str = "Wr0ng!Secret";
