//! Shared constants for end-to-end tests
//!
//! When fixture data changes, update only this file.

// ============================================================================
// Reference Data
// ============================================================================

/// Band with a known discography
pub const BAND_1_NAME: &str = "Drudkh";

pub const BAND_1_ALBUM_1: &str = "Autumn Aurora";

pub const BAND_1_ALBUM_2: &str = "Blood in Our Wells";

/// Album listed by the shop but missing from the reference discography
pub const BAND_1_UNKNOWN_ALBUM: &str = "Shadow Play";

/// Band the reference data knows nothing about
pub const UNRELATED_BAND_NAME: &str = "Mayhem";

// ============================================================================
// Shop Fixture
// ============================================================================

/// Listings served by the fake shop across its two CD pages
pub const SHOP_LISTING_COUNT: usize = 4;

/// Listings that classify as Relevant
pub const SHOP_RELEVANT_COUNT: usize = 2;

// ============================================================================
// Timeouts
// ============================================================================

pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 20;

pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Upper bound for a background indexing run in tests
pub const INDEXING_TIMEOUT_MS: u64 = 5000;
