//! Shared-secret authentication for hook requests.
//!
//! Callers send the secret verbatim in the `Authorization` header. A missing
//! header counts as an empty value, so an empty configured secret admits
//! every request that omits the header.

use tracing::warn;

/// Check a provided header value against the configured secret.
///
/// Byte-for-byte equality, compared in constant time.
pub fn is_authorized(expected: &[u8], provided: &[u8]) -> bool {
    let valid = constant_time_compare(expected, provided);

    if !valid {
        warn!(
            expected_length = expected.len(),
            actual_length = provided.len(),
            "shared_secret_mismatch"
        );
    }

    valid
}

/// Constant-time comparison to prevent timing attacks.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// Whether a non-empty shared secret is configured.
pub fn is_secret_configured(secret: &str) -> bool {
    !secret.is_empty()
}
