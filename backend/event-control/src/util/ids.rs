//! Opaque identifier generation.

use uuid::Uuid;

/// Returns a fresh random 128-bit identifier rendered without hyphens.
/// Used for event, payment, viewer-session and admin ids.
pub fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}
