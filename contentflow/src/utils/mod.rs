//! Utility functions for identifiers, timestamps and duration serialization.

pub mod durations;
pub mod timestamps;

pub use timestamps::{iso_timestamp, now_utc, Timestamp};

use uuid::Uuid;

/// Generates a new UUID v4.
#[must_use]
pub fn generate_uuid() -> Uuid {
    Uuid::new_v4()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_uuid_is_valid() {
        let id = generate_uuid();
        assert_eq!(id.get_version_num(), 4);
    }

    #[test]
    fn test_generate_uuid_is_unique() {
        assert_ne!(generate_uuid(), generate_uuid());
    }
}
