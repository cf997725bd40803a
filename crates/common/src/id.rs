//! ID generation utilities.

use ulid::Ulid;

/// ID generator for entities.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    _private: (),
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Generate a new ULID-based ID.
    ///
    /// ULIDs are lexicographically sortable and double as public
    /// tracking numbers for trackers.
    #[must_use]
    pub fn generate(&self) -> String {
        Ulid::new().to_string().to_lowercase()
    }

    /// Check whether a string has the shape of an ID produced by [`Self::generate`].
    #[must_use]
    pub fn is_valid(id: &str) -> bool {
        id.len() == 26 && Ulid::from_string(id).is_ok()
    }
}
