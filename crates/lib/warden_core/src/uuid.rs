// Helper for generating identifiers.
//
// Users and refresh tokens get UUIDv7 ids so records sort by creation time.
// Security stamps are random v4 values: they only need to change, not sort.

use uuid::Uuid;

/// Generate a new UUIDv7 (timestamp-sortable).
pub fn uuidv7() -> Uuid {
    Uuid::now_v7()
}

/// Generate a fresh security stamp.
pub fn new_security_stamp() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuidv7_is_valid() {
        let id = uuidv7();
        assert_eq!(id.get_version(), Some(uuid::Version::SortRand));
    }

    #[test]
    fn uuidv7_is_monotonic() {
        let a = uuidv7();
        let b = uuidv7();
        assert!(b >= a);
    }

    #[test]
    fn security_stamps_differ() {
        let a = new_security_stamp();
        let b = new_security_stamp();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }
}
