//! Record identifiers.

use rand::RngCore;

/// Length of every generated identifier.
pub const ID_LENGTH: usize = 26;

/// Generate a new 26-character lowercase identifier.
pub fn new_id() -> String {
    let mut bytes = [0u8; ID_LENGTH / 2];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Whether `id` has the shape of a generated identifier.
pub fn is_valid_id(id: &str) -> bool {
    id.len() == ID_LENGTH
        && id
            .bytes()
            .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_id() {
        let id = new_id();
        assert_eq!(id.len(), ID_LENGTH);
        assert!(is_valid_id(&id));
        assert_ne!(id, new_id());
    }

    #[test]
    fn test_is_valid_id() {
        assert!(!is_valid_id(""));
        assert!(!is_valid_id("123"));
        assert!(!is_valid_id("ABCDEFGHIJKLMNOPQRSTUVWXYZ"));
        assert!(is_valid_id("abcdefghijklmnopqrstuvwxyz"));
    }
}
