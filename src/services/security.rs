use crate::error::StepError;

/// Hash the admin password for storage in `admin_principal`.
pub fn hash_password(password: &str) -> Result<String, StepError> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|e| StepError::Action(format!("Failed to hash password: {}", e)))
}

/// Verify a password against its hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// Random 32-character hex token identifying a server to its cluster.
pub fn generate_server_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("s3cret").unwrap();
        assert_ne!(hash, "s3cret");
        assert!(verify_password("s3cret", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[test]
    fn test_server_tokens_are_unique_hex() {
        let a = generate_server_token();
        let b = generate_server_token();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
