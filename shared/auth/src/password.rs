use bcrypt::{hash, verify, DEFAULT_COST};
use civisure_common::AppError;

#[derive(Debug, Clone, Copy)]
pub struct PasswordService {
    cost: u32,
}

impl Default for PasswordService {
    fn default() -> Self {
        Self { cost: DEFAULT_COST }
    }
}

impl PasswordService {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn hash_password(&self, password: &str) -> Result<String, AppError> {
        hash(password, self.cost)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
    }

    /// `Ok(false)` on mismatch; a malformed stored hash is an error.
    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AppError> {
        verify(password, hash)
            .map_err(|e| AppError::Internal(format!("Failed to verify password: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verifies_only_the_original_password() {
        let service = PasswordService::new(4);
        let hashed = service.hash_password("user123").unwrap();

        assert_ne!(hashed, "user123");
        assert!(service.verify_password("user123", &hashed).unwrap());
        assert!(!service.verify_password("user124", &hashed).unwrap());
    }

    #[test]
    fn garbage_hash_is_an_error() {
        let service = PasswordService::new(4);
        assert!(service.verify_password("user123", "not-a-hash").is_err());
    }
}
