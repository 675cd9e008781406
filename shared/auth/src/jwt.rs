use chrono::{Duration, Utc};
use civisure_common::AppError;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Claims carried by the session cookie. `sid` is the opaque session token.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sid: String,
    pub exp: i64,
    pub iat: i64,
}

impl SessionClaims {
    pub fn new(sid: String, ttl_hours: u64) -> Self {
        let now = Utc::now();
        let exp = now + Duration::hours(ttl_hours as i64);

        Self {
            sid,
            exp: exp.timestamp(),
            iat: now.timestamp(),
        }
    }
}

/// Signs and verifies session cookie values with the session secret.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.required_spec_claims = ["exp".to_string()].into_iter().collect();

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_ref()),
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }

    pub fn sign(&self, claims: &SessionClaims) -> Result<String, AppError> {
        encode(&Header::default(), claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to sign session: {}", e)))
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims, AppError> {
        decode::<SessionClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| AppError::Authentication(format!("Invalid session: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_session_verifies_with_same_secret() {
        let service = JwtService::new("secret");
        let token = service.sign(&SessionClaims::new("abc".into(), 1)).unwrap();

        assert_eq!(service.verify(&token).unwrap().sid, "abc");
    }

    #[test]
    fn tampered_or_foreign_tokens_are_rejected() {
        let service = JwtService::new("secret");
        let token = service.sign(&SessionClaims::new("abc".into(), 1)).unwrap();

        assert!(JwtService::new("other").verify(&token).is_err());
        assert!(service.verify("abc.def.ghi").is_err());
    }

    #[test]
    fn expired_session_is_rejected() {
        let service = JwtService::new("secret");
        let mut claims = SessionClaims::new("abc".into(), 1);
        claims.exp = Utc::now().timestamp() - 60;
        let token = service.sign(&claims).unwrap();

        assert!(service.verify(&token).is_err());
    }
}
