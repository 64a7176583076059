use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::auth::permissions::Role;
use crate::db::models::Account;
use crate::error::AuthError;

/// Session claims. Permissions are deliberately absent; they are resolved
/// from the live account on every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub payroll_id: String,
    pub email_work: String,
    pub role: Role,
    pub business_id: String,
    pub venue_id: String,
    pub work_area_id: String,
    pub iat: i64, // Issued at
    pub exp: i64, // Expiration time
}

pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "iat"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, account: &Account) -> Result<String, AuthError> {
        self.issue_at(account, Utc::now())
    }

    /// `now` is always the server clock; callers never supply it from a request.
    pub fn issue_at(&self, account: &Account, now: DateTime<Utc>) -> Result<String, AuthError> {
        let claims = Claims {
            payroll_id: account.payroll_id.clone(),
            email_work: account.email_work.clone(),
            role: account.role.clone(),
            business_id: account.linked.business_id.clone(),
            venue_id: account.linked.venue_id.clone(),
            work_area_id: account.linked.work_area_id.clone(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| {
            error!("Token creation failed: {}", e);
            AuthError::AuthenticationFailed
        })
    }

    /// Checks signature, structure and expiry. Only an otherwise valid but
    /// expired token yields `ExpiredToken`.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, AuthError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;

        // The decoder still accepts `exp == now`; a token is dead from its expiry second on.
        if data.claims.exp <= now.timestamp() {
            return Err(AuthError::ExpiredToken);
        }
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{AccountStatus, Linkage};

    fn account() -> Account {
        Account {
            payroll_id: "DK-000001".to_string(),
            email_work: "chef@example.com".to_string(),
            password_hash: String::new(),
            name_first: "Sam".to_string(),
            name_preferred: None,
            role: Role::Manager,
            permissions: None,
            linked: Linkage {
                business_id: "B1".to_string(),
                venue_id: "V1".to_string(),
                work_area_id: "W1".to_string(),
            },
            status: AccountStatus::Active,
            last_login: None,
        }
    }

    fn service() -> TokenService {
        TokenService::new("test_secret", Duration::hours(8))
    }

    #[test]
    fn test_issue_and_verify() {
        let service = service();
        let token = service.issue(&account()).unwrap();
        let claims = service.verify(&token).unwrap();

        assert_eq!(claims.payroll_id, "DK-000001");
        assert_eq!(claims.email_work, "chef@example.com");
        assert_eq!(claims.role, Role::Manager);
        assert_eq!(claims.business_id, "B1");
        assert_eq!(claims.venue_id, "V1");
        assert_eq!(claims.work_area_id, "W1");
        assert_eq!(claims.exp - claims.iat, 8 * 3600);
    }

    #[test]
    fn test_expired_token() {
        let service = service();
        let issued = Utc::now() - Duration::hours(9);
        let token = service.issue_at(&account(), issued).unwrap();

        assert_eq!(service.verify(&token), Err(AuthError::ExpiredToken));
    }

    #[test]
    fn test_expiry_second_is_rejected() {
        let service = service();
        let now = Utc::now();
        let token = service.issue_at(&account(), now - service.ttl()).unwrap();

        assert_eq!(service.verify_at(&token, now), Err(AuthError::ExpiredToken));

        let fresh = service.issue_at(&account(), now).unwrap();
        let last_valid = now + service.ttl() - Duration::seconds(1);
        assert!(service.verify_at(&fresh, last_valid).is_ok());
        assert_eq!(
            service.verify_at(&fresh, now + service.ttl()),
            Err(AuthError::ExpiredToken)
        );
    }

    #[test]
    fn test_tampered_signature() {
        let service = service();
        let token = service.issue(&account()).unwrap();

        let sig_start = token.rfind('.').unwrap() + 1;
        let mut bytes = token.into_bytes();
        bytes[sig_start] = if bytes[sig_start] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(bytes).unwrap();

        assert_eq!(service.verify(&tampered), Err(AuthError::InvalidToken));
    }

    #[test]
    fn test_tampered_expired_token_is_invalid() {
        let service = service();
        let token = service
            .issue_at(&account(), Utc::now() - Duration::hours(9))
            .unwrap();
        let sig_start = token.rfind('.').unwrap() + 1;
        let mut bytes = token.into_bytes();
        bytes[sig_start] = if bytes[sig_start] == b'z' { b'y' } else { b'z' };
        let tampered = String::from_utf8(bytes).unwrap();

        assert_eq!(service.verify(&tampered), Err(AuthError::InvalidToken));
    }

    #[test]
    fn test_wrong_secret_and_garbage() {
        let token = service().issue(&account()).unwrap();
        let other = TokenService::new("another_secret", Duration::hours(8));

        assert_eq!(other.verify(&token), Err(AuthError::InvalidToken));
        assert_eq!(service().verify("not.a.token"), Err(AuthError::InvalidToken));
        assert_eq!(service().verify(""), Err(AuthError::InvalidToken));
    }
}
