//! Bearer-token verification boundary.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};

use atelier_core::UserId;

use crate::claims::{TokenClaims, validate_claims};
use crate::AuthzError;

/// Verifies a bearer token and yields its subject.
///
/// Expired or malformed tokens must be rejected here, before any identity is built.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<UserId, AuthzError>;
}

/// HS256 (shared secret) token verifier.
///
/// Time-window checks run through [`validate_claims`] against the caller's
/// clock instead of the library's, so tests stay deterministic.
#[derive(Clone)]
pub struct Hs256TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256TokenVerifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Self {
            key: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }
}

impl core::fmt::Debug for Hs256TokenVerifier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256TokenVerifier").finish_non_exhaustive()
    }
}

impl TokenVerifier for Hs256TokenVerifier {
    fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<UserId, AuthzError> {
        let data = jsonwebtoken::decode::<TokenClaims>(token, &self.key, &self.validation)
            .map_err(|e| {
                AuthzError::unauthenticated(format!("could not validate credentials: {e}"))
            })?;

        validate_claims(&data.claims, now)
            .map_err(|e| AuthzError::unauthenticated(e.to_string()))?;

        Ok(data.claims.sub)
    }
}

/// Strip a `Bearer ` prefix from an authorization header value.
pub fn bearer_token(header: &str) -> Result<&str, AuthzError> {
    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AuthzError::unauthenticated("missing bearer scheme"))?
        .trim();

    if token.is_empty() {
        return Err(AuthzError::unauthenticated("empty bearer token"));
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use jsonwebtoken::{EncodingKey, Header};

    use super::*;

    const SECRET: &str = "test-secret";

    fn mint(secret: &str, claims: &TokenClaims) -> String {
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("failed to encode token")
    }

    #[test]
    fn verifies_subject_of_fresh_token() {
        let now = Utc::now();
        let user = UserId::new();
        let token = mint(SECRET, &TokenClaims::new(user, now, Duration::minutes(10)));

        let verifier = Hs256TokenVerifier::new(SECRET);
        assert_eq!(verifier.verify(&token, now).unwrap(), user);
    }

    #[test]
    fn rejects_wrong_secret() {
        let now = Utc::now();
        let token = mint("other", &TokenClaims::new(UserId::new(), now, Duration::minutes(10)));

        let err = Hs256TokenVerifier::new(SECRET).verify(&token, now).unwrap_err();
        assert!(matches!(err, AuthzError::Unauthenticated(_)));
    }

    #[test]
    fn rejects_expired_token() {
        let now = Utc::now();
        let token = mint(
            SECRET,
            &TokenClaims::new(UserId::new(), now - Duration::hours(1), Duration::minutes(10)),
        );

        let err = Hs256TokenVerifier::new(SECRET).verify(&token, now).unwrap_err();
        assert_eq!(err, AuthzError::Unauthenticated("token has expired".into()));
    }

    #[test]
    fn rejects_garbage() {
        let err = Hs256TokenVerifier::new(SECRET)
            .verify("not.a.token", Utc::now())
            .unwrap_err();
        assert!(matches!(err, AuthzError::Unauthenticated(_)));
    }

    #[test]
    fn extracts_bearer_token() {
        assert_eq!(bearer_token("Bearer abc.def ").unwrap(), "abc.def");
        assert!(bearer_token("Basic abc").is_err());
        assert!(bearer_token("Bearer   ").is_err());
    }
}
