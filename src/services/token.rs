//! Session-token codec: HS256 issue + verify over the configured secret.
//!
//! The algorithm is pinned on both sides; a token that arrives with any
//! other `alg` fails verification. Every issued token carries `exp`, and
//! `validate` fails closed: any parsing or verification problem becomes an
//! explicit error, split into expired / signature / malformed so the gate
//! can audit a precise reason.
//!
//! Tokens carry identity only (`sub` is the principal UUID). Roles and
//! permissions are resolved from the store per request, never from claims.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{error, warn};
use uuid::Uuid;

use crate::error::AuthError;
use crate::repos::principal_repo::Principal;

/// Shorter than this and the secret is guessable; refuse to start.
const MIN_SECRET_BYTES: usize = 32;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iss: String,
    aud: String,
    sub: String,
    iat: i64,
    exp: i64,
    jti: String,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_in: u64,
}

/// Identity carried by a verified token.
#[derive(Debug, Clone)]
pub struct TokenIdentity {
    pub principal_id: Uuid,
    pub jti: String,
}

#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
    ttl_seconds: u64,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print key material
        f.debug_struct("TokenCodec")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("ttl_seconds", &self.ttl_seconds)
            .finish()
    }
}

impl TokenCodec {
    pub fn new(
        secret: &[u8],
        issuer: &str,
        audience: &str,
        ttl_seconds: u64,
        leeway_seconds: u64,
    ) -> Result<Self, AuthError> {
        if secret.len() < MIN_SECRET_BYTES {
            warn!(
                len = secret.len(),
                "signing secret shorter than {MIN_SECRET_BYTES} bytes"
            );
            return Err(AuthError::Internal);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[audience]);
        validation.leeway = leeway_seconds;
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            issuer: issuer.to_string(),
            audience: audience.to_string(),
            ttl_seconds,
        })
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    /// Issue a token for an authenticated principal. `exp` is mandatory.
    pub fn issue(&self, principal: &Principal) -> Result<IssuedToken, AuthError> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            sub: principal.id.to_string(),
            iat: now,
            exp: now + self.ttl_seconds as i64,
            jti: Uuid::new_v4().to_string(),
        };

        let mut header = Header::new(Algorithm::HS256);
        header.typ = Some("JWT".to_string());
        let token = jsonwebtoken::encode(&header, &claims, &self.encoding_key).map_err(|e| {
            error!(error = %e, "failed to sign session token");
            AuthError::Internal
        })?;

        Ok(IssuedToken {
            token,
            expires_in: self.ttl_seconds,
        })
    }

    /// Verify a token and return the identity it carries.
    ///
    /// Anything other than a valid, unexpired, correctly signed token with
    /// the expected issuer/audience and a UUID `sub` is an error; there is
    /// no partial acceptance.
    pub fn validate(&self, token: &str) -> Result<TokenIdentity, AuthError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                ErrorKind::InvalidSignature => AuthError::SignatureMismatch,
                _ => AuthError::TokenMalformed,
            })?;

        let principal_id =
            Uuid::parse_str(&data.claims.sub).map_err(|_| AuthError::TokenMalformed)?;

        Ok(TokenIdentity {
            principal_id,
            jti: data.claims.jti,
        })
    }
}

/// Short non-reversible tag for correlating a token in audit entries
/// without ever writing the token itself.
pub fn fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    digest[..8].iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repos::principal_repo::{PrincipalStatus, Role};

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn codec() -> TokenCodec {
        TokenCodec::new(SECRET, "authgate-test", "authgate-api", 600, 0).unwrap()
    }

    fn principal() -> Principal {
        Principal {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            email: "a@x.com".to_string(),
            role: Role::User,
            status: PrincipalStatus::Active,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn short_secret_is_refused() {
        assert!(TokenCodec::new(b"short", "iss", "aud", 600, 0).is_err());
    }

    #[test]
    fn round_trip_returns_the_same_principal() {
        let codec = codec();
        let p = principal();
        let issued = codec.issue(&p).unwrap();

        let identity = codec.validate(&issued.token).unwrap();
        assert_eq!(identity.principal_id, p.id);
        assert_eq!(issued.expires_in, 600);
    }

    #[test]
    fn tampered_token_is_a_signature_mismatch() {
        let codec = codec();
        let issued = codec.issue(&principal()).unwrap();

        // Flip a character in the payload segment.
        let mut parts: Vec<String> = issued.token.split('.').map(str::to_string).collect();
        let payload = &mut parts[1];
        let replacement = if payload.ends_with('A') { "B" } else { "A" };
        payload.replace_range(payload.len() - 1.., replacement);
        let tampered = parts.join(".");

        let err = codec.validate(&tampered).unwrap_err();
        assert!(
            matches!(
                err,
                AuthError::SignatureMismatch | AuthError::TokenMalformed
            ),
            "got {err:?}"
        );
    }

    #[test]
    fn wrong_secret_is_a_signature_mismatch() {
        let issued = codec().issue(&principal()).unwrap();
        let other = TokenCodec::new(
            b"ffffffffffffffffffffffffffffffff",
            "authgate-test",
            "authgate-api",
            600,
            0,
        )
        .unwrap();

        let err = other.validate(&issued.token).unwrap_err();
        assert!(matches!(err, AuthError::SignatureMismatch));
    }

    #[test]
    fn expired_token_is_rejected_as_expired() {
        let codec = codec();
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            iss: "authgate-test".to_string(),
            aud: "authgate-api".to_string(),
            sub: Uuid::new_v4().to_string(),
            iat: now - 1_200,
            exp: now - 600,
            jti: Uuid::new_v4().to_string(),
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        let err = codec.validate(&token).unwrap_err();
        assert!(matches!(err, AuthError::TokenExpired));
    }

    #[test]
    fn other_algorithm_is_rejected() {
        let codec = codec();
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            iss: "authgate-test".to_string(),
            aud: "authgate-api".to_string(),
            sub: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + 600,
            jti: Uuid::new_v4().to_string(),
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS384),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        // Pinned HS256: HS384 never validates, whatever the secret.
        assert!(codec.validate(&token).is_err());
    }

    #[test]
    fn garbage_is_malformed() {
        let err = codec().validate("not-a-token").unwrap_err();
        assert!(matches!(err, AuthError::TokenMalformed));
    }

    #[test]
    fn wrong_audience_is_rejected() {
        let issuing = codec();
        let validating =
            TokenCodec::new(SECRET, "authgate-test", "other-audience", 600, 0).unwrap();
        let issued = issuing.issue(&principal()).unwrap();
        assert!(validating.validate(&issued.token).is_err());
    }

    #[test]
    fn non_uuid_subject_is_malformed() {
        let codec = codec();
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            iss: "authgate-test".to_string(),
            aud: "authgate-api".to_string(),
            sub: "42".to_string(),
            iat: now,
            exp: now + 600,
            jti: Uuid::new_v4().to_string(),
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        let err = codec.validate(&token).unwrap_err();
        assert!(matches!(err, AuthError::TokenMalformed));
    }

    #[test]
    fn fingerprint_is_stable_and_short() {
        let fp = fingerprint("abc");
        assert_eq!(fp, fingerprint("abc"));
        assert_eq!(fp.len(), 16);
        assert_ne!(fp, fingerprint("abd"));
    }
}
