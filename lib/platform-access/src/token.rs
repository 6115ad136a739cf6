//! HS256 access and refresh tokens.
//!
//! Access tokens are short-lived and carry everything a request handler
//! needs (identity id, membership id, role, contact). Refresh tokens only
//! name the identity; a refresh is honoured only while its fingerprint
//! matches the one stored against the identity.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use ssfi_core::Role;
use std::fmt;

/// Distinguishes access from refresh tokens so neither can stand in for
/// the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Claims embedded in an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Identity id.
    pub sub: String,
    /// Membership identifier, if assigned.
    pub uid: Option<String>,
    pub role: Role,
    pub phone: String,
    pub email: Option<String>,
    pub typ: TokenType,
    pub iat: i64,
    pub exp: i64,
}

/// Claims embedded in a refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// Identity id.
    pub sub: String,
    /// Unique per issuance so two logins never yield the same token.
    pub jti: String,
    pub typ: TokenType,
    pub iat: i64,
    pub exp: i64,
}

/// An access/refresh pair returned by login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

/// Token validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Not three base64url segments of JSON.
    Malformed { reason: String },
    /// Header names an algorithm other than HS256.
    UnsupportedAlgorithm,
    /// Signature does not verify.
    BadSignature,
    /// Token of the other type.
    WrongType,
    /// `exp` has passed.
    Expired,
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed { reason } => write!(f, "malformed token: {reason}"),
            Self::UnsupportedAlgorithm => write!(f, "unsupported token algorithm"),
            Self::BadSignature => write!(f, "invalid token signature"),
            Self::WrongType => write!(f, "wrong token type"),
            Self::Expired => write!(f, "token has expired"),
        }
    }
}

impl std::error::Error for TokenError {}

#[derive(Debug, Serialize, Deserialize)]
struct JwtHeader {
    alg: String,
    typ: String,
}

/// Signs and verifies tokens with a shared secret.
#[derive(Clone)]
pub struct TokenIssuer {
    secret: Vec<u8>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Creates an issuer.
    #[must_use]
    pub fn new(secret: impl Into<Vec<u8>>, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            access_ttl,
            refresh_ttl,
        }
    }

    /// Lifetime of access tokens.
    #[must_use]
    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Lifetime of refresh tokens.
    #[must_use]
    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Signs an access token for the given claims template.
    ///
    /// # Errors
    ///
    /// Fails only if the claims cannot be serialized.
    pub fn issue_access(
        &self,
        sub: String,
        uid: Option<String>,
        role: Role,
        phone: String,
        email: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let claims = AccessClaims {
            sub,
            uid,
            role,
            phone,
            email,
            typ: TokenType::Access,
            iat: now.timestamp(),
            exp: (now + self.access_ttl).timestamp(),
        };
        self.encode(&claims)
    }

    /// Signs a refresh token for `sub`.
    ///
    /// # Errors
    ///
    /// Fails only if the claims cannot be serialized.
    pub fn issue_refresh(&self, sub: String, now: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = RefreshClaims {
            sub,
            jti: ulid::Ulid::new().to_string(),
            typ: TokenType::Refresh,
            iat: now.timestamp(),
            exp: (now + self.refresh_ttl).timestamp(),
        };
        self.encode(&claims)
    }

    /// Verifies an access token's signature, type and expiry.
    ///
    /// # Errors
    ///
    /// Returns the first check that fails.
    pub fn verify_access(&self, token: &str, now: DateTime<Utc>) -> Result<AccessClaims, TokenError> {
        let claims: AccessClaims = self.decode(token)?;
        check(claims.typ, TokenType::Access, claims.exp, now)?;
        Ok(claims)
    }

    /// Verifies a refresh token's signature, type and expiry.
    ///
    /// # Errors
    ///
    /// Returns the first check that fails.
    pub fn verify_refresh(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<RefreshClaims, TokenError> {
        let claims: RefreshClaims = self.decode(token)?;
        check(claims.typ, TokenType::Refresh, claims.exp, now)?;
        Ok(claims)
    }

    fn mac(&self) -> Result<Hmac<Sha256>, TokenError> {
        <Hmac<Sha256> as Mac>::new_from_slice(&self.secret).map_err(|e| TokenError::Malformed {
            reason: e.to_string(),
        })
    }

    fn encode<T: Serialize>(&self, claims: &T) -> Result<String, TokenError> {
        let header = JwtHeader {
            alg: "HS256".to_string(),
            typ: "JWT".to_string(),
        };
        let header_b64 = URL_SAFE_NO_PAD.encode(to_json(&header)?);
        let claims_b64 = URL_SAFE_NO_PAD.encode(to_json(claims)?);
        let signing_input = format!("{header_b64}.{claims_b64}");

        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{signing_input}.{signature}"))
    }

    fn decode<T: DeserializeOwned>(&self, token: &str) -> Result<T, TokenError> {
        let mut parts = token.trim().split('.');
        let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Malformed {
                reason: "expected three segments".to_string(),
            });
        };

        let header: JwtHeader = from_segment(header_b64)?;
        if header.alg != "HS256" || !header.typ.eq_ignore_ascii_case("JWT") {
            return Err(TokenError::UnsupportedAlgorithm);
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| TokenError::BadSignature)?;
        let mut mac = self.mac()?;
        mac.update(format!("{header_b64}.{claims_b64}").as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        from_segment(claims_b64)
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, TokenError> {
    serde_json::to_vec(value).map_err(|e| TokenError::Malformed {
        reason: e.to_string(),
    })
}

fn from_segment<T: DeserializeOwned>(segment: &str) -> Result<T, TokenError> {
    let raw = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| TokenError::Malformed {
            reason: e.to_string(),
        })?;
    serde_json::from_slice(&raw).map_err(|e| TokenError::Malformed {
        reason: e.to_string(),
    })
}

fn check(
    actual: TokenType,
    expected: TokenType,
    exp: i64,
    now: DateTime<Utc>,
) -> Result<(), TokenError> {
    if actual != expected {
        return Err(TokenError::WrongType);
    }
    if now.timestamp() >= exp {
        return Err(TokenError::Expired);
    }
    Ok(())
}

/// Digest stored in place of a refresh token.
#[must_use]
pub fn fingerprint(token: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(
            b"0123456789abcdef0123456789abcdef".to_vec(),
            Duration::minutes(15),
            Duration::days(7),
        )
    }

    fn access(now: DateTime<Utc>) -> String {
        issuer()
            .issue_access(
                "idn_01".to_string(),
                Some("SSFI-KA-00-00-0001".to_string()),
                Role::StateSecretary,
                "9876543210".to_string(),
                None,
                now,
            )
            .expect("issue")
    }

    #[test]
    fn access_token_round_trips_claims() {
        let now = Utc::now();
        let claims = issuer().verify_access(&access(now), now).expect("verify");
        assert_eq!(claims.sub, "idn_01");
        assert_eq!(claims.role, Role::StateSecretary);
        assert_eq!(claims.uid.as_deref(), Some("SSFI-KA-00-00-0001"));
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }

    #[test]
    fn expired_access_token_rejected() {
        let now = Utc::now();
        let token = access(now);
        let err = issuer()
            .verify_access(&token, now + Duration::minutes(16))
            .unwrap_err();
        assert_eq!(err, TokenError::Expired);
    }

    #[test]
    fn tampered_token_rejected() {
        let now = Utc::now();
        let token = access(now);
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = URL_SAFE_NO_PAD.encode(br#"{"sub":"idn_02"}"#);
        parts[1] = &forged;
        let err = issuer().verify_access(&parts.join("."), now).unwrap_err();
        assert_eq!(err, TokenError::BadSignature);
    }

    #[test]
    fn other_secret_rejected() {
        let now = Utc::now();
        let other = TokenIssuer::new(b"another-secret".to_vec(), Duration::minutes(1), Duration::days(1));
        let err = other.verify_access(&access(now), now).unwrap_err();
        assert_eq!(err, TokenError::BadSignature);
    }

    #[test]
    fn refresh_token_cannot_be_used_as_access() {
        let now = Utc::now();
        let refresh = issuer().issue_refresh("idn_01".to_string(), now).expect("issue");
        assert_eq!(
            issuer().verify_access(&refresh, now).unwrap_err(),
            TokenError::WrongType
        );
        assert!(issuer().verify_refresh(&refresh, now).is_ok());
    }

    #[test]
    fn refresh_tokens_are_unique_per_issue() {
        let now = Utc::now();
        let a = issuer().issue_refresh("idn_01".to_string(), now).expect("issue");
        let b = issuer().issue_refresh("idn_01".to_string(), now).expect("issue");
        assert_ne!(a, b);
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn malformed_tokens_rejected() {
        for token in ["", "a.b", "a.b.c.d", "!!.??.##"] {
            assert!(matches!(
                issuer().verify_access(token, Utc::now()),
                Err(TokenError::Malformed { .. })
            ));
        }
    }
}
