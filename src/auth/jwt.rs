use std::sync::Arc;

use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use thiserror::Error;
use time::Duration;
use tracing::debug;

use super::claims::Claims;
use crate::{clock::Clock, config::JwtConfig};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signature mismatch")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("malformed token")]
    Malformed,
    #[error("token signing failed: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Malformed,
        }
    }
}

/// Issues and verifies HS256 session tokens with a single process-wide secret.
///
/// Tokens are not stored anywhere; a token is valid iff its signature checks
/// out against the secret and the clock is still before `exp`. Replacing the
/// secret invalidates every outstanding token at once.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    pub fn new(config: &JwtConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            ttl: Duration::seconds(config.ttl_minutes.saturating_mul(60)),
            clock,
        }
    }

    pub fn issue(&self, user_id: i64) -> Result<String, TokenError> {
        let now = self.clock.now();
        let exp = now
            .checked_add(self.ttl)
            .ok_or_else(|| TokenError::Signing("token expiry out of range".into()))?;
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.unix_timestamp(),
            exp: exp.unix_timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        debug!(user_id, exp = claims.exp, "jwt signed");
        Ok(token)
    }

    /// Returns the user ID the token was issued for.
    pub fn verify(&self, token: &str) -> Result<i64, TokenError> {
        let claims = decode::<Claims>(token, &self.decoding, &self.validation())?.claims;
        let user_id = claims
            .sub
            .parse::<i64>()
            .map_err(|_| TokenError::Malformed)?;

        if self.clock.now().unix_timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }

        debug!(user_id, "jwt verified");
        Ok(user_id)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        // expiry is checked against the injected clock in verify()
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{testing::ManualClock, SystemClock};
    use time::macros::datetime;

    fn jwt_config(secret: &str, issuer: &str, audience: &str) -> JwtConfig {
        JwtConfig {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl_minutes: 24 * 60,
        }
    }

    fn make_service(secret: &str) -> TokenService {
        TokenService::new(&jwt_config(secret, "iss", "aud"), Arc::new(SystemClock))
    }

    #[test]
    fn issue_then_verify_returns_subject() {
        let tokens = make_service("dev-secret");
        let token = tokens.issue(42).expect("sign");
        assert_eq!(tokens.verify(&token), Ok(42));
    }

    #[test]
    fn token_expires_after_ttl() {
        let clock = Arc::new(ManualClock::new(datetime!(2025-03-01 12:00 UTC)));
        let tokens = TokenService::new(&jwt_config("dev-secret", "iss", "aud"), clock.clone());
        let token = tokens.issue(7).expect("sign");

        clock.advance(Duration::hours(24) - Duration::seconds(1));
        assert_eq!(tokens.verify(&token), Ok(7));

        clock.advance(Duration::seconds(1));
        assert_eq!(tokens.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn issue_is_deterministic_for_a_fixed_clock() {
        let clock = Arc::new(ManualClock::new(datetime!(2025-03-01 12:00 UTC)));
        let tokens = TokenService::new(&jwt_config("dev-secret", "iss", "aud"), clock);
        assert_eq!(tokens.issue(1).unwrap(), tokens.issue(1).unwrap());
        assert_ne!(tokens.issue(1).unwrap(), tokens.issue(2).unwrap());
    }

    #[test]
    fn issue_fails_cleanly_when_expiry_overflows() {
        let mut cfg = jwt_config("dev-secret", "iss", "aud");
        cfg.ttl_minutes = i64::MAX;
        let tokens = TokenService::new(&cfg, Arc::new(SystemClock));
        assert!(matches!(tokens.issue(1), Err(TokenError::Signing(_))));
    }

    #[test]
    fn verify_rejects_token_signed_with_other_secret() {
        let ours = make_service("secret-a");
        let theirs = make_service("secret-b");
        let token = theirs.issue(1).unwrap();
        assert_eq!(ours.verify(&token), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn verify_rejects_garbage() {
        let tokens = make_service("dev-secret");
        for junk in ["", "garbage", "a.b.c", "Bearer x.y.z"] {
            assert_eq!(tokens.verify(junk), Err(TokenError::Malformed), "input {junk:?}");
        }
    }

    #[test]
    fn verify_rejects_wrong_issuer_or_audience() {
        let good = TokenService::new(&jwt_config("same", "good-iss", "good-aud"), Arc::new(SystemClock));
        let bad = TokenService::new(&jwt_config("same", "bad-iss", "bad-aud"), Arc::new(SystemClock));
        let token = good.issue(1).unwrap();
        assert_eq!(bad.verify(&token), Err(TokenError::Malformed));
    }

    #[test]
    fn verify_rejects_non_numeric_subject() {
        let cfg = jwt_config("dev-secret", "iss", "aud");
        let tokens = TokenService::new(&cfg, Arc::new(SystemClock));
        let now = time::OffsetDateTime::now_utc();
        let claims = Claims {
            sub: "alice".into(),
            iat: now.unix_timestamp(),
            exp: (now + Duration::hours(1)).unix_timestamp(),
            iss: "iss".into(),
            aud: "aud".into(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(cfg.secret.as_bytes()),
        )
        .unwrap();
        assert_eq!(tokens.verify(&token), Err(TokenError::Malformed));
    }
}
