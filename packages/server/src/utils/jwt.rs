use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

/// What a token may be used for. A confirmation link cannot log anyone in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenPurpose {
    Session,
    Confirm,
    Reset,
}

/// JWT Claims structure.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Username
    #[serde(default)]
    pub admin: bool,
    pub purpose: TokenPurpose,
    pub exp: usize, // Expiration timestamp
}

/// Sign a token for `username` valid for `ttl`.
pub fn sign(
    username: &str,
    admin: bool,
    purpose: TokenPurpose,
    ttl: Duration,
    secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims {
        sub: username.to_owned(),
        admin,
        purpose,
        exp: (Utc::now() + ttl).timestamp().max(0) as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Verify and decode a JWT token.
pub fn verify(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_tokens_round_trip_their_claims() {
        let token = sign("alice", true, TokenPurpose::Reset, Duration::hours(1), "s3cret").unwrap();
        let claims = verify(&token, "s3cret").unwrap();
        assert_eq!(claims.sub, "alice");
        assert!(claims.admin);
        assert_eq!(claims.purpose, TokenPurpose::Reset);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = sign("alice", false, TokenPurpose::Session, Duration::hours(1), "a").unwrap();
        assert!(verify(&token, "b").is_err());
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let token = sign("alice", false, TokenPurpose::Session, Duration::hours(-2), "s").unwrap();
        assert!(verify(&token, "s").is_err());
    }
}
