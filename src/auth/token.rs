use std::sync::Arc;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{AppError, AppResult};

pub const TOKEN_TTL: Duration = Duration::hours(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Doctor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
        }
    }
}

/// Who is calling, as asserted by the token's role claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    Patient(Uuid),
    Doctor(Uuid),
}

impl Identity {
    pub fn new(role: Role, subject: Uuid) -> Identity {
        match role {
            Role::Patient => Identity::Patient(subject),
            Role::Doctor => Identity::Doctor(subject),
        }
    }

    pub fn subject(&self) -> Uuid {
        match *self {
            Identity::Patient(id) | Identity::Doctor(id) => id,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Identity::Patient(_) => Role::Patient,
            Identity::Doctor(_) => Role::Doctor,
        }
    }

    /// The patient id, or `Unauthorized` with `message` for doctors.
    pub fn patient(&self, message: &str) -> AppResult<Uuid> {
        match *self {
            Identity::Patient(id) => Ok(id),
            Identity::Doctor(_) => Err(AppError::Unauthorized(message.to_owned())),
        }
    }

    pub fn doctor(&self, message: &str) -> AppResult<Uuid> {
        match *self {
            Identity::Doctor(id) => Ok(id),
            Identity::Patient(_) => Err(AppError::Unauthorized(message.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn identity(&self) -> AppResult<Identity> {
        let subject = Uuid::parse_str(&self.sub)
            .map_err(|_| AppError::Unauthenticated("Invalid or expired token".to_owned()))?;
        Ok(Identity::new(self.role, subject))
    }
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

/// Issues and checks HS256 identity tokens with the process-wide secret.
#[derive(Clone)]
pub struct TokenSigner {
    keys: Arc<Keys>,
}

impl TokenSigner {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            keys: Arc::new(Keys {
                encoding: EncodingKey::from_secret(secret),
                decoding: DecodingKey::from_secret(secret),
                validation,
            }),
        }
    }

    pub fn issue(&self, identity: Identity) -> AppResult<String> {
        let now = OffsetDateTime::now_utc();
        self.sign(&Claims {
            sub: identity.subject().to_string(),
            role: identity.role(),
            iat: now.unix_timestamp(),
            exp: (now + TOKEN_TTL).unix_timestamp(),
        })
    }

    pub(crate) fn sign(&self, claims: &Claims) -> AppResult<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.keys.encoding)
            .map_err(|err| AppError::Internal(anyhow::Error::from(err).context("JWT generation failed")))
    }

    pub fn claims(&self, token: &str) -> AppResult<Claims> {
        decode::<Claims>(token, &self.keys.decoding, &self.keys.validation)
            .map(|data| data.claims)
            .map_err(|err| {
                tracing::debug!(error = %err, "rejected bearer token");
                AppError::Unauthenticated("Invalid or expired token".to_owned())
            })
    }

    pub fn resolve(&self, token: &str) -> AppResult<Identity> {
        self.claims(token)?.identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_identity() {
        let signer = TokenSigner::new(b"test-secret");
        let id = Uuid::now_v7();

        let token = signer.issue(Identity::Doctor(id)).unwrap();
        assert_eq!(signer.resolve(&token).unwrap(), Identity::Doctor(id));

        let claims = signer.claims(&token).unwrap();
        assert_eq!(claims.exp - claims.iat, 3600);
        assert_eq!(claims.role, Role::Doctor);
    }

    #[test]
    fn rejects_other_secret() {
        let token = TokenSigner::new(b"one").issue(Identity::Patient(Uuid::now_v7())).unwrap();
        let err = TokenSigner::new(b"two").resolve(&token).unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(_)));
    }

    #[test]
    fn rejects_expired() {
        let signer = TokenSigner::new(b"test-secret");
        let issued = OffsetDateTime::now_utc() - Duration::hours(2);
        let token = signer
            .sign(&Claims {
                sub: Uuid::now_v7().to_string(),
                role: Role::Patient,
                iat: issued.unix_timestamp(),
                exp: (issued + TOKEN_TTL).unix_timestamp(),
            })
            .unwrap();

        assert!(matches!(signer.resolve(&token), Err(AppError::Unauthenticated(_))));
    }

    #[test]
    fn rejects_tampered_payload() {
        let signer = TokenSigner::new(b"test-secret");
        let token = signer.issue(Identity::Patient(Uuid::now_v7())).unwrap();
        let forged = signer
            .sign(&Claims {
                sub: Uuid::now_v7().to_string(),
                role: Role::Doctor,
                iat: 0,
                exp: i64::MAX / 2,
            })
            .unwrap();

        // Splice the forged payload onto the genuine signature.
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged_payload = forged.split('.').nth(1).unwrap();
        parts[1] = forged_payload;
        let spliced = parts.join(".");

        assert!(matches!(signer.resolve(&spliced), Err(AppError::Unauthenticated(_))));
    }

    #[test]
    fn role_gates() {
        let id = Uuid::now_v7();
        assert_eq!(Identity::Patient(id).patient("no").unwrap(), id);
        assert!(matches!(Identity::Doctor(id).patient("no"), Err(AppError::Unauthorized(_))));
        assert!(matches!(Identity::Patient(id).doctor("no"), Err(AppError::Unauthorized(_))));
    }
}
