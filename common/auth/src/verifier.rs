use chrono::{TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::{Map, Value};
use tracing::{debug, info};

use common_http_errors::Failure;

use crate::claims::Claims;
use crate::config::{TokenConfig, VerificationMode};
use crate::error::{map_jwt_error, AuthResult};
use crate::keys::KeyPair;

const HMAC_ALGORITHMS: &[Algorithm] = &[Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
const RSA_ALGORITHMS: &[Algorithm] = &[
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
];

/// Key material resolved from the configured mode.
#[derive(Clone)]
enum Keys {
    Secret {
        encoding: EncodingKey,
        decoding: DecodingKey,
    },
    RsaKeyPair(KeyPair),
}

/// Signs and verifies compact JWTs. Immutable after construction and safe to
/// share across request handlers.
#[derive(Clone)]
pub struct TokenService {
    keys: Keys,
    allowed_clock_skew_seconds: u64,
}

impl TokenService {
    /// Loads key material. Any failure here should abort startup.
    pub fn initialize(config: &TokenConfig) -> AuthResult<Self> {
        let keys = match &config.mode {
            VerificationMode::Secret(secret) => {
                if secret.is_empty() {
                    return Err(Failure::internal("token secret must be non-empty"));
                }
                Keys::Secret {
                    encoding: EncodingKey::from_secret(secret),
                    decoding: DecodingKey::from_secret(secret),
                }
            }
            VerificationMode::RsaKeyPair {
                public_key_path,
                private_key_path,
            } => Keys::RsaKeyPair(KeyPair::load(
                public_key_path,
                private_key_path.as_deref(),
            )?),
        };

        info!(
            mode = config.mode.name(),
            skew = config.allowed_clock_skew_seconds,
            "token service initialized"
        );
        Ok(Self {
            keys,
            allowed_clock_skew_seconds: config.allowed_clock_skew_seconds,
        })
    }

    pub fn allowed_clock_skew_seconds(&self) -> u64 {
        self.allowed_clock_skew_seconds
    }

    pub fn can_sign(&self) -> bool {
        match &self.keys {
            Keys::Secret { .. } => true,
            Keys::RsaKeyPair(pair) => pair.can_sign(),
        }
    }

    pub fn sign(&self, claims: &Claims, algorithm: Algorithm) -> AuthResult<String> {
        let key = match &self.keys {
            Keys::Secret { encoding, .. } => {
                ensure_family(algorithm, HMAC_ALGORITHMS, "secret")?;
                encoding
            }
            Keys::RsaKeyPair(pair) => {
                ensure_family(algorithm, RSA_ALGORITHMS, "rsa_key")?;
                pair.private_key()
                    .ok_or_else(|| Failure::missing_signing_key("Private key was not specified"))?
            }
        };
        encode(&Header::new(algorithm), claims, key).map_err(map_jwt_error)
    }

    pub fn verify_and_extract(&self, token: &str) -> AuthResult<Claims> {
        self.verify_and_extract_at(token, Utc::now().timestamp())
    }

    /// Verification against an explicit `now` (seconds since the epoch).
    /// The signature is always checked before `exp` and `nbf`.
    pub fn verify_and_extract_at(&self, token: &str, now: i64) -> AuthResult<Claims> {
        let (key, algorithms) = match &self.keys {
            Keys::Secret { decoding, .. } => (decoding, HMAC_ALGORITHMS),
            Keys::RsaKeyPair(pair) => (pair.public_key(), RSA_ALGORITHMS),
        };

        let mut validation = Validation::new(algorithms[0]);
        validation.algorithms = algorithms.to_vec();
        validation.set_required_spec_claims(&["exp"]);
        validation.validate_exp = false;
        validation.validate_aud = false;

        let token_data = decode::<Map<String, Value>>(token, key, &validation).map_err(map_jwt_error)?;
        let claims = Claims::from(token_data.claims);

        let expires_at = numeric_date(&claims, "exp")?
            .ok_or_else(|| Failure::malformed_token("JWT is missing required claim 'exp'"))?;
        self.check_expiry(expires_at, now)?;
        if let Some(not_before) = numeric_date(&claims, "nbf")? {
            self.check_not_before(not_before, now)?;
        }

        debug!("verified JWT successfully");
        Ok(claims)
    }

    fn check_expiry(&self, expires_at: i128, now: i64) -> AuthResult<()> {
        let now = i128::from(now);
        if now <= expires_at + self.skew() {
            return Ok(());
        }
        Err(Failure::token_expired(format!(
            "JWT expired at {}. Current time: {}, a difference of {} seconds. Allowed clock skew: {} seconds.",
            format_timestamp(expires_at),
            format_timestamp(now),
            now - expires_at,
            self.allowed_clock_skew_seconds,
        )))
    }

    fn check_not_before(&self, not_before: i128, now: i64) -> AuthResult<()> {
        let now = i128::from(now);
        if now + self.skew() >= not_before {
            return Ok(());
        }
        Err(Failure::malformed_token(format!(
            "JWT must not be accepted before {}. Current time: {}, a difference of {} seconds. Allowed clock skew: {} seconds.",
            format_timestamp(not_before),
            format_timestamp(now),
            not_before - now,
            self.allowed_clock_skew_seconds,
        )))
    }

    fn skew(&self) -> i128 {
        i128::from(self.allowed_clock_skew_seconds)
    }
}

/// Reads a NumericDate claim. Integers past `i64::MAX` are kept exact.
fn numeric_date(claims: &Claims, name: &str) -> AuthResult<Option<i128>> {
    let Some(value) = claims.get(name) else {
        return Ok(None);
    };
    value
        .as_i64()
        .map(i128::from)
        .or_else(|| value.as_u64().map(i128::from))
        .map(Some)
        .ok_or_else(|| {
            Failure::malformed_token(format!(
                "JWT '{name}' claim must be an integer number of seconds"
            ))
        })
}

fn ensure_family(algorithm: Algorithm, family: &[Algorithm], mode: &str) -> AuthResult<()> {
    if family.contains(&algorithm) {
        Ok(())
    } else {
        Err(Failure::invalid_verification_method(format!(
            "Algorithm {algorithm:?} cannot be used with verification method {mode}"
        )))
    }
}

fn format_timestamp(seconds: i128) -> String {
    i64::try_from(seconds)
        .ok()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .map(|ts| ts.to_rfc3339())
        .unwrap_or_else(|| seconds.to_string())
}
