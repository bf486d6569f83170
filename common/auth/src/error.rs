use common_http_errors::Failure;
use jsonwebtoken::errors::{Error as JwtError, ErrorKind};

pub type AuthResult<T> = Result<T, Failure>;

/// Maps jsonwebtoken errors onto failure kinds. Anything wrong with the token
/// itself is a client fault; key material problems are ours.
pub fn map_jwt_error(error: JwtError) -> Failure {
    match error.kind() {
        ErrorKind::InvalidEcdsaKey
        | ErrorKind::InvalidRsaKey(_)
        | ErrorKind::RsaFailedSigning
        | ErrorKind::InvalidKeyFormat
        | ErrorKind::Crypto(_) => Failure::internal(format!("token key material error: {error}")),
        ErrorKind::InvalidSignature => {
            Failure::malformed_token("JWT signature does not match locally computed signature")
        }
        ErrorKind::MissingRequiredClaim(claim) => {
            Failure::malformed_token(format!("JWT is missing required claim '{claim}'"))
        }
        _ => Failure::malformed_token(format!("malformed JWT: {error}")),
    }
}
