pub mod claims;
pub mod config;
pub mod error;
pub mod extractors;
pub mod keys;
pub mod pipeline;
pub mod verifier;

pub use claims::{AuthenticatedIdentity, Claims};
pub use config::{TokenConfig, VerificationMethod, VerificationMode};
pub use error::{map_jwt_error, AuthResult};
pub use extractors::{extract_token, AuthContext, Unauthenticated};
pub use jsonwebtoken::Algorithm;
pub use keys::{load_pem_der, KeyPair};
pub use pipeline::{require_auth, AuthHooks, AuthenticationManager, Authenticator, MarkAuthenticated};
pub use verifier::TokenService;
