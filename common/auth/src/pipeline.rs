use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use tracing::{debug, error, info};

use common_http_errors::{ErrorResponder, Failure};

use crate::claims::AuthenticatedIdentity;
use crate::error::AuthResult;
use crate::extractors::extract_token;
use crate::verifier::TokenService;

/// Host callbacks around authentication. Both default to no-ops.
pub trait AuthHooks: Send + Sync {
    /// Runs before anything is checked, including the header.
    fn before(&self, _parts: &Parts) {}

    /// Runs only after successful authentication.
    fn after(&self, _parts: &Parts, _identity: &AuthenticatedIdentity) {}
}

/// Authorization step applied to a freshly decoded identity.
pub trait AuthenticationManager: Send + Sync {
    fn authenticate(&self, identity: AuthenticatedIdentity) -> AuthResult<AuthenticatedIdentity>;
}

/// Accepts every verified identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkAuthenticated;

impl AuthenticationManager for MarkAuthenticated {
    fn authenticate(&self, mut identity: AuthenticatedIdentity) -> AuthResult<AuthenticatedIdentity> {
        identity.authenticated = true;
        Ok(identity)
    }
}

/// Drives a single verification attempt per request.
#[derive(Clone)]
pub struct Authenticator {
    tokens: Arc<TokenService>,
    manager: Arc<dyn AuthenticationManager>,
    hooks: Option<Arc<dyn AuthHooks>>,
    responder: ErrorResponder,
}

impl Authenticator {
    pub fn new(tokens: Arc<TokenService>) -> Self {
        Self {
            tokens,
            manager: Arc::new(MarkAuthenticated),
            hooks: None,
            responder: ErrorResponder::default(),
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn AuthHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn with_manager(mut self, manager: Arc<dyn AuthenticationManager>) -> Self {
        self.manager = manager;
        self
    }

    pub fn with_responder(mut self, responder: ErrorResponder) -> Self {
        self.responder = responder;
        self
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn responder(&self) -> ErrorResponder {
        self.responder
    }

    pub fn authenticate(&self, parts: &Parts) -> AuthResult<AuthenticatedIdentity> {
        if let Some(hooks) = &self.hooks {
            hooks.before(parts);
        }

        let token = extract_token(&parts.headers)?;
        let claims = self.tokens.verify_and_extract(token)?;
        let identity = self.manager.authenticate(claims.identity()?)?;

        if let Some(hooks) = &self.hooks {
            hooks.after(parts, &identity);
        }
        Ok(identity)
    }
}

pub(crate) fn log_failure(failure: &Failure) {
    if failure.is_expected() {
        info!(kind = %failure.kind(), "{failure}");
    } else {
        error!(kind = %failure.kind(), "Fatal error occurred: {failure}");
    }
}

/// Rejects the request unless it carries a valid bearer token. On success the
/// identity is stored in the request extensions for [`crate::AuthContext`].
pub async fn require_auth(
    State(auth): State<Authenticator>,
    request: Request,
    next: Next,
) -> Result<Response, Failure> {
    let (mut parts, body) = request.into_parts();
    match auth.authenticate(&parts) {
        Ok(identity) => {
            debug!(username = %identity.username, "request authenticated");
            parts.extensions.insert(identity);
            Ok(next.run(Request::from_parts(parts, body)).await)
        }
        Err(failure) => {
            log_failure(&failure);
            auth.responder.respond(failure)
        }
    }
}
