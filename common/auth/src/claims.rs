use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use common_http_errors::Failure;

use crate::error::AuthResult;

/// Decoded token body. Transient, one per verified token.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims(Map<String, Value>);

impl Claims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the standard identity body: `{data: {id, username, email}, exp}`.
    pub fn for_identity(
        id: impl Into<Number>,
        username: impl Into<String>,
        email: impl Into<String>,
        expires_at: i64,
    ) -> Self {
        let mut claims = Self::new();
        claims.insert(
            "data",
            serde_json::json!({
                "id": Value::Number(id.into()),
                "username": username.into(),
                "email": email.into(),
            }),
        );
        claims.insert("exp", expires_at);
        claims
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Expiration in seconds since the epoch, when present and integral.
    pub fn expires_at(&self) -> Option<i64> {
        self.0.get("exp").and_then(Value::as_i64)
    }

    /// Maps the nested `data` object onto an identity. The result is not yet
    /// authenticated; that is the authentication manager's call.
    pub fn identity(&self) -> AuthResult<AuthenticatedIdentity> {
        let data = self
            .0
            .get("data")
            .and_then(Value::as_object)
            .ok_or_else(|| Failure::malformed_token("token claims missing 'data' object"))?;

        let id = match data.get("id") {
            Some(Value::Number(id)) => id.clone(),
            _ => return Err(Failure::malformed_token("token claims missing numeric 'data.id'")),
        };
        let username = string_field(data, "username")?;
        let email = string_field(data, "email")?;

        Ok(AuthenticatedIdentity {
            id,
            username,
            email,
            authenticated: false,
        })
    }
}

impl From<Map<String, Value>> for Claims {
    fn from(value: Map<String, Value>) -> Self {
        Self(value)
    }
}

fn string_field(data: &Map<String, Value>, field: &'static str) -> AuthResult<String> {
    data.get(field)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| Failure::malformed_token(format!("token claims missing string 'data.{field}'")))
}

/// The request principal once a token has been verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedIdentity {
    pub id: Number,
    pub username: String,
    pub email: String,
    pub authenticated: bool,
}
