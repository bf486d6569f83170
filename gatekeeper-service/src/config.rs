use anyhow::{anyhow, Context, Result};
use std::env;
use std::net::{IpAddr, SocketAddr};

use common_auth::{TokenConfig, VerificationMethod, VerificationMode};
use common_cors::CorsPolicy;

const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub struct GatekeeperConfig {
    pub token: TokenConfig,
    /// `None` leaves the CORS gate unconfigured.
    pub cors: Option<CorsPolicy>,
    pub errors_as_json: bool,
    pub host: String,
    pub port: u16,
}

impl GatekeeperConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = load_token_config(&lookup)?;
        let cors = load_cors_policy(&lookup);
        let errors_as_json = lookup("AUTH_ERRORS_AS_JSON")
            .map(|value| parse_bool(&value))
            .unwrap_or(true);
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = lookup("PORT")
            .map(|value| value.trim().parse::<u16>())
            .transpose()
            .context("Failed to parse PORT")?
            .unwrap_or(DEFAULT_PORT);

        Ok(Self {
            token,
            cors,
            errors_as_json,
            host,
            port,
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .host
            .parse()
            .with_context(|| format!("HOST is not an IP address: {}", self.host))?;
        Ok(SocketAddr::from((ip, self.port)))
    }
}

fn load_token_config<F>(lookup: &F) -> Result<TokenConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let method = lookup("JWT_VERIFICATION_METHOD")
        .unwrap_or_else(|| "secret".to_string())
        .parse::<VerificationMethod>()
        .context("Failed to parse JWT_VERIFICATION_METHOD")?;

    let mode = match method {
        VerificationMethod::Secret => {
            let secret = lookup("JWT_SECRET")
                .ok_or_else(|| anyhow!("JWT_SECRET must be set for secret verification"))?;
            VerificationMode::secret(secret)
        }
        VerificationMethod::RsaKey => {
            let public_key_path = lookup("JWT_PUBLIC_KEY_PATH")
                .and_then(|value| normalize_optional(&value))
                .ok_or_else(|| anyhow!("JWT_PUBLIC_KEY_PATH must be set for rsa_key verification"))?;
            let private_key_path = lookup("JWT_PRIVATE_KEY_PATH")
                .and_then(|value| normalize_optional(&value))
                .map(Into::into);
            VerificationMode::rsa_key_pair(public_key_path, private_key_path)
        }
    };

    let skew = lookup("JWT_ALLOWED_CLOCK_SKEW_SECONDS")
        .map(|value| value.trim().parse::<u64>())
        .transpose()
        .context("Failed to parse JWT_ALLOWED_CLOCK_SKEW_SECONDS")?
        .unwrap_or(0);

    Ok(TokenConfig::new(mode).with_clock_skew(skew))
}

fn load_cors_policy<F>(lookup: &F) -> Option<CorsPolicy>
where
    F: Fn(&str) -> Option<String>,
{
    let origins = lookup("CORS_ALLOWED_ORIGINS")
        .map(|value| parse_list(&value))
        .unwrap_or_default();
    let root_domains = lookup("CORS_ROOT_DOMAINS")
        .map(|value| parse_list(&value))
        .unwrap_or_default();
    if origins.is_empty() && root_domains.is_empty() {
        return None;
    }

    let mut policy = CorsPolicy::new()
        .with_origins(origins)
        .with_root_domains(root_domains);
    if let Some(methods) = lookup("CORS_ALLOWED_METHODS") {
        policy = policy.with_methods(parse_list(&methods));
    }
    if let Some(headers) = lookup("CORS_ALLOWED_HEADERS") {
        policy = policy.with_headers(parse_list(&headers));
    }
    Some(policy)
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(|c| c == ',' || c == ';' || c == ' ')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
