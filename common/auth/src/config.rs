use std::path::PathBuf;
use std::str::FromStr;

use common_http_errors::Failure;

/// How tokens are signed and verified. Chosen once when the config is loaded.
#[derive(Clone)]
pub enum VerificationMode {
    /// Shared HMAC secret.
    Secret(Vec<u8>),
    /// RSA key pair read from PEM files; without a private key only
    /// verification is possible.
    RsaKeyPair {
        public_key_path: PathBuf,
        private_key_path: Option<PathBuf>,
    },
}

impl VerificationMode {
    pub fn secret(secret: impl Into<Vec<u8>>) -> Self {
        Self::Secret(secret.into())
    }

    pub fn rsa_key_pair(
        public_key_path: impl Into<PathBuf>,
        private_key_path: Option<PathBuf>,
    ) -> Self {
        Self::RsaKeyPair {
            public_key_path: public_key_path.into(),
            private_key_path,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            VerificationMode::Secret(_) => "secret",
            VerificationMode::RsaKeyPair { .. } => "rsa_key",
        }
    }
}

// Secrets must never reach the logs.
impl std::fmt::Debug for VerificationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerificationMode::Secret(_) => f.write_str("Secret(<redacted>)"),
            VerificationMode::RsaKeyPair {
                public_key_path,
                private_key_path,
            } => f
                .debug_struct("RsaKeyPair")
                .field("public_key_path", public_key_path)
                .field("private_key_path", private_key_path)
                .finish(),
        }
    }
}

/// Names accepted for the verification method setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationMethod {
    Secret,
    RsaKey,
}

impl FromStr for VerificationMethod {
    type Err = Failure;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "secret" => Ok(VerificationMethod::Secret),
            "rsa" | "rsa_key" | "rsa-key" => Ok(VerificationMethod::RsaKey),
            other => Err(Failure::invalid_verification_method(format!(
                "No such method: {other}"
            ))),
        }
    }
}

/// Runtime configuration for token signing and verification.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub mode: VerificationMode,
    /// Allowable clock skew in seconds when validating exp.
    pub allowed_clock_skew_seconds: u64,
}

impl TokenConfig {
    pub fn new(mode: VerificationMode) -> Self {
        Self {
            mode,
            allowed_clock_skew_seconds: 0,
        }
    }

    pub fn with_clock_skew(mut self, seconds: u64) -> Self {
        self.allowed_clock_skew_seconds = seconds;
        self
    }
}
