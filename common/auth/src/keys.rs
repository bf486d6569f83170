use std::fs;
use std::path::Path;

use common_http_errors::Failure;
use jsonwebtoken::{DecodingKey, EncodingKey};
use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use tracing::debug;

use crate::error::AuthResult;

/// Reads a PEM file holding exactly one block and returns its DER bytes.
pub fn load_pem_der(path: &Path) -> AuthResult<Vec<u8>> {
    let raw = fs::read(path).map_err(|err| {
        Failure::internal(format!("failed to read key file {}: {err}", path.display()))
    })?;
    let mut blocks = pem::parse_many(&raw).map_err(|err| {
        Failure::internal(format!("malformed PEM in {}: {err}", path.display()))
    })?;
    let block = match blocks.len() {
        0 => {
            return Err(Failure::internal(format!(
                "no PEM block in {}",
                path.display()
            )))
        }
        1 => blocks.remove(0),
        count => {
            return Err(Failure::internal(format!(
                "expected one PEM block in {}, found {count}",
                path.display()
            )))
        }
    };
    debug!(path = %path.display(), tag = block.tag(), "loaded PEM block");
    Ok(block.into_contents())
}

/// Loads an X.509 SubjectPublicKeyInfo RSA public key.
pub fn load_public_key(path: &Path) -> AuthResult<DecodingKey> {
    let der = load_pem_der(path)?;
    let public = RsaPublicKey::from_public_key_der(&der).map_err(|err| {
        Failure::internal(format!("invalid public key in {}: {err}", path.display()))
    })?;
    let pkcs1 = public.to_pkcs1_der().map_err(|err| {
        Failure::internal(format!("failed to encode public key {}: {err}", path.display()))
    })?;
    Ok(DecodingKey::from_rsa_der(pkcs1.as_bytes()))
}

/// Loads a PKCS#8 RSA private key.
pub fn load_private_key(path: &Path) -> AuthResult<EncodingKey> {
    let der = load_pem_der(path)?;
    let private = RsaPrivateKey::from_pkcs8_der(&der).map_err(|err| {
        Failure::internal(format!("invalid private key in {}: {err}", path.display()))
    })?;
    let pkcs1 = private.to_pkcs1_der().map_err(|err| {
        Failure::internal(format!("failed to encode private key {}: {err}", path.display()))
    })?;
    Ok(EncodingKey::from_rsa_der(pkcs1.as_bytes()))
}

/// Process-lifetime RSA key material. Built once at initialization.
#[derive(Clone)]
pub struct KeyPair {
    public: DecodingKey,
    private: Option<EncodingKey>,
}

impl KeyPair {
    pub fn load(public_key_path: &Path, private_key_path: Option<&Path>) -> AuthResult<Self> {
        let public = load_public_key(public_key_path)?;
        let private = match private_key_path {
            Some(path) => Some(load_private_key(path)?),
            None => {
                debug!("no private key configured, token signing is disabled");
                None
            }
        };
        Ok(Self { public, private })
    }

    pub fn public_key(&self) -> &DecodingKey {
        &self.public
    }

    pub fn private_key(&self) -> Option<&EncodingKey> {
        self.private.as_ref()
    }

    pub fn can_sign(&self) -> bool {
        self.private.is_some()
    }
}
