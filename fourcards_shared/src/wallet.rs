//! Local wallet credential.
//!
//! An Ed25519 key stored as an OKP JWK (RFC 8037). The wallet address is
//! base64url(SHA-256(public key)), the same derivation the network uses for
//! Ed25519 owners.

use anyhow::{ensure, Context};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Serialized form of a [`Wallet`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    pub crv: String,
    /// Public key.
    pub x: String,
    /// Secret seed.
    pub d: String,
}

/// Signing credential for submitted messages.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "Jwk", into = "Jwk")]
pub struct Wallet {
    key: SigningKey,
}

impl Wallet {
    pub fn generate() -> Self {
        Self {
            key: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(&seed),
        }
    }

    /// Raw public key, used as the data item owner.
    pub fn owner(&self) -> [u8; 32] {
        self.key.verifying_key().to_bytes()
    }

    pub fn address(&self) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(self.owner()))
    }

    pub fn sign(&self, msg: &[u8]) -> [u8; 64] {
        self.key.sign(msg).to_bytes()
    }

    pub fn to_jwk(&self) -> Jwk {
        Jwk {
            kty: "OKP".to_string(),
            crv: "Ed25519".to_string(),
            x: URL_SAFE_NO_PAD.encode(self.owner()),
            d: URL_SAFE_NO_PAD.encode(self.key.to_bytes()),
        }
    }

    pub fn from_jwk(jwk: &Jwk) -> anyhow::Result<Self> {
        ensure!(
            jwk.kty == "OKP" && jwk.crv == "Ed25519",
            "unsupported key type {}/{}",
            jwk.kty,
            jwk.crv
        );
        let seed = URL_SAFE_NO_PAD.decode(&jwk.d).context("decode jwk d")?;
        let seed: [u8; 32] = seed
            .as_slice()
            .try_into()
            .context("jwk d must be 32 bytes")?;
        let wallet = Self::from_seed(seed);
        ensure!(
            wallet.to_jwk().x == jwk.x,
            "jwk public key does not match its secret"
        );
        Ok(wallet)
    }
}

impl TryFrom<Jwk> for Wallet {
    type Error = anyhow::Error;

    fn try_from(jwk: Jwk) -> Result<Self, Self::Error> {
        Self::from_jwk(&jwk)
    }
}

impl From<Wallet> for Jwk {
    fn from(wallet: Wallet) -> Self {
        wallet.to_jwk()
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_is_43_char_base64url() {
        let w = Wallet::generate();
        let addr = w.address();
        assert_eq!(addr.len(), 43);
        assert!(addr
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn jwk_roundtrip_keeps_address() {
        let w = Wallet::from_seed([9u8; 32]);
        let json = serde_json::to_string(&w).unwrap();
        assert!(json.contains("\"crv\":\"Ed25519\""));
        let back: Wallet = serde_json::from_str(&json).unwrap();
        assert_eq!(back.address(), w.address());
    }

    #[test]
    fn mismatched_jwk_is_rejected() {
        let mut jwk = Wallet::from_seed([1u8; 32]).to_jwk();
        jwk.x = Wallet::from_seed([2u8; 32]).to_jwk().x;
        assert!(Wallet::from_jwk(&jwk).is_err());
    }

    #[test]
    fn debug_hides_secret() {
        let w = Wallet::from_seed([3u8; 32]);
        let shown = format!("{w:?}");
        assert!(!shown.contains(&w.to_jwk().d));
    }
}
