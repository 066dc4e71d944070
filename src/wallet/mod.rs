use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use log::{debug, info};
use rand::rngs::OsRng;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey, ecdsa::Signature};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::transaction::Transaction;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("no keys loaded or created")]
    NoKeys,
    #[error("malformed private key: {0}")]
    MalformedKey(&'static str),
    #[error("key file {path} is malformed")]
    MalformedFile { path: PathBuf },
    #[error("key file I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// The node's keypair. The base64 public key is its account identity.
#[derive(Debug, Clone)]
pub struct Wallet {
    path: PathBuf,
    public_key: String,
    private_key: String,
}

impl Wallet {
    /// An empty wallet whose keys live in `path` once saved.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            public_key: String::new(),
            private_key: String::new(),
        }
    }

    pub fn public_key(&self) -> Option<&str> {
        (!self.public_key.is_empty()).then_some(self.public_key.as_str())
    }

    pub fn private_key(&self) -> Option<&str> {
        (!self.private_key.is_empty()).then_some(self.private_key.as_str())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Generate a fresh keypair, replacing whatever was held before.
    pub fn create_keys(&mut self) {
        let secp = Secp256k1::new();
        let (sk, pk) = secp.generate_keypair(&mut OsRng);
        self.private_key = STANDARD.encode(sk.secret_bytes());
        self.public_key = STANDARD.encode(pk.serialize());
        info!("WALLET - created new keypair");
    }

    /// Write `public\nprivate` to the key file.
    pub fn save_keys(&self) -> Result<(), WalletError> {
        let (Some(public), Some(private)) = (self.public_key(), self.private_key()) else {
            return Err(WalletError::NoKeys);
        };
        fs::write(&self.path, format!("{public}\n{private}"))?;
        debug!("WALLET - keys saved to {}", self.path.display());
        Ok(())
    }

    /// Read keys from the key file.
    ///
    /// Returns `Ok(false)` and leaves the wallet untouched when no key file
    /// exists yet; that is the "no wallet configured" state, not an error.
    pub fn load_keys(&mut self) -> Result<bool, WalletError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        let mut lines = contents.lines().map(str::trim);
        let (Some(public), Some(private)) = (lines.next(), lines.next()) else {
            return Err(WalletError::MalformedFile {
                path: self.path.clone(),
            });
        };
        if public.is_empty() || private.is_empty() {
            return Err(WalletError::MalformedFile {
                path: self.path.clone(),
            });
        }

        self.public_key = public.to_string();
        self.private_key = private.to_string();
        info!("WALLET - keys loaded from {}", self.path.display());
        Ok(true)
    }

    /// Sign a transfer with this wallet's private key and return the base64
    /// DER signature.
    pub fn sign_transaction(
        &self,
        sender: &str,
        recipient: &str,
        amount: f64,
    ) -> Result<String, WalletError> {
        let encoded = self.private_key().ok_or(WalletError::NoKeys)?;
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|_| WalletError::MalformedKey("invalid base64"))?;
        let sk = SecretKey::from_slice(&bytes)
            .map_err(|_| WalletError::MalformedKey("invalid secret key bytes"))?;

        let secp = Secp256k1::signing_only();
        let msg = signing_message(sender, recipient, amount);
        let sig = secp.sign_ecdsa(&msg, &sk);
        Ok(STANDARD.encode(&*sig.serialize_der()))
    }
}

fn signing_message(sender: &str, recipient: &str, amount: f64) -> Message {
    let payload = Transaction::signing_payload(sender, recipient, amount);
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&hasher.finalize());
    Message::from_digest(digest)
}

/// Check `tx.signature` against the public key in `tx.sender`.
///
/// Malformed keys or signatures are reported as an invalid signature.
pub fn verify_transaction(tx: &Transaction) -> bool {
    verify_signature(tx).is_ok()
}

fn verify_signature(tx: &Transaction) -> Result<(), &'static str> {
    let pk_bytes = STANDARD
        .decode(&tx.sender)
        .map_err(|_| "invalid sender base64")?;
    let pk = PublicKey::from_slice(&pk_bytes).map_err(|_| "invalid public key bytes")?;

    let sig_bytes = STANDARD
        .decode(&tx.signature)
        .map_err(|_| "invalid signature base64")?;
    let sig = Signature::from_der(&sig_bytes).map_err(|_| "invalid DER signature")?;

    let msg = signing_message(&tx.sender, &tx.recipient, tx.amount);
    Secp256k1::verification_only()
        .verify_ecdsa(&msg, &sig, &pk)
        .map_err(|_| "signature mismatch")
}
