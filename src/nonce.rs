// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Challenge generation.
//!
//! A [`Nonce`] is drawn fresh for every attestation attempt and binds the
//! collected evidence to the verification session.  The randomness comes from
//! an [`EntropySource`], which defaults to the OpenSSL CSPRNG.

use crate::errors::Error;
use base64::{engine::general_purpose, Engine as _};

/// Size in bytes of every challenge
pub const NONCE_SIZE: usize = 64;

/// A single-use challenge
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Nonce([u8; NONCE_SIZE]);

impl Nonce {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Encoding used in the `nonce` query parameter of the new-session
    /// request
    pub fn to_query_param(&self) -> String {
        general_purpose::URL_SAFE.encode(self.0)
    }

    /// Compare against a base64 string echoed back by the verification
    /// service.  Both the standard and URL-safe alphabets are accepted.
    pub fn matches_encoded(&self, v: &str) -> bool {
        [
            &general_purpose::STANDARD,
            &general_purpose::URL_SAFE,
            &general_purpose::URL_SAFE_NO_PAD,
            &general_purpose::STANDARD_NO_PAD,
        ]
        .iter()
        .filter_map(|e| e.decode(v).ok())
        .any(|b| b == self.0)
    }
}

impl From<[u8; NONCE_SIZE]> for Nonce {
    fn from(v: [u8; NONCE_SIZE]) -> Self {
        Self(v)
    }
}

impl std::fmt::Debug for Nonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Nonce({})", hex::encode(self.0))
    }
}

/// A source of cryptographically secure random bytes
pub trait EntropySource {
    /// Fill `buf` entirely, or fail.  Partial fills are not allowed.
    fn fill(&self, buf: &mut [u8]) -> Result<(), Error>;
}

/// The OpenSSL CSPRNG
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&self, buf: &mut [u8]) -> Result<(), Error> {
        openssl::rand::rand_bytes(buf).map_err(|e| Error::EntropyUnavailable(e.to_string()))
    }
}

pub struct NonceGenerator {
    source: Box<dyn EntropySource>,
}

impl Default for NonceGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl NonceGenerator {
    /// Return a generator backed by the OpenSSL CSPRNG
    pub fn new() -> Self {
        Self::with_source(OsEntropy)
    }

    pub fn with_source(source: impl EntropySource + 'static) -> Self {
        Self {
            source: Box::new(source),
        }
    }

    /// Draw a fresh challenge.  There is no fallback when the source fails.
    pub fn generate(&self) -> Result<Nonce, Error> {
        let mut buf = [0u8; NONCE_SIZE];

        self.source.fill(&mut buf)?;

        Ok(Nonce(buf))
    }
}
