// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Verification of the signed attestation result (EAR) returned by the
//! verification service.
//!
//! The result is a JWS in compact serialisation.  [`Verifier::verify`] checks
//! its structure, insists on the configured algorithm, checks the signature
//! with the configured [`VerificationKey`] and only then decodes the payload
//! into [`Claims`].

pub use self::claims::{Claims, EAR_PROFILE, EAR_PROFILE_CLAIM};
pub use self::key::VerificationKey;

mod claims;
mod key;

use crate::errors::Error;
use base64::{engine::general_purpose, Engine as _};
use jsonwebtoken::errors::ErrorKind;
use ear::Ear;
use log::debug;
use serde_json::Value;

/// The raw, untrusted attestation result as returned by the service
#[derive(Clone, PartialEq, Eq)]
pub struct SignedResult(Vec<u8>);

impl SignedResult {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for SignedResult {
    fn from(v: Vec<u8>) -> Self {
        Self(v)
    }
}

impl From<&str> for SignedResult {
    fn from(v: &str) -> Self {
        Self(v.as_bytes().to_vec())
    }
}

impl std::fmt::Debug for SignedResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SignedResult({})", String::from_utf8_lossy(&self.0))
    }
}

/// Checks signed attestation results against one key and algorithm
#[derive(Debug, Clone)]
pub struct Verifier {
    key: VerificationKey,
}

impl Verifier {
    pub fn new(key: VerificationKey) -> Self {
        Self { key }
    }

    /// Verify the signed result and decode its payload.  No claims are
    /// returned unless the signature checks out.
    pub fn verify(&self, sr: &SignedResult) -> Result<Claims, Error> {
        let token = std::str::from_utf8(sr.as_bytes())
            .map_err(|e| Error::MalformedResult(format!("not UTF-8: {e}")))?
            .trim();

        let segments: Vec<&str> = token.split('.').collect();

        let (h, p, s) = match segments.as_slice() {
            [h, p, s] => (*h, *p, *s),
            _ => {
                return Err(Error::MalformedResult(format!(
                    "expecting 3 segments, got {}",
                    segments.len()
                )))
            }
        };

        let header: Value = serde_json::from_slice(&decode_segment(h, "header")?)
            .map_err(|e| Error::MalformedResult(format!("header: {e}")))?;
        let payload = decode_segment(p, "payload")?;
        decode_segment(s, "signature")?;

        let header_alg = header
            .get("alg")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::MalformedResult("header: no alg".to_string()))?;

        let alg = self.key.algorithm();

        // compared by name, so that "none" and unknown algorithms are
        // mismatches too
        if header_alg != format!("{alg:?}") {
            return Err(Error::SignatureInvalid(format!(
                "expecting algorithm {alg:?}, got {header_alg:?}"
            )));
        }

        let message = &token[..h.len() + 1 + p.len()];

        let ok = jsonwebtoken::crypto::verify(s, message.as_bytes(), self.key.decoding_key(), alg)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => Error::SignatureInvalid(e.to_string()),
                ErrorKind::Base64(_) => Error::MalformedResult(e.to_string()),
                _ => Error::Key(e.to_string()),
            })?;

        if !ok {
            return Err(Error::SignatureInvalid(
                "signature does not match header and payload".to_string(),
            ));
        }

        debug!("attestation result signature verified ({alg:?})");

        // the EAR deserializer validates profile, iat, verifier-id and
        // submods
        let ear: Ear = serde_json::from_slice(&payload)
            .map_err(|e| Error::MalformedResult(format!("payload is not an EAR: {e}")))?;

        debug!("EAR profile {}, {} submods", ear.profile, ear.submods.len());

        match serde_json::from_slice(&payload) {
            Ok(Value::Object(m)) => Ok(Claims::from_verified(m)),
            _ => Err(Error::MalformedResult(
                "payload is not a JSON object".to_string(),
            )),
        }
    }
}

fn decode_segment(s: &str, what: &str) -> Result<Vec<u8>, Error> {
    general_purpose::URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|e| Error::MalformedResult(format!("{what}: {e}")))
}
