// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use crate::errors::Error;
use jsonwebtoken::jwk::Jwk;
use jsonwebtoken::{Algorithm, DecodingKey};

/// Public key material and the one signature algorithm it is accepted with
#[derive(Clone)]
pub struct VerificationKey {
    alg: Algorithm,
    key: DecodingKey,
}

impl std::fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationKey")
            .field("alg", &self.alg)
            .finish_non_exhaustive()
    }
}

impl VerificationKey {
    /// Build a key from a JWK.  If the JWK carries an `alg` parameter, it
    /// must agree with `alg`.
    pub fn from_jwk(alg: Algorithm, jwk: &Jwk) -> Result<Self, Error> {
        check_asymmetric(alg)?;

        if let Some(ka) = jwk.common.key_algorithm {
            if format!("{ka:?}") != format!("{alg:?}") {
                return Err(Error::Key(format!(
                    "JWK is for {ka:?}, configured algorithm is {alg:?}"
                )));
            }
        }

        let key = DecodingKey::from_jwk(jwk).map_err(|e| Error::Key(e.to_string()))?;

        Ok(Self { alg, key })
    }

    /// Same as [`VerificationKey::from_jwk`], starting from the JSON
    /// serialisation of the JWK
    pub fn from_jwk_json(alg: Algorithm, j: &str) -> Result<Self, Error> {
        let jwk: Jwk = serde_json::from_str(j).map_err(|e| Error::Key(e.to_string()))?;

        Self::from_jwk(alg, &jwk)
    }

    /// Build a key from a PEM encoded public key
    pub fn from_pem(alg: Algorithm, pem: &[u8]) -> Result<Self, Error> {
        check_asymmetric(alg)?;

        let key = match alg {
            Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(pem),
            Algorithm::EdDSA => DecodingKey::from_ed_pem(pem),
            _ => DecodingKey::from_rsa_pem(pem),
        }
        .map_err(|e| Error::Key(e.to_string()))?;

        Ok(Self { alg, key })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.alg
    }

    pub(super) fn decoding_key(&self) -> &DecodingKey {
        &self.key
    }
}

// a shared secret is not a verification key
fn check_asymmetric(alg: Algorithm) -> Result<(), Error> {
    match alg {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Err(Error::Key(format!(
            "symmetric algorithm {alg:?} not allowed"
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_JWK_ES256: &str = r#"{
        "alg": "ES256",
        "crv": "P-256",
        "kty": "EC",
        "x": "usWxHK2PmfnHKwXPS54m0kTcGJ90UiglWiGahtagnv8",
        "y": "IBOL-C3BttVivg-lSreASjpkttcsz-1rb7btKLv8EX4"
    }"#;

    #[test]
    fn jwk_ok() {
        let k = VerificationKey::from_jwk_json(Algorithm::ES256, TEST_JWK_ES256).unwrap();

        assert_eq!(k.algorithm(), Algorithm::ES256);
    }

    #[test]
    fn jwk_alg_disagrees() {
        let r = VerificationKey::from_jwk_json(Algorithm::ES384, TEST_JWK_ES256);

        assert!(matches!(r, Err(Error::Key(_))));
    }

    #[test]
    fn symmetric_rejected() {
        let r = VerificationKey::from_pem(Algorithm::HS256, b"secret");

        assert!(matches!(r, Err(Error::Key(_))));
    }

    #[test]
    fn bad_pem() {
        let r = VerificationKey::from_pem(Algorithm::ES256, b"-----BEGIN NOTHING-----");

        assert!(matches!(r, Err(Error::Key(_))));
    }
}
