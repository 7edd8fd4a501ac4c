// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Configuration of the attestation exchange.
//!
//! Every key is optional; the defaults reproduce a local Veraison deployment
//! reachable at `veraison.example`.  Example:
//!
//! ```json
//! {
//!     "new-session-uri": "https://veraison.example:8443/challenge-response/v1/newSession",
//!     "timeout-ms": 30000,
//!     "max-poll-attempts": 10,
//!     "verification-key": {
//!         "alg": "ES256",
//!         "pem": "-----BEGIN PUBLIC KEY-----\n...\n-----END PUBLIC KEY-----\n"
//!     }
//! }
//! ```

use crate::errors::Error;
use crate::verifier::VerificationKey;
use jsonwebtoken::Algorithm;
use serde::Deserialize;
use serde_json::{json, Value};
use serde_with::{serde_as, DurationMilliSeconds};
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

pub const DEFAULT_NEW_SESSION_URI: &str =
    "http://veraison.example:8080/challenge-response/v1/newSession";

/// Top-level configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    /// Ask the service to drop the session once the exchange is over
    pub delete_session: bool,

    #[serde(flatten)]
    pub session: SessionConfig,

    pub verification_key: KeyConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            delete_session: true,
            session: Default::default(),
            verification_key: Default::default(),
        }
    }
}

impl Config {
    pub fn from_json(j: &str) -> Result<Self, Error> {
        let cfg: Config = serde_json::from_str(j).map_err(|e| Error::Config(e.to_string()))?;

        cfg.session.validate()?;

        Ok(cfg)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let j = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("reading {}: {e}", path.display())))?;

        Self::from_json(&j)
    }
}

/// Endpoint, retry and polling bounds of the challenge-response session
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SessionConfig {
    pub new_session_uri: String,

    /// Overall deadline of one exchange, starting at session creation
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "timeout-ms")]
    pub timeout: Duration,

    /// Deadline of a single HTTP request
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "request-timeout-ms")]
    pub request_timeout: Duration,

    /// Transport-level retries of session creation and evidence submission
    pub max_retries: u32,

    /// Delay before the first retry; doubled at every further retry
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "retry-delay-ms")]
    pub retry_delay: Duration,

    pub max_poll_attempts: u32,

    /// Delay between the first and the second poll
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "poll-interval-ms")]
    pub poll_interval: Duration,

    /// Growth factor of the delay between polls
    pub poll_backoff: u32,

    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "max-poll-interval-ms")]
    pub max_poll_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            new_session_uri: DEFAULT_NEW_SESSION_URI.to_string(),
            timeout: Duration::from_secs(60),
            request_timeout: Duration::from_secs(10),
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
            max_poll_attempts: 30,
            poll_interval: Duration::from_secs(1),
            poll_backoff: 2,
            max_poll_interval: Duration::from_secs(8),
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.timeout.is_zero() {
            return Err(Error::Config("timeout-ms must be positive".to_string()));
        }

        if Instant::now().checked_add(self.timeout).is_none() {
            return Err(Error::Config(format!(
                "timeout-ms {} out of range",
                self.timeout.as_millis()
            )));
        }

        if self.max_poll_attempts == 0 {
            return Err(Error::Config(
                "max-poll-attempts must be at least 1".to_string(),
            ));
        }

        if self.poll_backoff == 0 {
            return Err(Error::Config("poll-backoff must be at least 1".to_string()));
        }

        Ok(())
    }
}

/// Key used to check the signature of attestation results.  Exactly one of
/// `jwk` and `pem` must be set.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct KeyConfig {
    pub alg: Algorithm,
    #[serde(default)]
    pub jwk: Option<Value>,
    #[serde(default)]
    pub pem: Option<String>,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            alg: Algorithm::ES256,
            jwk: Some(json!({
                "alg": "ES256",
                "crv": "P-256",
                "kty": "EC",
                "x": "usWxHK2PmfnHKwXPS54m0kTcGJ90UiglWiGahtagnv8",
                "y": "IBOL-C3BttVivg-lSreASjpkttcsz-1rb7btKLv8EX4"
            })),
            pem: None,
        }
    }
}

impl KeyConfig {
    pub fn to_key(&self) -> Result<VerificationKey, Error> {
        match (&self.jwk, &self.pem) {
            (Some(j), None) => {
                let jwk = serde_json::from_value(j.clone())
                    .map_err(|e| Error::Config(format!("verification-key.jwk: {e}")))?;
                VerificationKey::from_jwk(self.alg, &jwk)
            }
            (None, Some(p)) => VerificationKey::from_pem(self.alg, p.as_bytes()),
            _ => Err(Error::Config(
                "verification-key needs exactly one of jwk or pem".to_string(),
            )),
        }
    }
}
