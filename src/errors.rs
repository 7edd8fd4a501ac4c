// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use crate::token;

/// Failures of an attestation attempt, grouped by the stage that produced
/// them.
#[derive(thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("Entropy unavailable: {0}")]
    EntropyUnavailable(String),
    #[error("Evidence source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("Evidence collection failed: {0}")]
    CollectionFailed(String),
    #[error("No supported media type: {0}")]
    NoSupportedMediaType(String),
    #[error("Session creation failed: {0}")]
    SessionCreationFailed(String),
    #[error("Evidence submission failed: {0}")]
    EvidenceSubmissionFailed(String),
    #[error("Result timeout: {0}")]
    ResultTimeout(String),
    #[error("Result retrieval failed: {0}")]
    ResultRetrievalFailed(String),
    #[error("Exchange cancelled: {0}")]
    Cancelled(String),
    #[error("Malformed attestation result: {0}")]
    MalformedResult(String),
    #[error("Attestation result signature invalid: {0}")]
    SignatureInvalid(String),
    #[error("Verification key error: {0}")]
    Key(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Output write failed: {0}")]
    OutputWriteFailed(String),
    #[error("Evidence decode error: {0}")]
    Decode(#[from] token::Error),
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::EntropyUnavailable(e)
            | Error::SourceUnavailable(e)
            | Error::CollectionFailed(e)
            | Error::NoSupportedMediaType(e)
            | Error::SessionCreationFailed(e)
            | Error::EvidenceSubmissionFailed(e)
            | Error::ResultTimeout(e)
            | Error::ResultRetrievalFailed(e)
            | Error::Cancelled(e)
            | Error::MalformedResult(e)
            | Error::SignatureInvalid(e)
            | Error::Key(e)
            | Error::Config(e)
            | Error::OutputWriteFailed(e) => {
                write!(f, "{}", e)
            }
            Error::Decode(e) => write!(f, "{:?}", e),
        }
    }
}
