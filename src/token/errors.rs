// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

/// Reasons a CCA evidence collection fails to decode
#[derive(thiserror::Error, PartialEq, Eq)]
pub enum Error {
    /// Not CBOR, or not the expected CBOR structure
    #[error("Malformed evidence: {0}")]
    Syntax(String),
    /// Well-formed, but a value is out of range or does not match
    #[error("Invalid claim value: {0}")]
    Sema(String),
    #[error("Missing claim: {0}")]
    MissingClaim(String),
    #[error("Duplicated claim: {0}")]
    DuplicatedClaim(String),
    #[error("Unexpected claim type: {0}")]
    TypeMismatch(String),
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            Error::Syntax(e) | Error::Sema(e) | Error::TypeMismatch(e) => e,
            Error::MissingClaim(c) | Error::DuplicatedClaim(c) => c,
        };

        write!(f, "{msg}")
    }
}
