// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Evidence acquisition and media type negotiation.
//!
//! An [`EvidenceProvider`] talks to the attestation interface of the host
//! (see [`TsmProvider`]).  The [`EvidenceBuilder`] holds the registered
//! [`EvidenceKind`]s and picks the first one matching the media types
//! accepted by the verification service.

pub use self::builder::{
    CcaEvidence, EvidenceBlob, EvidenceBuilder, EvidenceKind, CCA_EVIDENCE_MEDIA_TYPE,
};
pub use self::provider::{EvidenceProvider, TsmProvider, TSM_REPORT_ROOT};

mod builder;
mod provider;
