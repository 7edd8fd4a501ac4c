// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Local inspection of the evidence the platform produces, without talking
//! to a verification service.

use crate::errors::Error;
use crate::evidence::EvidenceProvider;
use crate::nonce::NonceGenerator;
use crate::token::Evidence;
use log::{debug, info};

/// Collect evidence for a fresh nonce and decode it.  Succeeds only if the
/// realm claims are bound to that nonce.
pub fn run(nonces: &NonceGenerator, provider: &dyn EvidenceProvider) -> Result<Evidence, Error> {
    let nonce = nonces.generate()?;

    let buf = provider.collect(&nonce)?;

    debug!("decoding {} bytes of evidence", buf.len());

    let evidence = Evidence::decode(&buf)?;

    evidence.check_challenge(nonce.as_bytes())?;

    info!(
        "evidence decoded, platform {} in lifecycle state {:#06x}",
        evidence.instance_id(),
        evidence.platform_claims.lifecycle
    );

    Ok(evidence)
}
