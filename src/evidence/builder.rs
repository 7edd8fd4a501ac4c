// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::provider::EvidenceProvider;
use crate::errors::Error;
use crate::nonce::Nonce;
use log::debug;
use std::sync::Arc;

/// Media type of a CCA attestation token wrapped in an EAT collection
pub const CCA_EVIDENCE_MEDIA_TYPE: &str =
    "application/eat-collection; profile=http://arm.com/CCA-SSD/1.0.0";

/// Evidence bytes tagged with the media type describing their encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidenceBlob {
    media_type: String,
    data: Vec<u8>,
}

impl EvidenceBlob {
    pub fn new(media_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            media_type: media_type.into(),
            data,
        }
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// A kind of evidence this build knows how to produce
pub trait EvidenceKind: Send + Sync {
    /// The media type of the produced evidence
    fn media_type(&self) -> &str;

    /// Produce evidence bound to `nonce`
    fn build(&self, nonce: &Nonce) -> Result<Vec<u8>, Error>;
}

/// Arm CCA evidence, as returned by the platform attestation interface
pub struct CcaEvidence {
    provider: Arc<dyn EvidenceProvider>,
}

impl CcaEvidence {
    pub fn new(provider: Arc<dyn EvidenceProvider>) -> Self {
        Self { provider }
    }
}

impl EvidenceKind for CcaEvidence {
    fn media_type(&self) -> &str {
        CCA_EVIDENCE_MEDIA_TYPE
    }

    fn build(&self, nonce: &Nonce) -> Result<Vec<u8>, Error> {
        self.provider.collect(nonce)
    }
}

/// Registry of evidence kinds, negotiated against the media types accepted
/// by the verification service.
#[derive(Default)]
pub struct EvidenceBuilder {
    kinds: Vec<Box<dyn EvidenceKind>>,
}

impl EvidenceBuilder {
    pub fn new() -> Self {
        Self { kinds: Vec::new() }
    }

    /// A builder that only knows about CCA evidence
    pub fn cca(provider: Arc<dyn EvidenceProvider>) -> Self {
        Self::new().register(CcaEvidence::new(provider))
    }

    pub fn register(mut self, kind: impl EvidenceKind + 'static) -> Self {
        self.kinds.push(Box::new(kind));
        self
    }

    pub fn supported_media_types(&self) -> Vec<&str> {
        self.kinds.iter().map(|k| k.media_type()).collect()
    }

    /// Select the kind matching the first entry of `accepted` for which one
    /// is registered.  The order of `accepted` is authoritative.
    pub fn select<'a>(
        &'a self,
        accepted: &'a [String],
    ) -> Option<(&'a str, &'a dyn EvidenceKind)> {
        accepted.iter().find_map(|mt| {
            self.kinds
                .iter()
                .find(|k| media_types_match(mt, k.media_type()))
                .map(|k| (mt.as_str(), k.as_ref()))
        })
    }

    /// Negotiate the media type and produce the evidence blob.  The returned
    /// blob is tagged with the media type string as spelled by the service.
    pub fn build(&self, nonce: &Nonce, accepted: &[String]) -> Result<EvidenceBlob, Error> {
        let (mt, kind) = self.select(accepted).ok_or_else(|| {
            Error::NoSupportedMediaType(format!(
                "service accepts {:?}, supported locally {:?}",
                accepted,
                self.supported_media_types()
            ))
        })?;

        debug!("negotiated evidence media type {mt:?}");

        let data = kind.build(nonce)?;

        Ok(EvidenceBlob::new(mt, data))
    }
}

// type/subtype and parameter names are case-insensitive, parameter values
// may or may not be quoted
fn media_types_match(a: &str, b: &str) -> bool {
    fn split(mt: &str) -> (String, Vec<(String, String)>) {
        let mut parts = mt.split(';');
        let essence = parts.next().unwrap_or("").trim().to_ascii_lowercase();

        let mut params: Vec<(String, String)> = parts
            .filter_map(|p| {
                let (k, v) = p.split_once('=')?;
                Some((
                    k.trim().to_ascii_lowercase(),
                    v.trim().trim_matches('"').to_string(),
                ))
            })
            .collect();
        params.sort();

        (essence, params)
    }

    split(a) == split(b)
}
