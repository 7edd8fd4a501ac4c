// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Arm CCA attestation passports from a Veraison verification service.
//!
//! This crate runs the attester side of the Veraison challenge-response
//! protocol: it collects CCA evidence bound to a fresh nonce, submits it to
//! the verification service and checks the signature of the EAR attestation
//! result that comes back.  For the EAR format, see the IETF draft
//! [EAR].
//!
//! The API allows:
//! * Generating nonces and collecting evidence through configfs-tsm
//! * Negotiating the evidence media type with the service
//! * Driving a challenge-response session to completion
//! * Verifying the signed result and exposing its claims
//! * Decoding the evidence locally, to check what the platform produces
//!
//! [EAR]: https://datatracker.ietf.org/doc/draft-fv-rats-ear/

pub mod config;
pub mod evidence;
pub mod nonce;
pub mod passport;
pub mod selfcheck;
pub mod session;
pub mod token;
pub mod verifier;

mod errors;

pub use errors::Error;
