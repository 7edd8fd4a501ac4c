// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! The token module decodes a CBOR encoded CCA evidence collection into an
//! [`Evidence`] object, so that an attester can inspect what it is about to
//! send.  COSE signatures are not checked: the decoded claims describe the
//! evidence, they do not vouch for it.
//!
//! # Example
//!
//! ```no_run
//! use ccapassport::token::Evidence;
//!
//! # fn inspect(buf: &[u8], nonce: &[u8]) -> Result<(), ccapassport::token::Error> {
//! let e = Evidence::decode(buf)?;
//!
//! // the realm claims must be bound to the challenge we sent
//! e.check_challenge(nonce)?;
//!
//! println!("instance ID: {}", e.instance_id());
//! # Ok(())
//! # }
//! ```

pub use self::common::*;
pub use self::errors::Error;
pub use self::evidence::Evidence;
pub use self::platform::{InstanceId, Platform, PLATFORM_PROFILE};
pub use self::realm::Realm;

mod common;
mod errors;
mod evidence;
#[cfg(test)]
pub(crate) mod fixtures;
mod platform;
mod realm;
