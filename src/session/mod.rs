// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Client side of the Veraison challenge-response protocol.
//!
//! The exchange is a state machine: `Idle → Created → EvidenceSubmitted →
//! ResultReady → Closed`, with `Failed` reachable from every non-terminal
//! state.  Each step consumes the handle of the previous one and returns the
//! handle of the next, so steps cannot be taken out of order.
//!
//! # Example
//!
//! ```no_run
//! use ccapassport::config::SessionConfig;
//! use ccapassport::evidence::EvidenceBlob;
//! use ccapassport::nonce::NonceGenerator;
//! use ccapassport::session::{CancelToken, Client};
//!
//! # fn main() -> Result<(), ccapassport::Error> {
//! let client = Client::new(SessionConfig::default())?;
//! let nonce = NonceGenerator::new().generate()?;
//!
//! let created = client.create_session(&nonce)?;
//! let blob = EvidenceBlob::new(created.accept()[0].as_str(), vec![]);
//!
//! let submitted = created.submit_evidence(&blob).map_err(|f| f.close(true))?;
//! let ready = submitted
//!     .await_result(&CancelToken::new())
//!     .map_err(|f| f.close(true))?;
//!
//! let signed_result = ready.close(true);
//! # Ok(())
//! # }
//! ```
//!
//! Polling before the evidence has been submitted does not compile:
//!
//! ```compile_fail
//! use ccapassport::config::SessionConfig;
//! use ccapassport::nonce::NonceGenerator;
//! use ccapassport::session::{CancelToken, Client};
//!
//! # fn main() -> Result<(), ccapassport::Error> {
//! let client = Client::new(SessionConfig::default())?;
//! let nonce = NonceGenerator::new().generate()?;
//!
//! let created = client.create_session(&nonce)?;
//! let ready = created.await_result(&CancelToken::new());
//! # Ok(())
//! # }
//! ```
//!
//! Neither does reusing a session after it moved on:
//!
//! ```compile_fail
//! use ccapassport::config::SessionConfig;
//! use ccapassport::evidence::EvidenceBlob;
//! use ccapassport::nonce::NonceGenerator;
//! use ccapassport::session::Client;
//!
//! # fn main() -> Result<(), ccapassport::Error> {
//! let client = Client::new(SessionConfig::default())?;
//! let nonce = NonceGenerator::new().generate()?;
//! let blob = EvidenceBlob::new("application/cbor", vec![]);
//!
//! let created = client.create_session(&nonce)?;
//! let _first = created.submit_evidence(&blob);
//! let _again = created.submit_evidence(&blob);
//! # Ok(())
//! # }
//! ```

pub use self::api::{SessionStatus, SESSION_MEDIA_TYPE};
pub use self::client::{Client, Created, Failed, ResultReady, Session, State, Submitted};
pub use self::clock::{CancelToken, Clock, SystemClock};
pub use self::transport::{HttpTransport, Request, Response, Transport, TransportError};

mod api;
mod client;
mod clock;
#[cfg(test)]
pub(crate) mod testing;
mod transport;
