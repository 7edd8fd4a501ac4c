// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! One complete attestation attempt: nonce, session, evidence, result,
//! verification.  The only way to get hold of a [`Passport`] is a successful
//! [`Attester::obtain`], so nothing unverified can be saved.

use crate::config::Config;
use crate::errors::Error;
use crate::evidence::{EvidenceBuilder, EvidenceProvider};
use crate::nonce::NonceGenerator;
use crate::session::{CancelToken, Client};
use crate::verifier::{Claims, SignedResult, Verifier};
use log::{debug, info};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// A verified attestation result
#[derive(Debug)]
pub struct Passport {
    result: SignedResult,
    claims: Claims,
}

impl Passport {
    /// The signed result, exactly as returned by the service
    pub fn result(&self) -> &SignedResult {
        &self.result
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    /// Write the signed result to `path`, byte for byte
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref();

        fs::write(path, self.result.as_bytes())
            .map_err(|e| Error::OutputWriteFailed(format!("{}: {e}", path.display())))?;

        info!("attestation result saved to {}", path.display());

        Ok(())
    }
}

pub struct Attester {
    nonces: NonceGenerator,
    client: Client,
    builder: EvidenceBuilder,
    verifier: Verifier,
    delete_session: bool,
}

impl Attester {
    /// An attester for CCA evidence obtained from `provider`, talking HTTP to
    /// the configured service
    pub fn new(cfg: Config, provider: Arc<dyn EvidenceProvider>) -> Result<Self, Error> {
        let verifier = Verifier::new(cfg.verification_key.to_key()?);
        let client = Client::new(cfg.session)?;

        Ok(Self::with_parts(
            NonceGenerator::new(),
            client,
            EvidenceBuilder::cca(provider),
            verifier,
            cfg.delete_session,
        ))
    }

    pub fn with_parts(
        nonces: NonceGenerator,
        client: Client,
        builder: EvidenceBuilder,
        verifier: Verifier,
        delete_session: bool,
    ) -> Self {
        Self {
            nonces,
            client,
            builder,
            verifier,
            delete_session,
        }
    }

    /// Run one attestation attempt.  On failure the session, if any, is
    /// closed and the error of the failed step is returned.
    pub fn obtain(&self, cancel: &CancelToken) -> Result<Passport, Error> {
        let nonce = self.nonces.generate()?;

        let created = self.client.create_session(&nonce)?;

        let blob = match self.builder.build(&nonce, created.accept()) {
            Ok(blob) => blob,
            Err(e) => {
                created.close(self.delete_session);
                return Err(e);
            }
        };

        debug!(
            "submitting {} bytes of {}",
            blob.data().len(),
            blob.media_type()
        );

        let ready = created
            .submit_evidence(&blob)
            .and_then(|submitted| submitted.await_result(cancel))
            .map_err(|failed| failed.close(self.delete_session))?;

        let result = ready.close(self.delete_session);

        let claims = self.verifier.verify(&result)?;

        info!("attestation result verified");

        Ok(Passport { result, claims })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::evidence::CCA_EVIDENCE_MEDIA_TYPE;
    use crate::nonce::{EntropySource, Nonce, NONCE_SIZE};
    use crate::session::testing::{ManualClock, MockTransport};
    use crate::token::fixtures;
    use crate::verifier::tests::{test_ear, TestSigner};
    use base64::{engine::general_purpose, Engine as _};
    use reqwest::header::CONTENT_TYPE;
    use reqwest::{Method, StatusCode};
    use serde_json::{json, Value};

    const SESSION_PATH: &str = "/challenge-response/v1/session/5678";

    struct Fixed;

    impl EntropySource for Fixed {
        fn fill(&self, buf: &mut [u8]) -> Result<(), Error> {
            buf.fill(0x42);
            Ok(())
        }
    }

    fn session_body(status: &str, accept: &[&str]) -> Value {
        json!({
            "nonce": general_purpose::STANDARD.encode([0x42; NONCE_SIZE]),
            "expiry": "2030-10-12T07:20:50.52Z",
            "accept": accept,
            "status": status
        })
    }

    fn attester(t: &MockTransport, verifier: Verifier) -> Attester {
        let provider: Arc<dyn EvidenceProvider> =
            Arc::new(|n: &Nonce| -> Result<Vec<u8>, Error> {
                let mut challenge = [0; NONCE_SIZE];
                challenge.copy_from_slice(n.as_bytes());
                Ok(fixtures::cca_evidence(&challenge))
            });

        let client =
            Client::with_parts(SessionConfig::default(), t.clone(), ManualClock::new()).unwrap();

        Attester::with_parts(
            NonceGenerator::with_source(Fixed),
            client,
            EvidenceBuilder::cca(provider),
            verifier,
            true,
        )
    }

    fn script_exchange(t: &MockTransport, token: &str) {
        let accept = ["application/psa-attestation-token", CCA_EVIDENCE_MEDIA_TYPE];

        let mut complete = session_body("complete", &accept);
        complete["result"] = json!(token);

        t.reply(
            StatusCode::CREATED,
            Some(SESSION_PATH),
            &session_body("waiting", &accept),
        )
        .reply(StatusCode::ACCEPTED, None, &session_body("processing", &accept))
        .reply(StatusCode::OK, None, &session_body("processing", &accept))
        .reply(StatusCode::OK, None, &complete)
        .reply_empty(StatusCode::NO_CONTENT);
    }

    #[test]
    fn obtain_and_save() {
        let signer = TestSigner::new();
        let token = signer.sign(&test_ear());

        let t = MockTransport::new();
        script_exchange(&t, &token);

        let passport = attester(&t, signer.verifier())
            .obtain(&CancelToken::new())
            .unwrap();

        assert_eq!(
            passport.claims().profile(),
            Some("tag:github.com,2023:veraison/ear")
        );
        assert_eq!(t.remaining(), 0);

        let reqs = t.requests();
        assert_eq!(reqs.len(), 5);
        assert_eq!(
            reqs[1].get_header(&CONTENT_TYPE),
            Some(CCA_EVIDENCE_MEDIA_TYPE)
        );
        assert_eq!(
            reqs[1].body.as_deref(),
            Some(fixtures::cca_evidence(&[0x42; NONCE_SIZE]).as_slice())
        );
        assert_eq!(reqs[4].method, Method::DELETE);

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("ear.jwt");

        passport.save(&out).unwrap();

        assert_eq!(fs::read(&out).unwrap(), token.as_bytes());
    }

    #[test]
    fn bad_signature_yields_no_passport() {
        let token = TestSigner::new().sign(&test_ear());

        let t = MockTransport::new();
        script_exchange(&t, &token);

        let err = attester(&t, TestSigner::new().verifier())
            .obtain(&CancelToken::new())
            .unwrap_err();

        assert!(matches!(err, Error::SignatureInvalid(_)));
        // the session was still cleaned up
        assert_eq!(t.remaining(), 0);
    }

    #[test]
    fn no_common_media_type_closes_session() {
        let t = MockTransport::new();
        t.reply(
            StatusCode::CREATED,
            Some(SESSION_PATH),
            &session_body("waiting", &["application/psa-attestation-token"]),
        )
        .reply_empty(StatusCode::NO_CONTENT);

        let err = attester(&t, TestSigner::new().verifier())
            .obtain(&CancelToken::new())
            .unwrap_err();

        assert!(matches!(err, Error::NoSupportedMediaType(_)));

        let reqs = t.requests();
        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[1].method, Method::DELETE);
    }

    #[test]
    fn empty_accept_list_is_a_negotiation_failure() {
        let t = MockTransport::new();
        t.reply(
            StatusCode::CREATED,
            Some(SESSION_PATH),
            &session_body("waiting", &[]),
        )
        .reply_empty(StatusCode::NO_CONTENT);

        let err = attester(&t, TestSigner::new().verifier())
            .obtain(&CancelToken::new())
            .unwrap_err();

        assert!(matches!(err, Error::NoSupportedMediaType(_)));

        let reqs = t.requests();
        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[1].method, Method::DELETE);
        assert_eq!(t.remaining(), 0);
    }

    #[test]
    fn submission_failure_keeps_primary_error() {
        let accept = [CCA_EVIDENCE_MEDIA_TYPE];

        let t = MockTransport::new();
        t.reply(
            StatusCode::CREATED,
            Some(SESSION_PATH),
            &session_body("waiting", &accept),
        )
        .reply(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            None,
            &json!({"title": "Unsupported Media Type"}),
        );
        // the DELETE finds nothing scripted and fails at transport level

        let err = attester(&t, TestSigner::new().verifier())
            .obtain(&CancelToken::new())
            .unwrap_err();

        assert!(matches!(err, Error::EvidenceSubmissionFailed(_)));
        assert_eq!(t.requests().len(), 3);
    }

    #[test]
    fn save_to_missing_dir() {
        let signer = TestSigner::new();
        let token = signer.sign(&test_ear());

        let t = MockTransport::new();
        script_exchange(&t, &token);

        let passport = attester(&t, signer.verifier())
            .obtain(&CancelToken::new())
            .unwrap();

        let dir = tempfile::tempdir().unwrap();

        assert!(matches!(
            passport.save(dir.path().join("no/such/dir/ear.jwt")),
            Err(Error::OutputWriteFailed(_))
        ));
    }
}
