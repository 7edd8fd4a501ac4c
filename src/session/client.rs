// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::api::{describe_failure, SessionBody, SessionStatus, SESSION_MEDIA_TYPE};
use super::clock::{CancelToken, Clock, SystemClock};
use super::transport::{HttpTransport, Request, Response, Transport, TransportError};
use crate::config::SessionConfig;
use crate::errors::Error;
use crate::evidence::EvidenceBlob;
use crate::nonce::Nonce;
use crate::verifier::SignedResult;
use log::{debug, info, warn};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode, Url};
use std::time::{Duration, Instant};

/// Stages of a challenge-response exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Created,
    EvidenceSubmitted,
    ResultReady,
    Closed,
    Failed,
}

/// The service-side session, as seen by the client
#[derive(Debug, Clone)]
pub struct Session {
    location: Url,
    accept: Vec<String>,
    expiry: Option<String>,
    deadline: Instant,
}

impl Session {
    pub fn location(&self) -> &Url {
        &self.location
    }

    /// Evidence media types accepted by the service, in its order of
    /// preference
    pub fn accept(&self) -> &[String] {
        &self.accept
    }

    /// Expiry time as advertised by the service
    pub fn expiry(&self) -> Option<&str> {
        self.expiry.as_deref()
    }

    /// End of the exchange, after which polling is abandoned
    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}

/// Challenge-response client.  A client is in the `Idle` state; each
/// successful step returns a handle that only exposes the next legal step.
pub struct Client {
    cfg: SessionConfig,
    new_session: Url,
    transport: Box<dyn Transport>,
    clock: Box<dyn Clock>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("new_session", &self.new_session.as_str())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// A client talking HTTP and using the system clock
    pub fn new(cfg: SessionConfig) -> Result<Self, Error> {
        let transport = HttpTransport::new(cfg.request_timeout)?;

        Self::with_parts(cfg, transport, SystemClock)
    }

    pub fn with_parts(
        cfg: SessionConfig,
        transport: impl Transport + 'static,
        clock: impl Clock + 'static,
    ) -> Result<Self, Error> {
        cfg.validate()?;

        let new_session = Url::parse(&cfg.new_session_uri).map_err(|e| {
            Error::Config(format!("new-session-uri {:?}: {e}", cfg.new_session_uri))
        })?;

        Ok(Self {
            cfg,
            new_session,
            transport: Box::new(transport),
            clock: Box::new(clock),
        })
    }

    pub fn state(&self) -> State {
        State::Idle
    }

    /// Open a session on the verification service for the supplied nonce.
    /// The exchange deadline starts now.
    pub fn create_session(&self, nonce: &Nonce) -> Result<Created<'_>, Error> {
        let deadline = self
            .clock
            .now()
            .checked_add(self.cfg.timeout)
            .ok_or_else(|| Error::Config("timeout-ms out of range".to_string()))?;

        let mut url = self.new_session.clone();
        url.query_pairs_mut()
            .append_pair("nonce", &nonce.to_query_param());

        let req = Request::new(Method::POST, url).header(ACCEPT, SESSION_MEDIA_TYPE);

        debug!("{:?}: creating session at {}", State::Idle, self.new_session);

        let resp = self
            .send_with_retry(&req, deadline)
            .map_err(|e| Error::SessionCreationFailed(e.to_string()))?;

        let location = self
            .new_session_location(&resp)
            .map_err(Error::SessionCreationFailed)?;

        let session = match read_new_session(&resp, location.clone(), nonce, deadline) {
            Ok(session) => session,
            Err(e) => {
                // the session exists on the service even though we won't use
                // it, and no handle will be around to close it
                let rejected = Session {
                    location,
                    accept: Vec::new(),
                    expiry: None,
                    deadline,
                };
                self.close(&rejected, true, State::Idle);

                return Err(Error::SessionCreationFailed(e));
            }
        };

        info!("session created at {}", session.location);
        debug!("{:?} -> {:?}", State::Idle, State::Created);

        Ok(Created {
            client: self,
            session,
        })
    }

    fn new_session_location(&self, resp: &Response) -> Result<Url, String> {
        if resp.status != StatusCode::CREATED {
            return Err(describe_failure(resp));
        }

        let location = resp
            .location
            .as_deref()
            .ok_or("no Location in new session response")?;

        // the Location may be relative to the new-session endpoint
        self.new_session
            .join(location)
            .map_err(|e| format!("bad session location {location:?}: {e}"))
    }

    fn send_with_retry(
        &self,
        req: &Request,
        deadline: Instant,
    ) -> Result<Response, TransportError> {
        let mut delay = self.cfg.retry_delay;
        let mut attempt = 0;

        loop {
            match self.transport.send(req) {
                Ok(resp) => return Ok(resp),
                Err(e) if attempt < self.cfg.max_retries && self.retry_in_time(delay, deadline) => {
                    attempt += 1;
                    warn!(
                        "{} {} failed ({e}), retry {attempt}/{} in {delay:?}",
                        req.method, req.url, self.cfg.max_retries
                    );
                    self.clock.sleep(delay);
                    delay = delay.saturating_mul(2);
                }
                Err(e) => return Err(e),
            }
        }
    }

    // a retry whose delay would overflow the clock is past any deadline
    fn retry_in_time(&self, delay: Duration, deadline: Instant) -> bool {
        self.clock
            .now()
            .checked_add(delay)
            .map_or(false, |t| t < deadline)
    }

    // returns the result if the service appraised the evidence synchronously
    fn read_submission(&self, resp: &Response) -> Result<Option<SignedResult>, Error> {
        match resp.status {
            StatusCode::ACCEPTED if resp.body.is_empty() => Ok(None),
            StatusCode::OK | StatusCode::ACCEPTED => {
                let body =
                    SessionBody::parse(&resp.body).map_err(Error::EvidenceSubmissionFailed)?;

                match body.status {
                    SessionStatus::Complete => result_of(body)
                        .map(Some)
                        .map_err(Error::EvidenceSubmissionFailed),
                    SessionStatus::Failed => Err(Error::EvidenceSubmissionFailed(
                        "service failed to process the evidence".to_string(),
                    )),
                    SessionStatus::Waiting | SessionStatus::Processing => Ok(None),
                }
            }
            _ => Err(Error::EvidenceSubmissionFailed(describe_failure(resp))),
        }
    }

    fn poll(&self, session: &Session) -> Result<Option<SignedResult>, Error> {
        let req =
            Request::new(Method::GET, session.location.clone()).header(ACCEPT, SESSION_MEDIA_TYPE);

        let resp = self
            .transport
            .send(&req)
            .map_err(|e| Error::ResultRetrievalFailed(e.to_string()))?;

        if resp.status != StatusCode::OK {
            return Err(Error::ResultRetrievalFailed(describe_failure(&resp)));
        }

        let body = SessionBody::parse(&resp.body).map_err(Error::ResultRetrievalFailed)?;

        match body.status {
            SessionStatus::Complete => result_of(body)
                .map(Some)
                .map_err(Error::ResultRetrievalFailed),
            SessionStatus::Failed => Err(Error::ResultRetrievalFailed(
                "service failed to appraise the evidence".to_string(),
            )),
            SessionStatus::Waiting | SessionStatus::Processing => Ok(None),
        }
    }

    // best effort: failures are logged and otherwise ignored
    fn close(&self, session: &Session, delete: bool, from: State) {
        if delete {
            let req = Request::new(Method::DELETE, session.location.clone());

            match self.transport.send(&req) {
                Ok(resp) if resp.status.is_success() => {
                    debug!("session {} deleted", session.location)
                }
                Ok(resp) => warn!(
                    "deleting session {}: {}",
                    session.location,
                    describe_failure(&resp)
                ),
                Err(e) => warn!("deleting session {}: {e}", session.location),
            }
        }

        debug!("{from:?} -> {:?}", State::Closed);
    }
}

fn read_new_session(
    resp: &Response,
    location: Url,
    nonce: &Nonce,
    deadline: Instant,
) -> Result<Session, String> {
    let body = SessionBody::parse(&resp.body)?;

    if body.status != SessionStatus::Waiting {
        return Err(format!(
            "new session in state {:?}, expecting waiting",
            body.status
        ));
    }

    if let Some(n) = &body.nonce {
        if !nonce.matches_encoded(n) {
            return Err("session nonce differs from the one supplied".to_string());
        }
    }

    Ok(Session {
        location,
        accept: body.accept,
        expiry: body.expiry,
        deadline,
    })
}

fn result_of(body: SessionBody) -> Result<SignedResult, String> {
    match body.result {
        Some(r) if !r.is_empty() => Ok(SignedResult::from(r.into_bytes())),
        _ => Err("session complete but no result attached".to_string()),
    }
}

/// A session exists, evidence has not been submitted yet
#[derive(Debug)]
pub struct Created<'a> {
    client: &'a Client,
    session: Session,
}

impl<'a> Created<'a> {
    pub fn state(&self) -> State {
        State::Created
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn accept(&self) -> &[String] {
        self.session.accept()
    }

    /// Send the evidence to the session.  Transport failures are retried
    /// within the configured bounds.
    pub fn submit_evidence(self, blob: &EvidenceBlob) -> Result<Submitted<'a>, Failed<'a>> {
        let req = Request::new(Method::POST, self.session.location.clone())
            .header(CONTENT_TYPE, blob.media_type())
            .header(ACCEPT, SESSION_MEDIA_TYPE)
            .body(blob.data().to_vec());

        let resp = match self.client.send_with_retry(&req, self.session.deadline) {
            Ok(resp) => resp,
            Err(e) => return Err(self.fail(Error::EvidenceSubmissionFailed(e.to_string()))),
        };

        match self.client.read_submission(&resp) {
            Ok(result) => {
                debug!("{:?} -> {:?}", State::Created, State::EvidenceSubmitted);

                Ok(Submitted {
                    client: self.client,
                    session: self.session,
                    result,
                })
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    pub fn close(self, delete: bool) {
        self.client.close(&self.session, delete, State::Created)
    }

    fn fail(self, error: Error) -> Failed<'a> {
        Failed::new(self.client, self.session, State::Created, error)
    }
}

/// Evidence has been accepted by the service
#[derive(Debug)]
pub struct Submitted<'a> {
    client: &'a Client,
    session: Session,
    result: Option<SignedResult>,
}

impl<'a> Submitted<'a> {
    pub fn state(&self) -> State {
        State::EvidenceSubmitted
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Poll the session until the result is available, the attempts are
    /// exhausted, the deadline passes or `cancel` fires.
    pub fn await_result(mut self, cancel: &CancelToken) -> Result<ResultReady<'a>, Failed<'a>> {
        if let Some(result) = self.result.take() {
            debug!("result returned on submission");
            return Ok(self.ready(result));
        }

        let client = self.client;
        let cfg = &client.cfg;
        let deadline = self.session.deadline;
        let mut delay = cfg.poll_interval;

        for attempt in 1..=cfg.max_poll_attempts {
            if cancel.is_cancelled() {
                return Err(self.fail(Error::Cancelled(format!(
                    "before poll attempt {attempt}"
                ))));
            }

            let now = client.clock.now();

            if now >= deadline {
                return Err(self.fail(Error::ResultTimeout(format!(
                    "deadline exceeded after {} poll attempts",
                    attempt - 1
                ))));
            }

            debug!("polling {} (attempt {attempt})", self.session.location);

            match client.poll(&self.session) {
                Ok(Some(result)) => return Ok(self.ready(result)),
                Ok(None) => {}
                Err(e) => return Err(self.fail(e)),
            }

            if attempt == cfg.max_poll_attempts {
                break;
            }

            client
                .clock
                .sleep(delay.min(deadline.saturating_duration_since(client.clock.now())));

            delay = delay
                .saturating_mul(cfg.poll_backoff)
                .min(cfg.max_poll_interval);
        }

        Err(self.fail(Error::ResultTimeout(format!(
            "no result after {} poll attempts",
            cfg.max_poll_attempts
        ))))
    }

    pub fn close(self, delete: bool) {
        self.client
            .close(&self.session, delete, State::EvidenceSubmitted)
    }

    fn ready(self, result: SignedResult) -> ResultReady<'a> {
        debug!("{:?} -> {:?}", State::EvidenceSubmitted, State::ResultReady);

        ResultReady {
            client: self.client,
            session: self.session,
            result,
        }
    }

    fn fail(self, error: Error) -> Failed<'a> {
        Failed::new(self.client, self.session, State::EvidenceSubmitted, error)
    }
}

/// The signed result has been retrieved
#[derive(Debug)]
pub struct ResultReady<'a> {
    client: &'a Client,
    session: Session,
    result: SignedResult,
}

impl<'a> ResultReady<'a> {
    pub fn state(&self) -> State {
        State::ResultReady
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn result(&self) -> &SignedResult {
        &self.result
    }

    /// End the exchange, handing back the (still unverified) result
    pub fn close(self, delete: bool) -> SignedResult {
        self.client
            .close(&self.session, delete, State::ResultReady);

        self.result
    }
}

/// Terminal failure of an exchange.  The session can only be closed; a new
/// attempt needs a new nonce and a new session.
#[derive(Debug)]
pub struct Failed<'a> {
    client: &'a Client,
    session: Session,
    from: State,
    error: Error,
}

impl<'a> Failed<'a> {
    fn new(client: &'a Client, session: Session, from: State, error: Error) -> Self {
        debug!("{from:?} -> {:?}: {error}", State::Failed);

        Self {
            client,
            session,
            from,
            error,
        }
    }

    pub fn state(&self) -> State {
        State::Failed
    }

    /// The state the exchange was in when it failed
    pub fn failed_in(&self) -> State {
        self.from
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn error(&self) -> &Error {
        &self.error
    }

    /// Clean up and hand back the error that caused the failure.  Cleanup
    /// problems never replace it.
    pub fn close(self, delete: bool) -> Error {
        self.client.close(&self.session, delete, State::Failed);

        self.error
    }
}
