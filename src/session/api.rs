// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Wire format of the Veraison challenge-response API (v1)

use super::transport::Response;
use serde::Deserialize;

pub const SESSION_MEDIA_TYPE: &str = "application/vnd.veraison.challenge-response-session+json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Waiting,
    Processing,
    Complete,
    Failed,
}

/// The session resource
#[derive(Debug, Deserialize)]
pub struct SessionBody {
    /// The challenge, standard base64
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub expiry: Option<String>,
    /// Evidence media types, in order of preference of the service
    #[serde(default)]
    pub accept: Vec<String>,
    pub status: SessionStatus,
    /// The attestation result, present once the status is complete
    #[serde(default)]
    pub result: Option<String>,
}

impl SessionBody {
    pub fn parse(buf: &[u8]) -> Result<Self, String> {
        serde_json::from_slice(buf).map_err(|e| format!("decoding session: {e}"))
    }
}

// RFC 7807
#[derive(Debug, Default, Deserialize)]
struct ProblemDetails {
    title: Option<String>,
    detail: Option<String>,
}

/// Describe a response with an unexpected status code, including the
/// problem details the service may have sent
pub fn describe_failure(resp: &Response) -> String {
    let mut s = format!("unexpected status {}", resp.status);

    if let Ok(p) = serde_json::from_slice::<ProblemDetails>(&resp.body) {
        for part in [p.title, p.detail].into_iter().flatten() {
            s.push_str(": ");
            s.push_str(&part);
        }
    }

    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn session_ok() {
        let j = br#"{
            "nonce": "mVubqtg3Wa5GSrx3L/2B99cQU2bMQFVYUI9aTmDYi64=",
            "expiry": "2030-10-12T07:20:50.52Z",
            "accept": [
                "application/psa-attestation-token",
                "application/eat-collection; profile=http://arm.com/CCA-SSD/1.0.0"
            ],
            "status": "waiting"
        }"#;

        let s = SessionBody::parse(j).unwrap();

        assert_eq!(s.status, SessionStatus::Waiting);
        assert_eq!(s.accept.len(), 2);
        assert!(s.result.is_none());
    }

    #[test]
    fn session_unknown_status() {
        assert!(SessionBody::parse(br#"{"status": "pondering"}"#).is_err());
        assert!(SessionBody::parse(b"<html></html>").is_err());
    }

    #[test]
    fn problem_details() {
        let resp = Response {
            status: StatusCode::BAD_REQUEST,
            location: None,
            body: br#"{"type": "about:blank", "title": "Bad Request", "detail": "nonce too short"}"#
                .to_vec(),
        };

        assert_eq!(
            describe_failure(&resp),
            "unexpected status 400 Bad Request: Bad Request: nonce too short"
        );

        let resp = Response {
            status: StatusCode::BAD_GATEWAY,
            location: None,
            body: b"upstream gone".to_vec(),
        };

        assert_eq!(describe_failure(&resp), "unexpected status 502 Bad Gateway");
    }
}
