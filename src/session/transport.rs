// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use crate::errors::Error;
use reqwest::header::{HeaderName, LOCATION};
use reqwest::{Method, StatusCode, Url};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(HeaderName, String)>,
    pub body: Option<Vec<u8>>,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: HeaderName, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    pub fn get_header(&self, name: &HeaderName) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    /// Value of the `Location` header, if any
    pub location: Option<String>,
    pub body: Vec<u8>,
}

/// A failure to obtain any response at all (connection refused, reset,
/// timed out).  These are the only failures eligible for retry.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// One HTTP round trip
pub trait Transport {
    fn send(&self, req: &Request) -> Result<Response, TransportError>;
}

/// [`Transport`] backed by a blocking `reqwest` client
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(request_timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::Config(format!("building HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn send(&self, req: &Request) -> Result<Response, TransportError> {
        let mut rb = self.client.request(req.method.clone(), req.url.clone());

        for (name, value) in &req.headers {
            rb = rb.header(name.clone(), value.as_str());
        }

        if let Some(body) = &req.body {
            rb = rb.body(body.clone());
        }

        let resp = rb
            .send()
            .map_err(|e| TransportError(format!("{} {}: {e}", req.method, req.url)))?;

        let status = resp.status();
        let location = resp
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp
            .bytes()
            .map_err(|e| TransportError(format!("reading response body: {e}")))?
            .to_vec();

        Ok(Response {
            status,
            location,
            body,
        })
    }
}
