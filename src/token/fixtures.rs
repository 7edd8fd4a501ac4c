// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! CBOR encoded CCA evidence built on the fly

use ciborium::Value;

pub(crate) const INST_ID: [u8; 33] = {
    let mut id = [0x5c; 33];
    id[0] = 0x01;
    id
};

fn int(i: i64) -> Value {
    Value::Integer(i.into())
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

fn encode(v: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(v, &mut buf).unwrap();
    buf
}

fn claims_map(claims: Vec<(i64, Value)>, omit: Option<i128>) -> Vec<u8> {
    let contents = claims
        .into_iter()
        .filter(|(k, _)| Some(i128::from(*k)) != omit)
        .map(|(k, v)| (int(k), v))
        .collect();

    encode(&Value::Map(contents))
}

/// Platform claims-set, leaving out the claim labelled `omit`
pub(crate) fn platform_claims(challenge: &[u8], omit: Option<i128>) -> Vec<u8> {
    let claims = vec![
        (265, text("http://arm.com/CCA-SSD/1.0.0")),
        (10, Value::Bytes(challenge.to_vec())),
        (2396, Value::Bytes(vec![0x7f; 32])),
        (256, Value::Bytes(INST_ID.to_vec())),
        (2401, Value::Bytes(vec![0xcf, 0xe5])),
        (2395, int(0x3000)),
        (2400, text("https://veraison.example/.well-known/veraison/verification")),
        (2402, text("sha-256")),
    ];

    claims_map(claims, omit)
}

/// Realm claims-set, leaving out the claim labelled `omit`
pub(crate) fn realm_claims(challenge: &[u8; 64], omit: Option<i128>) -> Vec<u8> {
    let claims = vec![
        (10, Value::Bytes(challenge.to_vec())),
        (44235, Value::Bytes(vec![0; 64])),
        (44238, Value::Bytes(vec![0x3d; 32])),
        (44236, text("sha-256")),
        (44237, Value::Bytes(vec![0x04; 97])),
        (44240, text("sha-256")),
    ];

    claims_map(claims, omit)
}

pub(crate) fn realm_claims_with_spurious_keys(challenge: &[u8; 64]) -> Vec<u8> {
    let buf = realm_claims(challenge, None);
    let mut v: Value = ciborium::de::from_reader(buf.as_slice()).unwrap();

    if let Value::Map(contents) = &mut v {
        contents.push((int(-65537), text("spurious")));
        contents.push((text("spurious"), int(1)));
    }

    encode(&v)
}

/// Tagged COSE_Sign1 with a dummy signature
pub(crate) fn sign1(payload: Vec<u8>) -> Vec<u8> {
    let msg = Value::Array(vec![
        Value::Bytes(vec![0xa1, 0x01, 0x26]),
        Value::Map(vec![]),
        Value::Bytes(payload),
        Value::Bytes(vec![0xee; 64]),
    ]);

    encode(&Value::Tag(18, Box::new(msg)))
}

pub(crate) fn collection(platform: Vec<u8>, realm: Vec<u8>) -> Vec<u8> {
    let c = Value::Map(vec![
        (int(44234), Value::Bytes(platform)),
        (int(44241), Value::Bytes(realm)),
    ]);

    encode(&Value::Tag(399, Box::new(c)))
}

/// Well-formed CCA evidence whose realm challenge is `challenge`
pub(crate) fn cca_evidence(challenge: &[u8; 64]) -> Vec<u8> {
    collection(
        sign1(platform_claims(&[0xcd; 32], None)),
        sign1(realm_claims(challenge, None)),
    )
}
