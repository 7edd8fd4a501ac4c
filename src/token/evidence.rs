// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::common::*;
use super::errors::Error;
use super::platform::{InstanceId, Platform};
use super::realm::Realm;
use ciborium::de::from_reader;
use ciborium::Value;
use cose::message::CoseMessage;

const CBOR_TAG: u64 = 399;
const PLATFORM_LABEL: i128 = 44234;
const REALM_LABEL: i128 = 44241;

#[derive(Debug, Default)]
struct CBORCollection {
    raw_platform_token: Vec<u8>,
    raw_realm_token: Vec<u8>,
}

impl CBORCollection {
    fn decode(buf: &[u8]) -> Result<CBORCollection, Error> {
        let v: Value = from_reader(buf).map_err(|e| Error::Syntax(e.to_string()))?;

        let Value::Tag(t, m) = v else {
            return Err(Error::Syntax("expecting tag type".to_string()));
        };

        if t != CBOR_TAG {
            return Err(Error::Syntax(format!("expecting tag {CBOR_TAG}, got {t}")));
        }

        let Value::Map(contents) = *m else {
            return Err(Error::Syntax("expecting map type".to_string()));
        };

        let mut collection = CBORCollection::default();

        collection.parse(&contents)?;
        collection.validate()?;

        Ok(collection)
    }

    fn parse(&mut self, contents: &[(Value, Value)]) -> Result<(), Error> {
        for (k, v) in contents.iter() {
            let Value::Integer(i) = k else {
                return Err(Error::Syntax("expecting integer key".to_string()));
            };

            match (*i).into() {
                PLATFORM_LABEL => self.raw_platform_token = to_bstr(v, "platform token")?,
                REALM_LABEL => self.raw_realm_token = to_bstr(v, "realm token")?,
                unknown => {
                    return Err(Error::Syntax(format!(
                        "unknown key {unknown} in collection"
                    )))
                }
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), Error> {
        if self.raw_platform_token.is_empty() {
            return Err(Error::Syntax("missing platform token".to_string()));
        }

        if self.raw_realm_token.is_empty() {
            return Err(Error::Syntax("missing realm token".to_string()));
        }

        Ok(())
    }
}

/// Extract the payload of a COSE_Sign1 message without checking its
/// signature
fn sign1_payload(buf: Vec<u8>, what: &str) -> Result<Vec<u8>, Error> {
    let mut msg = CoseMessage::new_sign();

    msg.bytes = buf;

    msg.init_decoder(None)
        .map_err(|e| Error::Syntax(format!("{what} token: {e:?}")))?;

    Ok(msg.payload)
}

/// The claims-sets carried by a CCA evidence collection.  Signatures are not
/// checked, so nothing decoded here can be trusted.
#[derive(Debug)]
pub struct Evidence {
    /// Decoded platform claims-set
    pub platform_claims: Platform,
    /// Decoded realm claims-set
    pub realm_claims: Realm,
}

impl Evidence {
    /// Decode a CBOR encoded CCA evidence collection
    pub fn decode(buf: &[u8]) -> Result<Evidence, Error> {
        let collection = CBORCollection::decode(buf)?;

        let platform = sign1_payload(collection.raw_platform_token, "platform")?;
        let realm = sign1_payload(collection.raw_realm_token, "realm")?;

        Ok(Evidence {
            platform_claims: Platform::decode(&platform)?,
            realm_claims: Realm::decode(&realm)?,
        })
    }

    pub fn instance_id(&self) -> InstanceId {
        self.platform_claims.inst_id
    }

    /// Check that the realm claims are bound to `challenge`
    pub fn check_challenge(&self, challenge: &[u8]) -> Result<(), Error> {
        if self.realm_claims.challenge[..] != *challenge {
            return Err(Error::Sema(format!(
                "realm challenge {} does not match {}",
                hex::encode(self.realm_claims.challenge),
                hex::encode(challenge)
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures;
    use super::*;
    use hex_literal::hex;

    #[test]
    fn decode_good_token() {
        let e = Evidence::decode(&fixtures::cca_evidence(&[0x42; 64])).unwrap();

        assert_eq!(e.instance_id().as_bytes(), &fixtures::INST_ID);
        assert!(e.check_challenge(&[0x42; 64]).is_ok());
        assert!(matches!(
            e.check_challenge(&[0x43; 64]),
            Err(Error::Sema(_))
        ));
    }

    #[test]
    fn untagged_sign1() {
        let mut platform = Vec::new();
        ciborium::ser::into_writer(
            &Value::Array(vec![
                Value::Bytes(vec![0xa1, 0x01, 0x26]),
                Value::Map(vec![]),
                Value::Bytes(fixtures::platform_claims(&[0xcd; 32], None)),
                Value::Bytes(vec![0; 64]),
            ]),
            &mut platform,
        )
        .unwrap();

        let buf = fixtures::collection(
            platform,
            fixtures::sign1(fixtures::realm_claims(&[0x42; 64], None)),
        );

        assert!(Evidence::decode(&buf).is_ok());
    }

    #[test]
    fn wrong_collection_tag() {
        // 400({})
        let buf = hex!("d90190a0");

        assert_eq!(
            Evidence::decode(&buf).unwrap_err(),
            Error::Syntax("expecting tag 399, got 400".to_string())
        );
    }

    #[test]
    fn missing_realm_token() {
        let buf = fixtures::collection(fixtures::sign1(vec![0xa0]), vec![]);

        assert_eq!(
            Evidence::decode(&buf).unwrap_err(),
            Error::Syntax("missing realm token".to_string())
        );
    }

    #[test]
    fn sign1_not_an_array() {
        let buf = fixtures::collection(vec![0xa0], fixtures::sign1(vec![0xa0]));

        match Evidence::decode(&buf) {
            Err(Error::Syntax(e)) => assert!(e.starts_with("platform token:")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn sign1_without_payload() {
        let buf = fixtures::collection(
            fixtures::sign1(fixtures::platform_claims(&[0xcd; 32], None)),
            fixtures::sign1(vec![]),
        );

        assert!(matches!(Evidence::decode(&buf), Err(Error::Syntax(_))));
    }

    #[test]
    fn realm_claims_errors_surface() {
        let buf = fixtures::collection(
            fixtures::sign1(fixtures::platform_claims(&[0xcd; 32], None)),
            fixtures::sign1(vec![0xa0]),
        );

        assert_eq!(
            Evidence::decode(&buf).unwrap_err(),
            Error::MissingClaim("challenge".to_string())
        );
    }
}
