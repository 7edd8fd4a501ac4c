// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::common::*;
use super::errors::Error;
use bitmask::*;
use ciborium::Value;
use std::fmt;

pub const PLATFORM_PROFILE: &str = "http://arm.com/CCA-SSD/1.0.0";

const PROFILE_LABEL: i128 = 265;
const CHALLENGE_LABEL: i128 = 10;
const IMPL_ID_LABEL: i128 = 2396;
const INST_ID_LABEL: i128 = 256;
const LIFECYCLE_LABEL: i128 = 2395;
const VSI_LABEL: i128 = 2400;
const HASH_ALG_LABEL: i128 = 2402;

/// Type byte of a RAND UEID
const UEID_TYPE_RAND: u8 = 0x01;

bitmask! {
    #[derive(Debug)]
    mask ClaimsSet: u8 where flags Claims {
        Profile   = 0x01,
        Challenge = 0x02,
        ImplID    = 0x04,
        InstID    = 0x08,
        Lifecycle = 0x10,
        Vsi       = 0x20,
        HashAlg   = 0x40,
    }
}

/// CCA platform instance ID, a 33-byte RAND UEID.  Decoded from evidence
/// that has not been verified, so it identifies nothing by itself.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct InstanceId([u8; 33]);

impl InstanceId {
    pub fn as_bytes(&self) -> &[u8; 33] {
        &self.0
    }
}

impl TryFrom<[u8; 33]> for InstanceId {
    type Error = Error;

    fn try_from(v: [u8; 33]) -> Result<Self, Error> {
        if v[0] != UEID_TYPE_RAND {
            return Err(Error::Sema(format!(
                "instance-id: expecting UEID type {UEID_TYPE_RAND:#04x}, got {:#04x}",
                v[0]
            )));
        }

        Ok(Self(v))
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InstanceId({self})")
    }
}

/// The subset of the platform claims-set needed to identify the platform and
/// the challenge it was bound to.  Unknown and unneeded claims are skipped.
#[derive(Debug)]
pub struct Platform {
    pub profile: String,                      // 265, text
    pub challenge: Vec<u8>,                   // 10, bytes .size {32,48,64}
    pub impl_id: [u8; 32],                    // 2396, bytes .size 32
    pub inst_id: InstanceId,                  // 256, bytes .size 33
    pub lifecycle: u16,                       // 2395
    pub verification_service: Option<String>, // 2400, text
    pub hash_alg: String,                     // 2402, text

    claims_set: ClaimsSet,
}

impl Platform {
    fn new() -> Self {
        Self {
            profile: String::new(),
            challenge: Vec::new(),
            impl_id: [0; 32],
            inst_id: InstanceId([UEID_TYPE_RAND; 33]),
            lifecycle: 0,
            verification_service: None,
            hash_alg: String::new(),
            claims_set: ClaimsSet::none(),
        }
    }

    /// Decode a CBOR encoded CCA platform claims-set
    pub fn decode(buf: &[u8]) -> Result<Platform, Error> {
        let contents = decode_map(buf, "platform claims")?;

        let mut pc = Platform::new();

        pc.parse(&contents)?;
        pc.validate()?;

        Ok(pc)
    }

    fn parse(&mut self, contents: &[(Value, Value)]) -> Result<(), Error> {
        for (k, v) in contents {
            // CCA does not define any non-integer key
            let Value::Integer(i) = k else { continue };

            match (*i).into() {
                PROFILE_LABEL => self.set_profile(v)?,
                CHALLENGE_LABEL => self.set_challenge(v)?,
                IMPL_ID_LABEL => self.set_impl_id(v)?,
                INST_ID_LABEL => self.set_inst_id(v)?,
                LIFECYCLE_LABEL => self.set_lifecycle(v)?,
                VSI_LABEL => self.set_vsi(v)?,
                HASH_ALG_LABEL => self.set_hash_alg(v)?,
                _ => continue,
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), Error> {
        let mandatory_claims = [
            (Claims::Profile, "profile"),
            (Claims::Challenge, "challenge"),
            (Claims::ImplID, "implementation-id"),
            (Claims::InstID, "instance-id"),
            (Claims::Lifecycle, "lifecycle"),
            (Claims::HashAlg, "hash-algo-id"),
        ];

        for (c, n) in mandatory_claims.iter() {
            if !self.claims_set.contains(*c) {
                return Err(Error::MissingClaim(n.to_string()));
            }
        }

        Ok(())
    }

    fn claim(&mut self, c: Claims, n: &str) -> Result<(), Error> {
        if self.claims_set.contains(c) {
            return Err(Error::DuplicatedClaim(n.to_string()));
        }

        self.claims_set.set(c);

        Ok(())
    }

    fn set_profile(&mut self, v: &Value) -> Result<(), Error> {
        self.claim(Claims::Profile, "profile")?;

        let p = to_tstr(v, "profile")?;

        if p != PLATFORM_PROFILE {
            return Err(Error::Sema(format!("unknown profile {p}")));
        }

        self.profile = p;

        Ok(())
    }

    fn set_challenge(&mut self, v: &Value) -> Result<(), Error> {
        self.claim(Claims::Challenge, "challenge")?;

        self.challenge = to_measurement(v, "challenge")?;

        Ok(())
    }

    fn set_impl_id(&mut self, v: &Value) -> Result<(), Error> {
        self.claim(Claims::ImplID, "implementation-id")?;

        self.impl_id = to_fixed(v, "implementation-id")?;

        Ok(())
    }

    fn set_inst_id(&mut self, v: &Value) -> Result<(), Error> {
        self.claim(Claims::InstID, "instance-id")?;

        self.inst_id = InstanceId::try_from(to_fixed::<33>(v, "instance-id")?)?;

        Ok(())
    }

    fn set_lifecycle(&mut self, v: &Value) -> Result<(), Error> {
        self.claim(Claims::Lifecycle, "lifecycle")?;

        let lc = to_int(v, "lifecycle")?;

        if !is_valid_lifecycle(lc) {
            return Err(Error::Sema(format!("unknown lifecycle {lc:#x}")));
        }

        self.lifecycle = lc as u16;

        Ok(())
    }

    fn set_vsi(&mut self, v: &Value) -> Result<(), Error> {
        self.claim(Claims::Vsi, "verification-service")?;

        // could be a URL, but not necessarily so
        self.verification_service = Some(to_tstr(v, "verification-service")?);

        Ok(())
    }

    fn set_hash_alg(&mut self, v: &Value) -> Result<(), Error> {
        self.claim(Claims::HashAlg, "hash-algo-id")?;

        self.hash_alg = to_hash_alg(v, "hash-algo-id")?;

        Ok(())
    }
}
