// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::common::*;
use super::errors::Error;
use bitmask::*;
use ciborium::Value;

const CHALLENGE_LABEL: i128 = 10;
const PERSO_LABEL: i128 = 44235;
const HASH_ALG_LABEL: i128 = 44236;
const RIM_LABEL: i128 = 44238;
const RAK_HASH_ALG_LABEL: i128 = 44240;

bitmask! {
    #[derive(Debug)]
    mask ClaimsSet: u8 where flags Claims {
        Challenge  = 0x01,
        Perso      = 0x02,
        Rim        = 0x04,
        HashAlg    = 0x08,
        RakHashAlg = 0x10,
    }
}

/// Realm claims-set, limited to what binds the evidence to a challenge and
/// describes the initial realm state.  See §A.7.2.3.1 of "Realm Management
/// Monitor (RMM) Specification" v.1.0-eac4
#[derive(Debug)]
pub struct Realm {
    pub challenge: [u8; 64],  //    10 => bytes .size 64
    pub perso: [u8; 64],      // 44235 => bytes .size 64
    pub rim: Vec<u8>,         // 44238 => bytes .size {32,48,64}
    pub hash_alg: String,     // 44236 => text
    pub rak_hash_alg: String, // 44240 => text

    claims_set: ClaimsSet,
}

impl Realm {
    fn new() -> Self {
        Self {
            challenge: [0; 64],
            perso: [0; 64],
            rim: Vec::new(),
            hash_alg: String::new(),
            rak_hash_alg: String::new(),
            claims_set: ClaimsSet::none(),
        }
    }

    /// Decode a CBOR encoded CCA realm claims-set
    pub fn decode(buf: &[u8]) -> Result<Realm, Error> {
        let contents = decode_map(buf, "realm claims")?;

        let mut rc = Realm::new();

        for (k, v) in contents.iter() {
            let Value::Integer(i) = k else { continue };

            match (*i).into() {
                CHALLENGE_LABEL => rc.set_challenge(v)?,
                PERSO_LABEL => rc.set_perso(v)?,
                RIM_LABEL => rc.set_rim(v)?,
                HASH_ALG_LABEL => rc.set_hash_alg(v)?,
                RAK_HASH_ALG_LABEL => rc.set_rak_hash_alg(v)?,
                _ => continue,
            }
        }

        rc.validate()?;

        Ok(rc)
    }

    fn validate(&self) -> Result<(), Error> {
        // all the claims we look at are mandatory
        let mandatory_claims = [
            (Claims::Challenge, "challenge"),
            (Claims::Perso, "personalization-value"),
            (Claims::Rim, "initial-measurement"),
            (Claims::HashAlg, "hash-algo-id"),
            (Claims::RakHashAlg, "public-key-hash-algo-id"),
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

    fn set_challenge(&mut self, v: &Value) -> Result<(), Error> {
        self.claim(Claims::Challenge, "challenge")?;

        self.challenge = to_fixed(v, "challenge")?;

        Ok(())
    }

    fn set_perso(&mut self, v: &Value) -> Result<(), Error> {
        self.claim(Claims::Perso, "personalization-value")?;

        self.perso = to_fixed(v, "personalization-value")?;

        Ok(())
    }

    fn set_rim(&mut self, v: &Value) -> Result<(), Error> {
        self.claim(Claims::Rim, "initial-measurement")?;

        self.rim = to_measurement(v, "initial-measurement")?;

        Ok(())
    }

    fn set_hash_alg(&mut self, v: &Value) -> Result<(), Error> {
        self.claim(Claims::HashAlg, "hash-algo-id")?;

        self.hash_alg = to_hash_alg(v, "hash-algo-id")?;

        Ok(())
    }

    fn set_rak_hash_alg(&mut self, v: &Value) -> Result<(), Error> {
        self.claim(Claims::RakHashAlg, "public-key-hash-algo-id")?;

        self.rak_hash_alg = to_hash_alg(v, "public-key-hash-algo-id")?;

        Ok(())
    }
}
