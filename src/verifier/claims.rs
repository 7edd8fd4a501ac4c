// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use ear::TrustTier;
use serde::Serialize;
use serde_json::{Map, Value};

/// Claim carrying the EAR profile identifier
pub const EAR_PROFILE_CLAIM: &str = "eat_profile";
/// Profile of EAR version 1
pub const EAR_PROFILE: &str = "tag:github.com,2023:veraison/ear";

const SUBMODS_CLAIM: &str = "submods";
const STATUS_CLAIM: &str = "ear.status";

/// The payload of an attestation result whose signature has been checked.
///
/// There is no public constructor: the only way to obtain `Claims` is through
/// [`super::Verifier::verify`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Claims(Map<String, Value>);

impl Claims {
    pub(super) fn from_verified(m: Map<String, Value>) -> Self {
        Self(m)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn profile(&self) -> Option<&str> {
        self.get(EAR_PROFILE_CLAIM).and_then(Value::as_str)
    }

    pub fn issued_at(&self) -> Option<i64> {
        self.get("iat").and_then(Value::as_i64)
    }

    /// Names of the appraised submodules
    pub fn submods(&self) -> Vec<&str> {
        self.get(SUBMODS_CLAIM)
            .and_then(Value::as_object)
            .map(|m| m.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// The overall appraisal status of the named submodule
    pub fn status(&self, submod: &str) -> Option<TrustTier> {
        let v = self
            .get(SUBMODS_CLAIM)?
            .as_object()?
            .get(submod)?
            .as_object()?
            .get(STATUS_CLAIM)?;

        serde_json::from_value(v.clone()).ok()
    }
}

impl std::fmt::Display for Claims {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = serde_json::to_string_pretty(&self.0).map_err(|_| std::fmt::Error)?;
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims() -> Claims {
        let v = json!({
            "eat_profile": EAR_PROFILE,
            "iat": 1666091373,
            "ear.verifier-id": { "build": "N/A", "developer": "Veraison Project" },
            "submods": {
                "CCA_SSD_PLATFORM": { "ear.status": "affirming" },
                "CCA_REALM": { "ear.status": "warning" }
            }
        });

        match v {
            Value::Object(m) => Claims::from_verified(m),
            _ => unreachable!(),
        }
    }

    #[test]
    fn ear_accessors() {
        let c = claims();

        assert_eq!(c.profile(), Some(EAR_PROFILE));
        assert_eq!(c.issued_at(), Some(1666091373));

        let mut submods = c.submods();
        submods.sort();
        assert_eq!(submods, vec!["CCA_REALM", "CCA_SSD_PLATFORM"]);

        assert_eq!(c.status("CCA_SSD_PLATFORM"), Some(TrustTier::Affirming));
        assert_eq!(c.status("CCA_REALM"), Some(TrustTier::Warning));
        assert_eq!(c.status("nope"), None);
    }

    #[test]
    fn renders_as_json() {
        let c = claims();

        let back: Value = serde_json::from_str(&c.to_string()).unwrap();

        assert_eq!(back, Value::Object(c.as_map().clone()));
    }
}
