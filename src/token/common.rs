// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use ciborium::de::from_reader;
use ciborium::Value;

// See https://www.iana.org/assignments/hash-function-text-names/hash-function-text-names.xhtml
pub fn is_valid_hash(value: &str) -> bool {
    matches!(
        value,
        "md2"
            | "md5"
            | "sha-1"
            | "sha-224"
            | "sha-256"
            | "sha-384"
            | "sha-512"
            | "shake128"
            | "shake256"
    )
}

pub fn is_valid_measurement(value: &[u8]) -> bool {
    matches!(value.len(), 32 | 48 | 64)
}

pub fn is_valid_lifecycle(value: i128) -> bool {
    matches!(
        value,
        0x0000..=0x00ff
            | 0x1000..=0x10ff
            | 0x2000..=0x20ff
            | 0x3000..=0x30ff
            | 0x4000..=0x40ff
            | 0x5000..=0x50ff
            | 0x6000..=0x60ff
    )
}

/// Decode a CBOR map, returning its entries
pub(super) fn decode_map(buf: &[u8], what: &str) -> Result<Vec<(Value, Value)>, Error> {
    let v: Value = from_reader(buf).map_err(|e| Error::Syntax(format!("{what}: {e}")))?;

    match v {
        Value::Map(contents) => Ok(contents),
        _ => Err(Error::TypeMismatch(format!("{what}: expecting map type"))),
    }
}

pub(super) fn to_bstr(v: &Value, n: &str) -> Result<Vec<u8>, Error> {
    v.as_bytes()
        .cloned()
        .ok_or_else(|| Error::TypeMismatch(format!("{n} MUST be bstr")))
}

pub(super) fn to_tstr(v: &Value, n: &str) -> Result<String, Error> {
    v.as_text()
        .map(str::to_string)
        .ok_or_else(|| Error::TypeMismatch(format!("{n} MUST be tstr")))
}

pub(super) fn to_int(v: &Value, n: &str) -> Result<i128, Error> {
    v.as_integer()
        .map(i128::from)
        .ok_or_else(|| Error::TypeMismatch(format!("{n} MUST be int")))
}

pub(super) fn to_fixed<const N: usize>(v: &Value, n: &str) -> Result<[u8; N], Error> {
    let x = to_bstr(v, n)?;

    x.as_slice()
        .try_into()
        .map_err(|_| Error::Sema(format!("{n}: expecting {N} bytes, got {}", x.len())))
}

pub(super) fn to_hash_alg(v: &Value, n: &str) -> Result<String, Error> {
    let x = to_tstr(v, n)?;

    if !is_valid_hash(&x) {
        return Err(Error::Sema(format!("{n}: unknown hash algorithm {x}")));
    }

    Ok(x)
}

pub(super) fn to_measurement(v: &Value, n: &str) -> Result<Vec<u8>, Error> {
    let x = to_bstr(v, n)?;

    if !is_valid_measurement(&x) {
        return Err(Error::Sema(format!(
            "{n}: expecting 32, 48 or 64 bytes, got {}",
            x.len()
        )));
    }

    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_size() {
        let v = Value::Bytes(vec![1, 2, 3]);

        assert_eq!(to_fixed::<3>(&v, "x"), Ok([1, 2, 3]));
        assert!(matches!(to_fixed::<4>(&v, "x"), Err(Error::Sema(_))));
        assert!(matches!(
            to_fixed::<3>(&Value::Text("abc".to_string()), "x"),
            Err(Error::TypeMismatch(_))
        ));
    }

    #[test]
    fn hash_alg() {
        assert!(to_hash_alg(&Value::Text("sha-256".to_string()), "h").is_ok());
        assert!(matches!(
            to_hash_alg(&Value::Text("sha-257".to_string()), "h"),
            Err(Error::Sema(_))
        ));
    }

    #[test]
    fn lifecycle_ranges() {
        assert!(is_valid_lifecycle(0x3003));
        assert!(!is_valid_lifecycle(0x7000));
    }
}
