//! ScVal construction and decoding helpers
//!
//! Contract call arguments and simulation return values travel as XDR
//! `ScVal`s. This module owns the conversions in both directions: typed
//! Rust values into call arguments, and the `get_gigs` return vector back
//! into gig records.

use crate::error::{MarketplaceError, Result};
use stellar_xdr::curr::{
    Hash, ScAddress, ScMap, ScString, ScSymbol, ScVal, Uint256,
};

/// Wrap a string as an `ScVal`.
pub fn str_val(s: &str) -> Result<ScVal> {
    let inner = s
        .try_into()
        .map_err(|_| MarketplaceError::Build(format!("string too long for ScVal: {s:?}")))?;
    Ok(ScVal::String(ScString(inner)))
}

/// Wrap a symbol (short identifier) as an `ScVal`.
pub fn symbol_val(s: &str) -> Result<ScVal> {
    let inner = s
        .try_into()
        .map_err(|_| MarketplaceError::Build(format!("invalid symbol: {s:?}")))?;
    Ok(ScVal::Symbol(ScSymbol(inner)))
}

/// Wrap a u64 as an `ScVal`.
pub fn u64_val(n: u64) -> ScVal {
    ScVal::U64(n)
}

/// Parse a strkey address (`G...` account or `C...` contract) into an
/// `ScAddress`.
pub fn parse_address(addr: &str) -> Result<ScAddress> {
    if let Ok(pk) = stellar_strkey::ed25519::PublicKey::from_string(addr) {
        return Ok(ScAddress::Account(stellar_xdr::curr::AccountId(
            stellar_xdr::curr::PublicKey::PublicKeyTypeEd25519(Uint256(pk.0)),
        )));
    }
    if let Ok(contract) = stellar_strkey::Contract::from_string(addr) {
        return Ok(ScAddress::Contract(Hash(contract.0)));
    }
    Err(MarketplaceError::Build(format!("invalid address: {addr:?}")))
}

/// Wrap a strkey address as an `ScVal`.
pub fn addr_val(addr: &str) -> Result<ScVal> {
    Ok(ScVal::Address(parse_address(addr)?))
}

/// Render an `ScAddress` back into its strkey form.
pub fn address_to_string(addr: &ScAddress) -> String {
    match addr {
        ScAddress::Account(stellar_xdr::curr::AccountId(
            stellar_xdr::curr::PublicKey::PublicKeyTypeEd25519(Uint256(bytes)),
        )) => stellar_strkey::ed25519::PublicKey(*bytes).to_string(),
        ScAddress::Contract(Hash(bytes)) => stellar_strkey::Contract(*bytes).to_string(),
    }
}

/// A gig record as stored by the on-chain registry.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainGig {
    pub id: u64,
    pub title: String,
    pub description: String,
    /// Reward in stroops.
    pub reward: u64,
    pub poster: String,
    pub worker: Option<String>,
    pub status: u32,
    pub submissions: Vec<ChainSubmission>,
    pub payment_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChainSubmission {
    pub worker: String,
    pub link: String,
}

/// Decode the `get_gigs` return value (a vector of struct maps) into gig
/// records.
pub fn decode_gigs(val: &ScVal) -> Result<Vec<ChainGig>> {
    let entries = as_vec(val, "gig list")?;
    entries.iter().map(decode_gig).collect()
}

fn decode_gig(val: &ScVal) -> Result<ChainGig> {
    let map = as_map(val, "gig")?;
    Ok(ChainGig {
        id: get_u64(map, "id")?,
        title: get_string(map, "title")?,
        description: get_string(map, "description")?,
        reward: get_u64(map, "reward")?,
        poster: get_address(map, "poster")?,
        worker: get_optional(map, "worker")?
            .map(|v| as_address(v, "worker"))
            .transpose()?,
        status: get_u32(map, "status")?,
        submissions: decode_submissions(map)?,
        payment_hash: get_optional(map, "payment_hash")?
            .map(|v| as_string(v, "payment_hash"))
            .transpose()?,
    })
}

fn decode_submissions(map: &ScMap) -> Result<Vec<ChainSubmission>> {
    let Some(val) = map_get(map, "submissions") else {
        return Ok(vec![]);
    };
    if matches!(val, ScVal::Void) {
        return Ok(vec![]);
    }
    as_vec(val, "submissions")?
        .iter()
        .map(|entry| {
            let sub = as_map(entry, "submission")?;
            Ok(ChainSubmission {
                worker: get_address(sub, "worker")?,
                link: get_string(sub, "link")?,
            })
        })
        .collect()
}

/// Best-effort conversion of an `ScVal` into JSON, for the activity feed.
pub fn scval_to_json(val: &ScVal) -> serde_json::Value {
    use serde_json::Value;
    match val {
        ScVal::Void => Value::Null,
        ScVal::Bool(b) => Value::Bool(*b),
        ScVal::U32(n) => Value::from(*n),
        ScVal::I32(n) => Value::from(*n),
        ScVal::U64(n) => Value::from(*n),
        ScVal::I64(n) => Value::from(*n),
        ScVal::Timepoint(tp) => Value::from(tp.0),
        ScVal::Duration(d) => Value::from(d.0),
        ScVal::U128(parts) => {
            Value::String((((parts.hi as u128) << 64) | parts.lo as u128).to_string())
        }
        ScVal::I128(parts) => {
            Value::String((((parts.hi as i128) << 64) | parts.lo as i128).to_string())
        }
        ScVal::String(s) => Value::String(s.0.to_utf8_string_lossy()),
        ScVal::Symbol(s) => Value::String(s.0.to_utf8_string_lossy()),
        ScVal::Bytes(b) => Value::String(hex::encode(b.0.as_slice())),
        ScVal::Address(addr) => Value::String(address_to_string(addr)),
        ScVal::Vec(Some(vec)) => Value::Array(vec.0.iter().map(scval_to_json).collect()),
        ScVal::Vec(None) => Value::Array(vec![]),
        ScVal::Map(Some(map)) => {
            let mut object = serde_json::Map::new();
            for entry in map.0.iter() {
                let key = match scval_to_json(&entry.key) {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                object.insert(key, scval_to_json(&entry.val));
            }
            Value::Object(object)
        }
        ScVal::Map(None) => Value::Object(serde_json::Map::new()),
        other => Value::String(format!("{other:?}")),
    }
}

fn map_get<'a>(map: &'a ScMap, key: &str) -> Option<&'a ScVal> {
    map.0.iter().find_map(|entry| {
        let matches = match &entry.key {
            ScVal::Symbol(s) => s.0.to_utf8_string_lossy() == key,
            ScVal::String(s) => s.0.to_utf8_string_lossy() == key,
            _ => false,
        };
        matches.then_some(&entry.val)
    })
}

fn get_required<'a>(map: &'a ScMap, key: &str) -> Result<&'a ScVal> {
    map_get(map, key).ok_or_else(|| MarketplaceError::Decode(format!("missing field {key:?}")))
}

/// `Option<T>` fields arrive either as `Void` or as the bare inner value.
fn get_optional<'a>(map: &'a ScMap, key: &str) -> Result<Option<&'a ScVal>> {
    match map_get(map, key) {
        None | Some(ScVal::Void) => Ok(None),
        Some(val) => Ok(Some(val)),
    }
}

fn get_u64(map: &ScMap, key: &str) -> Result<u64> {
    match get_required(map, key)? {
        ScVal::U64(n) => Ok(*n),
        ScVal::U32(n) => Ok(*n as u64),
        other => Err(type_error(key, "u64", other)),
    }
}

fn get_u32(map: &ScMap, key: &str) -> Result<u32> {
    match get_required(map, key)? {
        ScVal::U32(n) => Ok(*n),
        other => Err(type_error(key, "u32", other)),
    }
}

fn get_string(map: &ScMap, key: &str) -> Result<String> {
    as_string(get_required(map, key)?, key)
}

fn get_address(map: &ScMap, key: &str) -> Result<String> {
    as_address(get_required(map, key)?, key)
}

fn as_string(val: &ScVal, context: &str) -> Result<String> {
    match val {
        ScVal::String(s) => Ok(s.0.to_utf8_string_lossy()),
        ScVal::Symbol(s) => Ok(s.0.to_utf8_string_lossy()),
        other => Err(type_error(context, "string", other)),
    }
}

fn as_address(val: &ScVal, context: &str) -> Result<String> {
    match val {
        ScVal::Address(addr) => Ok(address_to_string(addr)),
        other => Err(type_error(context, "address", other)),
    }
}

fn as_vec<'a>(val: &'a ScVal, context: &str) -> Result<&'a [ScVal]> {
    match val {
        ScVal::Vec(Some(vec)) => Ok(vec.0.as_slice()),
        ScVal::Vec(None) => Ok(&[]),
        other => Err(type_error(context, "vec", other)),
    }
}

fn as_map<'a>(val: &'a ScVal, context: &str) -> Result<&'a ScMap> {
    match val {
        ScVal::Map(Some(map)) => Ok(map),
        other => Err(type_error(context, "map", other)),
    }
}

fn type_error(context: &str, expected: &str, got: &ScVal) -> MarketplaceError {
    MarketplaceError::Decode(format!("{context}: expected {expected}, got {got:?}"))
}
