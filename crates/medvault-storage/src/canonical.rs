//! Canonical object addresses and the normalizer that maps stored URL shapes onto them.
//!
//! A canonical address is `/api/objects/<key>`. It is also the client-facing
//! download route, so the reverse mapping is the identity.

use medvault_core::constants::{OBJECT_API_PREFIX, UPLOADS_SEGMENT};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// The stored value matched none of the known reference shapes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unrecognized object reference format: {input}")]
pub struct UnrecognizedFormat {
    pub input: String,
}

impl UnrecognizedFormat {
    fn new(input: &str) -> Self {
        Self {
            input: input.to_string(),
        }
    }
}

/// `/api/objects/<bucket-relative-key>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CanonicalAddress(String);

impl CanonicalAddress {
    /// Build the address of a bucket-relative key.
    pub fn from_key(key: &str) -> Result<Self, UnrecognizedFormat> {
        if !is_valid_key(key) {
            return Err(UnrecognizedFormat::new(key));
        }
        Ok(Self(format!("{}/{}", OBJECT_API_PREFIX, key)))
    }

    /// Strict parse: only the canonical shape itself is accepted.
    pub fn parse(address: &str) -> Result<Self, UnrecognizedFormat> {
        address
            .strip_prefix(OBJECT_API_PREFIX)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| UnrecognizedFormat::new(address))
            .and_then(Self::from_key)
            .map_err(|_| UnrecognizedFormat::new(address))
    }

    /// Address served for the trailing wildcard of the download route.
    ///
    /// The request path goes through [`normalize`] like any stored reference. A
    /// tail the normalizer would rewrite (a decoded `?` or `#`) is refused rather
    /// than served under another key.
    pub fn from_route_tail(tail: &str) -> Result<Self, UnrecognizedFormat> {
        let key = tail.trim_start_matches('/');
        match normalize(&format!("{}/{}", OBJECT_API_PREFIX, key)) {
            Ok(address) if address.key() == key => Ok(address),
            _ => Err(UnrecognizedFormat::new(tail)),
        }
    }

    pub fn key(&self) -> &str {
        &self.0[OBJECT_API_PREFIX.len() + 1..]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Client-facing route serving this object.
    pub fn api_route(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Display for CanonicalAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CanonicalAddress {
    type Error = UnrecognizedFormat;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CanonicalAddress> for String {
    fn from(address: CanonicalAddress) -> Self {
        address.0
    }
}

fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..")
}

/// Map a stored URL or path onto its canonical address.
///
/// Accepted shapes, in priority order:
/// 1. `/api/objects/<key>` (returned unchanged)
/// 2. a proxy path missing the API prefix: `uploads/<id>`, `/uploads/<id>`
///    or the legacy route `/objects/<key>`
/// 3. a platform object URL `.../object/(public|sign)/<bucket>/<key...>`
///
/// Anything else is [`UnrecognizedFormat`]. Matching works on whole path
/// segments, so `my-uploads/x` or `/files/uploads/x` never match rule 2.
pub fn normalize(raw: &str) -> Result<CanonicalAddress, UnrecognizedFormat> {
    let trimmed = raw.trim();
    let without_query = trimmed
        .split(['?', '#'])
        .next()
        .unwrap_or_default();

    let (is_absolute_url, path) = match without_query.split_once("://") {
        Some((_, rest)) => (true, rest.find('/').map(|i| &rest[i..]).unwrap_or("")),
        None => (false, without_query),
    };

    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();

    if !is_absolute_url {
        if let Some(address) = match_api_route(&segments) {
            return address.map_err(|_| UnrecognizedFormat::new(raw));
        }
        if segments.len() > 1 && segments[0] == UPLOADS_SEGMENT {
            return CanonicalAddress::from_key(&segments.join("/"))
                .map_err(|_| UnrecognizedFormat::new(raw));
        }
        if let Some(address) = match_legacy_route(&segments) {
            return address.map_err(|_| UnrecognizedFormat::new(raw));
        }
    }

    if let Some(key) = match_platform_object(&segments) {
        return CanonicalAddress::from_key(&key).map_err(|_| UnrecognizedFormat::new(raw));
    }

    Err(UnrecognizedFormat::new(raw))
}

fn match_api_route(segments: &[&str]) -> Option<Result<CanonicalAddress, UnrecognizedFormat>> {
    let prefix: Vec<&str> = OBJECT_API_PREFIX.trim_start_matches('/').split('/').collect();
    if segments.len() < prefix.len() || segments[..prefix.len()] != prefix[..] {
        return None;
    }
    Some(CanonicalAddress::from_key(&segments[prefix.len()..].join("/")))
}

/// `objects/<key>`: the download route as served before it moved under `/api`.
fn match_legacy_route(segments: &[&str]) -> Option<Result<CanonicalAddress, UnrecognizedFormat>> {
    let route = OBJECT_API_PREFIX.rsplit('/').next().unwrap_or_default();
    match segments.split_first() {
        Some((first, rest)) if *first == route && !rest.is_empty() => {
            Some(CanonicalAddress::from_key(&rest.join("/")))
        }
        _ => None,
    }
}

fn match_platform_object(segments: &[&str]) -> Option<String> {
    segments.windows(3).enumerate().find_map(|(i, window)| {
        let is_object_url = window[0] == "object"
            && (window[1] == "public" || window[1] == "sign")
            && !window[2].is_empty();
        let rest = &segments[i + 3..];
        (is_object_url && !rest.is_empty()).then(|| rest.join("/"))
    })
}
