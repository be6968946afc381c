use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use flate2::read::ZlibDecoder;
use semver::{Version, VersionReq};
use std::io::Read;

use crate::{
    cbor::{self, Value},
    validate, Certificate, CertificateEntry, RecoveryEntry, Subject, TestEntry, TrustStore,
    VaccinationEntry, ValidationError,
};

/// Literal marker opening every 2D-code payload.
pub const FORMAT_MARKER: &str = "HC1:";

/// First byte of a zlib stream with deflate compression.
const ZLIB_MARKER: u8 = 0x78;

const COSE_SIGN1_TAG: u64 = 18;
const HEADER_ALGORITHM: i64 = 1;
const HEADER_KID: i64 = 4;

const CLAIM_ISSUER: i64 = 1;
const CLAIM_EXPIRES_AT: i64 = 4;
const CLAIM_ISSUED_AT: i64 = 6;
const CLAIM_HCERT: i64 = -260;
const CLAIM_HCERT_V1: i64 = 1;

const SUPPORTED_VERSIONS: &str = "^1.0.0";

#[derive(Debug, PartialEq)]
pub enum DecodeError {
    /// The input does not start with `HC1:`.
    MissingFormatMarker,
    InvalidBase45Encoding(String),
    InvalidCompressedData(String),
    MalformedBinaryObject(String),
    /// The top-level CBOR item is not a tag-18 COSE_Sign1 wrapper.
    NotASignedMessage,
    InvalidMessageShape(String),
    InvalidHeader(String),
    /// Neither header carries a key identifier (label 4).
    MissingKeyIdentifier,
    InvalidPayload(String),
    /// The CWT has no hcert claim (-260/1).
    MissingHealthClaims,
    UnsupportedVersion(String),
    InvalidPayloadShape(String),
    SubjectValidation(String),
    Validation(ValidationError),
}

impl core::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DecodeError::MissingFormatMarker => {
                write!(f, "certificate text does not start with {FORMAT_MARKER:?}")
            }
            DecodeError::InvalidBase45Encoding(s) => write!(f, "invalid base45 encoding: {s}"),
            DecodeError::InvalidCompressedData(s) => write!(f, "invalid zlib data: {s}"),
            DecodeError::MalformedBinaryObject(s) => write!(f, "malformed CBOR: {s}"),
            DecodeError::NotASignedMessage => write!(f, "no COSE_Sign1 tag found"),
            DecodeError::InvalidMessageShape(s) => write!(f, "invalid COSE message: {s}"),
            DecodeError::InvalidHeader(s) => write!(f, "invalid COSE header: {s}"),
            DecodeError::MissingKeyIdentifier => write!(f, "COSE header carries no key identifier"),
            DecodeError::InvalidPayload(s) => write!(f, "invalid COSE payload: {s}"),
            DecodeError::MissingHealthClaims => write!(f, "payload carries no hcert claim"),
            DecodeError::UnsupportedVersion(s) => write!(f, "unsupported hcert version: {s}"),
            DecodeError::InvalidPayloadShape(s) => write!(f, "missing or mistyped field: {s}"),
            DecodeError::SubjectValidation(s) => write!(f, "{s}"),
            DecodeError::Validation(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<ValidationError> for DecodeError {
    fn from(value: ValidationError) -> Self {
        DecodeError::Validation(value)
    }
}

const BASE45_ALPHABET: &[u8; 45] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ $%*+-./:";

fn base45_digit(c: char) -> Result<u32, DecodeError> {
    BASE45_ALPHABET
        .iter()
        .position(|&a| a == c as u8 && c.is_ascii())
        .map(|p| p as u32)
        .ok_or_else(|| {
            DecodeError::InvalidBase45Encoding(format!("character {c:?} is not in the alphabet"))
        })
}

/// Decodes the RFC 9285 base45 alphabet: three characters carry two bytes,
/// a trailing pair carries one byte, a trailing single character is invalid.
fn base45_decode(input: &str) -> Result<Vec<u8>, DecodeError> {
    let digits = input
        .chars()
        .map(base45_digit)
        .collect::<Result<Vec<_>, _>>()?;

    let mut out = Vec::with_capacity(digits.len() / 3 * 2 + 1);
    for group in digits.chunks(3) {
        match *group {
            [c, d, e] => {
                let value = c + d * 45 + e * 2025;
                if value > 0xffff {
                    return Err(DecodeError::InvalidBase45Encoding(format!(
                        "group value {value} exceeds two bytes"
                    )));
                }
                out.extend_from_slice(&(value as u16).to_be_bytes());
            }
            [c, d] => {
                let value = c + d * 45;
                if value > 0xff {
                    return Err(DecodeError::InvalidBase45Encoding(format!(
                        "group value {value} exceeds one byte"
                    )));
                }
                out.push(value as u8);
            }
            _ => {
                return Err(DecodeError::InvalidBase45Encoding(
                    "trailing single character".into(),
                ))
            }
        }
    }
    Ok(out)
}

/// Reverses the text/compression envelope: marker, base45, optional zlib.
pub(crate) fn unwrap_transport(raw: &str) -> Result<Vec<u8>, DecodeError> {
    let body = raw
        .strip_prefix(FORMAT_MARKER)
        .ok_or(DecodeError::MissingFormatMarker)?;
    let decoded = base45_decode(body)?;

    if decoded.first() == Some(&ZLIB_MARKER) {
        let mut inflated = Vec::new();
        ZlibDecoder::new(decoded.as_slice())
            .read_to_end(&mut inflated)
            .map_err(|e| DecodeError::InvalidCompressedData(e.to_string()))?;
        Ok(inflated)
    } else {
        Ok(decoded)
    }
}

/// A parsed COSE_Sign1 message. `protected_raw` and `payload_raw` are the
/// byte strings exactly as received; the verifier rebuilds the signed
/// sequence from them, so they are never re-encoded.
#[derive(Debug)]
pub(crate) struct SignedMessage {
    pub(crate) protected_raw: Vec<u8>,
    pub(crate) payload_raw: Vec<u8>,
    pub(crate) signature: Vec<u8>,
    pub(crate) algorithm_id: i64,
    kid: Vec<u8>,
    claims: Vec<(Value, Value)>,
}

impl SignedMessage {
    /// Key identifier in the form trust stores are keyed by.
    pub(crate) fn kid_base64(&self) -> String {
        BASE64.encode(&self.kid)
    }
}

fn parse_signed_message(data: &[u8]) -> Result<SignedMessage, DecodeError> {
    let top = cbor::decode(data)?;
    let Value::Tag(COSE_SIGN1_TAG, inner) = top else {
        return Err(DecodeError::NotASignedMessage);
    };
    let Value::Array(items) = *inner else {
        return Err(DecodeError::InvalidMessageShape(
            "tag content is not an array".into(),
        ));
    };
    if items.len() < 4 {
        return Err(DecodeError::InvalidMessageShape(format!(
            "expected 4 elements, found {}",
            items.len()
        )));
    }

    let protected_raw = items[0]
        .as_bytes()
        .ok_or_else(|| {
            DecodeError::InvalidMessageShape("protected header is not a byte string".into())
        })?
        .to_vec();
    let payload_raw = items[2]
        .as_bytes()
        .ok_or_else(|| DecodeError::InvalidMessageShape("payload is not a byte string".into()))?
        .to_vec();
    let signature = items[3]
        .as_bytes()
        .ok_or_else(|| DecodeError::InvalidMessageShape("signature is not a byte string".into()))?
        .to_vec();

    let protected = cbor::decode(&protected_raw)?
        .as_map()
        .ok_or_else(|| DecodeError::InvalidHeader("protected header is not a map".into()))?
        .to_vec();
    let unprotected = items[1]
        .as_map()
        .ok_or_else(|| DecodeError::InvalidHeader("unprotected header is not a map".into()))?;

    // The algorithm must sit in the protected (signed) header; taking it
    // from the unprotected map would let an attacker pick the algorithm.
    let algorithm_id = cbor::map_get(&protected, HEADER_ALGORITHM)
        .and_then(Value::as_integer)
        .ok_or_else(|| {
            DecodeError::InvalidHeader("protected header carries no algorithm identifier".into())
        })?;

    // Merge order mirrors observed producers: unprotected entries overwrite
    // protected ones on key collision.
    let mut headers = protected;
    for (key, value) in unprotected {
        match headers.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.clone(),
            None => headers.push((key.clone(), value.clone())),
        }
    }

    // The kid is nominally a byte string, but some producers emit it as
    // text; its raw bytes serve either way.
    let kid = match cbor::map_get(&headers, HEADER_KID) {
        Some(Value::Bytes(bytes)) => bytes.clone(),
        Some(Value::Text(text)) => text.as_bytes().to_vec(),
        Some(_) => {
            return Err(DecodeError::InvalidHeader(
                "key identifier is neither a byte string nor text".into(),
            ))
        }
        None => return Err(DecodeError::MissingKeyIdentifier),
    };

    let claims = cbor::decode(&payload_raw)?
        .as_map()
        .ok_or_else(|| DecodeError::InvalidPayload("payload is not a CWT claim map".into()))?
        .to_vec();

    Ok(SignedMessage {
        protected_raw,
        payload_raw,
        signature,
        algorithm_id,
        kid,
        claims,
    })
}

fn required_text(entry: &[(Value, Value)], key: &str, field: &str) -> Result<String, DecodeError> {
    cbor::map_get_text(entry, key)
        .and_then(Value::as_text)
        .map(str::to_string)
        .ok_or_else(|| DecodeError::InvalidPayloadShape(field.to_string()))
}

fn optional_text(entry: &[(Value, Value)], key: &str) -> Option<String> {
    cbor::map_get_text(entry, key)
        .and_then(Value::as_text)
        .map(str::to_string)
}

/// Dose counters arrive as CBOR integers, but some producers emit them as
/// decimal text. Both are accepted, anything else is a shape error.
fn required_count(entry: &[(Value, Value)], key: &str, field: &str) -> Result<u32, DecodeError> {
    let value =
        cbor::map_get_text(entry, key).ok_or_else(|| DecodeError::InvalidPayloadShape(field.to_string()))?;
    match value {
        Value::Integer(i) => u32::try_from(*i).ok(),
        Value::Text(t) => t.parse().ok(),
        _ => None,
    }
    .ok_or_else(|| DecodeError::InvalidPayloadShape(field.to_string()))
}

fn claim_group<'m>(
    hcert: &'m [(Value, Value)],
    key: &str,
) -> Result<Option<&'m [(Value, Value)]>, DecodeError> {
    let Some(group) = cbor::map_get_text(hcert, key) else {
        return Ok(None);
    };
    group
        .as_array()
        .and_then(|items| items.first())
        .and_then(Value::as_map)
        .map(Some)
        .ok_or_else(|| DecodeError::InvalidPayloadShape(format!("{key}[0]")))
}

fn vaccination_entry(entry: &[(Value, Value)]) -> Result<VaccinationEntry, DecodeError> {
    Ok(VaccinationEntry {
        target: required_text(entry, "tg", "v[0].tg")?,
        vaccine_type: required_text(entry, "vp", "v[0].vp")?,
        vaccine_product: required_text(entry, "mp", "v[0].mp")?,
        vaccine_company: required_text(entry, "ma", "v[0].ma")?,
        doses_received: required_count(entry, "dn", "v[0].dn")?,
        doses_required: required_count(entry, "sd", "v[0].sd")?,
        vaccination_date: required_text(entry, "dt", "v[0].dt")?,
        country_code: required_text(entry, "co", "v[0].co")?,
        certificate_issuer: required_text(entry, "is", "v[0].is")?,
        certificate_id: required_text(entry, "ci", "v[0].ci")?,
    })
}

fn test_entry(entry: &[(Value, Value)]) -> Result<TestEntry, DecodeError> {
    Ok(TestEntry {
        target: required_text(entry, "tg", "t[0].tg")?,
        test_type: required_text(entry, "tt", "t[0].tt")?,
        test_name: optional_text(entry, "nm"),
        test_device_id: optional_text(entry, "ma"),
        test_date: required_text(entry, "sc", "t[0].sc")?,
        test_result: required_text(entry, "tr", "t[0].tr")?,
        testing_facility: optional_text(entry, "tc"),
        country_code: required_text(entry, "co", "t[0].co")?,
        certificate_issuer: required_text(entry, "is", "t[0].is")?,
        certificate_id: required_text(entry, "ci", "t[0].ci")?,
    })
}

fn recovery_entry(entry: &[(Value, Value)]) -> Result<RecoveryEntry, DecodeError> {
    Ok(RecoveryEntry {
        target: required_text(entry, "tg", "r[0].tg")?,
        test_date: required_text(entry, "fr", "r[0].fr")?,
        country_code: required_text(entry, "co", "r[0].co")?,
        valid_from: required_text(entry, "df", "r[0].df")?,
        valid_until: required_text(entry, "du", "r[0].du")?,
        certificate_issuer: required_text(entry, "is", "r[0].is")?,
        certificate_id: required_text(entry, "ci", "r[0].ci")?,
    })
}

fn optional_timestamp(
    claims: &[(Value, Value)],
    key: i64,
    field: &str,
) -> Result<Option<i64>, DecodeError> {
    match cbor::map_get(claims, key) {
        None => Ok(None),
        Some(value) => value
            .as_integer()
            .map(Some)
            .ok_or_else(|| DecodeError::InvalidPayloadShape(field.to_string())),
    }
}

/// Maps verified CWT claims into the domain model.
fn map_payload(claims: &[(Value, Value)], kid: String) -> Result<Certificate, DecodeError> {
    let hcert = cbor::map_get(claims, CLAIM_HCERT)
        .and_then(Value::as_map)
        .and_then(|container| cbor::map_get(container, CLAIM_HCERT_V1))
        .and_then(Value::as_map)
        .ok_or(DecodeError::MissingHealthClaims)?;

    let version = required_text(hcert, "ver", "ver")?;
    let supported = VersionReq::parse(SUPPORTED_VERSIONS).expect("const range parses");
    match Version::parse(&version) {
        Ok(parsed) if supported.matches(&parsed) => {}
        _ => return Err(DecodeError::UnsupportedVersion(version)),
    }

    // Strict claim-group precedence: a payload that carries several groups
    // yields its vaccination entry, then test, then recovery.
    let entry = if let Some(group) = claim_group(hcert, "v")? {
        Some(CertificateEntry::Vaccination(vaccination_entry(group)?))
    } else if let Some(group) = claim_group(hcert, "t")? {
        Some(CertificateEntry::Test(test_entry(group)?))
    } else if let Some(group) = claim_group(hcert, "r")? {
        Some(CertificateEntry::Recovery(recovery_entry(group)?))
    } else {
        None
    };

    let name = cbor::map_get_text(hcert, "nam")
        .and_then(Value::as_map)
        .ok_or_else(|| DecodeError::InvalidPayloadShape("nam".into()))?;
    let given_name = required_text(name, "gn", "nam.gn")?;
    let family_name = required_text(name, "fn", "nam.fn")?;
    let date_of_birth = required_text(hcert, "dob", "dob")?;
    let subject = Subject::new(given_name, family_name, date_of_birth)?;

    let issuer = cbor::map_get(claims, CLAIM_ISSUER)
        .and_then(Value::as_text)
        .map(str::to_string)
        .ok_or_else(|| DecodeError::InvalidPayloadShape("iss".into()))?;
    let issued_at = optional_timestamp(claims, CLAIM_ISSUED_AT, "iat")?;
    let expires_at = optional_timestamp(claims, CLAIM_EXPIRES_AT, "exp")?;

    Ok(Certificate {
        issuer,
        issued_at,
        expires_at,
        kid,
        subject,
        entry,
    })
}

/// Decodes a `HC1:` certificate string, verifies its signature against the
/// trust store and maps the claims into a [`Certificate`].
///
/// Every stage fails closed: malformed structure, unknown key identifiers,
/// unsupported algorithms and bad signatures are all hard errors. Only a
/// certificate whose signature verified is ever returned.
pub fn decode_and_verify(
    raw: &str,
    trust_store: &impl TrustStore,
) -> Result<Certificate, DecodeError> {
    let data = unwrap_transport(raw)?;
    let message = parse_signed_message(&data)?;
    let kid = message.kid_base64();
    validate::verify_signature(&message, &kid, trust_store)?;
    map_payload(&message.claims, kid)
}
