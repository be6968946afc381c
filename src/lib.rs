#![doc = include_str!("../README.md")]
#![cfg(not(doctest))]

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;

mod cbor;
mod decode;
mod validate;

pub use decode::{decode_and_verify, DecodeError};
pub use validate::{CertificateValidator, ValidationError, ValidationPolicy};

#[cfg(feature = "json")]
use serde::{Deserialize, Serialize};

/// Disease-agent target codes used in HCERT entries.
pub mod target {
    /// SNOMED CT code for COVID-19.
    pub const COVID19: &str = "840539006";
}

/// The person a certificate makes assertions about.
///
/// `date_of_birth` is either empty (unknown) or an ISO 8601 date truncated
/// to year, month or day precision, with the year restricted to 19xx/20xx.
/// Construction through [`Subject::new`] enforces this. Some producers
/// append a time-of-day to the date; [`Subject::new`] drops everything from
/// the first `T` on before validating, so `"1990-05-12T00:00:00"` is
/// accepted and stored as `"1990-05-12"`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "json", derive(Serialize))]
pub struct Subject {
    first_name: String,
    last_name: String,
    date_of_birth: String,
}

static DATE_OF_BIRTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^((19|20)\d\d(-\d\d){0,2})?$").unwrap());

impl Subject {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        date_of_birth: impl Into<String>,
    ) -> Result<Self, DecodeError> {
        let mut date_of_birth = date_of_birth.into();
        if let Some(suffix) = date_of_birth.find('T') {
            date_of_birth.truncate(suffix);
        }
        if !DATE_OF_BIRTH.is_match(&date_of_birth) {
            return Err(DecodeError::SubjectValidation(format!(
                "invalid date of birth: {date_of_birth}"
            )));
        }
        Ok(Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            date_of_birth,
        })
    }

    #[must_use]
    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    #[must_use]
    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    #[must_use]
    pub fn date_of_birth(&self) -> &str {
        &self.date_of_birth
    }
}

/// A single vaccination event (`v` claim group).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "json", derive(Serialize))]
pub struct VaccinationEntry {
    pub target: String,
    pub vaccine_type: String,
    pub vaccine_product: String,
    pub vaccine_company: String,
    pub doses_received: u32,
    pub doses_required: u32,
    pub vaccination_date: String,
    pub country_code: String,
    pub certificate_issuer: String,
    pub certificate_id: String,
}

impl VaccinationEntry {
    /// A schedule is complete once the received dose count reaches the
    /// required count, boosters included (e.g. 3/3).
    #[must_use]
    pub fn is_fully_vaccinated(&self) -> bool {
        self.doses_received >= self.doses_required
    }
}

/// A single test event (`t` claim group).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "json", derive(Serialize))]
pub struct TestEntry {
    pub target: String,
    pub test_type: String,
    pub test_name: Option<String>,
    pub test_device_id: Option<String>,
    pub test_date: String,
    pub test_result: String,
    pub testing_facility: Option<String>,
    pub country_code: String,
    pub certificate_issuer: String,
    pub certificate_id: String,
}

impl TestEntry {
    /// SNOMED CT "detected".
    pub const RESULT_DETECTED: &'static str = "260373001";
    /// SNOMED CT "not detected".
    pub const RESULT_NOT_DETECTED: &'static str = "260415000";

    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.test_result == Self::RESULT_DETECTED
    }

    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.test_result == Self::RESULT_NOT_DETECTED
    }
}

/// A recovery statement (`r` claim group).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "json", derive(Serialize))]
pub struct RecoveryEntry {
    pub target: String,
    pub test_date: String,
    pub country_code: String,
    pub valid_from: String,
    pub valid_until: String,
    pub certificate_issuer: String,
    pub certificate_id: String,
}

impl RecoveryEntry {
    /// Whether `valid_until` lies in the past. The field is a date or an
    /// RFC 3339 timestamp; a value that parses as neither counts as
    /// expired rather than granting open-ended validity.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        match parse_point_in_time(&self.valid_until) {
            Some(until) => Utc::now() > until,
            None => true,
        }
    }
}

fn parse_point_in_time(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Some(timestamp.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// The one fact a certificate asserts. A payload pathologically carrying
/// more than one claim group is reduced to a single entry at mapping time,
/// with vaccination taking precedence over test over recovery.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "json", derive(Serialize))]
pub enum CertificateEntry {
    Vaccination(VaccinationEntry),
    Test(TestEntry),
    Recovery(RecoveryEntry),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "json", derive(Serialize))]
pub enum CertificateType {
    None = 0b000,
    Vaccination = 0b001,
    Test = 0b010,
    Recovery = 0b100,
}

/// A decoded and signature-verified health certificate.
///
/// Instances only leave this crate through [`decode_and_verify`], so holding
/// a `Certificate` means the COSE signature checked out against a trust
/// anchor. Business validity (expiry, issuer policy, revocation) is a
/// separate question answered by [`CertificateValidator`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "json", derive(Serialize))]
pub struct Certificate {
    pub issuer: String,
    pub issued_at: Option<i64>,
    pub expires_at: Option<i64>,
    /// Key identifier of the signing certificate, base64-encoded.
    pub kid: String,
    pub subject: Subject,
    pub entry: Option<CertificateEntry>,
}

impl Certificate {
    #[must_use]
    pub fn vaccination_entry(&self) -> Option<&VaccinationEntry> {
        match &self.entry {
            Some(CertificateEntry::Vaccination(v)) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn test_entry(&self) -> Option<&TestEntry> {
        match &self.entry {
            Some(CertificateEntry::Test(t)) => Some(t),
            _ => None,
        }
    }

    #[must_use]
    pub fn recovery_entry(&self) -> Option<&RecoveryEntry> {
        match &self.entry {
            Some(CertificateEntry::Recovery(r)) => Some(r),
            _ => None,
        }
    }

    #[must_use]
    pub fn certificate_type(&self) -> CertificateType {
        match &self.entry {
            Some(CertificateEntry::Vaccination(_)) => CertificateType::Vaccination,
            Some(CertificateEntry::Test(_)) => CertificateType::Test,
            Some(CertificateEntry::Recovery(_)) => CertificateType::Recovery,
            None => CertificateType::None,
        }
    }

    /// Whether the CWT `exp` claim lies in the past. Certificates without
    /// an expiry never expire.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        matches!(self.expires_at, Some(expires_at) if expires_at < Utc::now().timestamp())
    }

    /// Content fingerprint over subject name, date of birth and issuer,
    /// for deduplication and display. Not usable for trust decisions.
    #[must_use]
    pub fn certificate_hash(&self) -> String {
        let fingerprint = format!(
            "{}{}{}{}",
            self.subject.first_name.to_lowercase(),
            self.subject.date_of_birth,
            self.subject.last_name.to_lowercase(),
            self.issuer.to_lowercase()
        );
        format!("{:x}", md5::compute(fingerprint))
    }

    /// Dose progress of a COVID-19 vaccination entry as `"received/required"`,
    /// or an empty string for any other certificate.
    #[must_use]
    pub fn batch_status(&self) -> String {
        match self.vaccination_entry() {
            Some(v) if v.target == target::COVID19 => {
                format!("{}/{}", v.doses_received, v.doses_required)
            }
            _ => String::new(),
        }
    }

    #[cfg(feature = "json")]
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// A certificate trusted to validate signatures for one key identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "json", derive(Deserialize, Serialize))]
pub struct TrustAnchor {
    pub certificate_type: String,
    pub country: String,
    /// Key identifier, base64-encoded.
    pub kid: String,
    /// PEM-encoded X.509 certificate carrying the verification key.
    pub certificate_pem: String,
    pub active: bool,
    pub change_id: i64,
}

/// One revoked certificate id on the issuer's revocation list.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "json", derive(Deserialize, Serialize))]
pub struct BlackListItem {
    pub certificate_id: String,
    pub change_id: i64,
}

/// Failure of an external lookup service. Distinct from "not found": a
/// store that cannot answer must return this instead of an empty result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError(String);

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for StoreError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "store lookup failed: {}", self.0)
    }
}

impl std::error::Error for StoreError {}

/// Resolves trust anchors by key identifier.
pub trait TrustStore {
    /// `Ok(None)` means the key identifier is unknown; `Err` means the
    /// anchor set could not be retrieved or parsed.
    fn trust_anchor_by_kid(&self, kid: &str) -> Result<Option<TrustAnchor>, StoreError>;
}

/// Resolves revocation-list entries by certificate id.
pub trait BlackListStore {
    /// An empty vec means the certificate is not revoked.
    fn items_by_cert_id(&self, certificate_id: &str) -> Result<Vec<BlackListItem>, StoreError>;
}

#[cfg(test)]
pub(crate) mod fixtures;
