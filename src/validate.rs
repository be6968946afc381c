use ecdsa::signature::Verifier;
use p256::pkcs8::DecodePublicKey;
use sha2::Sha256;
use x509_cert::der::{DecodePem, Encode};

use crate::{
    cbor, decode::SignedMessage, target, BlackListStore, Certificate, StoreError, TrustStore,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// No active trust anchor is registered for the key identifier.
    KeyNotFound(String),
    /// The protected header announced a COSE algorithm outside the
    /// ES256/PS256 allow-list.
    UnsupportedAlgorithm(i64),
    /// The trust anchor's certificate could not be parsed or carries a key
    /// that does not fit the announced algorithm.
    KeyMaterial(String),
    InvalidSignature,
    Store(StoreError),
}

impl core::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ValidationError::KeyNotFound(kid) => {
                write!(f, "no trust anchor found for key identifier {kid}")
            }
            ValidationError::UnsupportedAlgorithm(id) => {
                write!(f, "unsupported signature algorithm {id}")
            }
            ValidationError::KeyMaterial(s) => write!(f, "unusable trust anchor: {s}"),
            ValidationError::InvalidSignature => write!(f, "signature verification failed"),
            ValidationError::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<StoreError> for ValidationError {
    fn from(value: StoreError) -> Self {
        ValidationError::Store(value)
    }
}

/// The closed algorithm allow-list. Anything else is rejected outright, even
/// if the key material could technically support it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Algorithm {
    /// COSE -7, ECDSA over P-256 with SHA-256.
    Es256,
    /// COSE -37, RSASSA-PSS with SHA-256.
    Ps256,
}

impl Algorithm {
    fn from_id(id: i64) -> Result<Self, ValidationError> {
        match id {
            -7 => Ok(Algorithm::Es256),
            -37 => Ok(Algorithm::Ps256),
            other => Err(ValidationError::UnsupportedAlgorithm(other)),
        }
    }
}

/// Serializes the `Signature1` structure over the original protected-header
/// and payload bytes. The external additional-authenticated-data slot is an
/// empty byte string for this profile.
fn to_be_signed(protected: &[u8], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(protected.len() + payload.len() + 32);
    cbor::write_array_head(&mut out, 4);
    cbor::write_text(&mut out, "Signature1");
    cbor::write_bytes(&mut out, protected);
    cbor::write_bytes(&mut out, &[]);
    cbor::write_bytes(&mut out, payload);
    out
}

/// Extracts the SubjectPublicKeyInfo from a PEM certificate as DER bytes.
fn verifying_spki(pem: &str) -> Result<Vec<u8>, ValidationError> {
    let certificate = x509_cert::Certificate::from_pem(pem)
        .map_err(|e| ValidationError::KeyMaterial(e.to_string()))?;
    certificate
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| ValidationError::KeyMaterial(e.to_string()))
}

fn verify_es256(spki: &[u8], message: &[u8], signature: &[u8]) -> Result<(), ValidationError> {
    let key = p256::ecdsa::VerifyingKey::from_public_key_der(spki)
        .map_err(|e| ValidationError::KeyMaterial(e.to_string()))?;
    // COSE carries the raw r||s pair, not an ASN.1 DER sequence.
    let signature = p256::ecdsa::Signature::from_slice(signature)
        .map_err(|_| ValidationError::InvalidSignature)?;
    key.verify(message, &signature)
        .map_err(|_| ValidationError::InvalidSignature)
}

fn verify_ps256(spki: &[u8], message: &[u8], signature: &[u8]) -> Result<(), ValidationError> {
    let key = rsa::RsaPublicKey::from_public_key_der(spki)
        .map_err(|e| ValidationError::KeyMaterial(e.to_string()))?;
    let key = rsa::pss::VerifyingKey::<Sha256>::new(key);
    let signature =
        rsa::pss::Signature::try_from(signature).map_err(|_| ValidationError::InvalidSignature)?;
    key.verify(message, &signature)
        .map_err(|_| ValidationError::InvalidSignature)
}

/// Verifies a COSE_Sign1 message against the trust anchor registered for
/// `kid`. Inactive anchors are treated the same as unknown key identifiers.
pub(crate) fn verify_signature(
    message: &SignedMessage,
    kid: &str,
    trust_store: &impl TrustStore,
) -> Result<(), ValidationError> {
    let anchor = trust_store
        .trust_anchor_by_kid(kid)?
        .filter(|anchor| anchor.active)
        .ok_or_else(|| ValidationError::KeyNotFound(kid.to_string()))?;

    let algorithm = Algorithm::from_id(message.algorithm_id)?;
    let spki = verifying_spki(&anchor.certificate_pem)?;
    let signed = to_be_signed(&message.protected_raw, &message.payload_raw);

    match algorithm {
        Algorithm::Es256 => verify_es256(&spki, &signed, &message.signature),
        Algorithm::Ps256 => verify_ps256(&spki, &signed, &message.signature),
    }
}

/// Business rules a certificate must meet beyond a valid signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationPolicy {
    /// CWT issuers (country codes) accepted by [`CertificateValidator`],
    /// compared case-insensitively.
    pub allowed_issuers: Vec<String>,
    /// Disease-agent target the vaccination entry must name.
    pub target: String,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            allowed_issuers: vec!["sk".to_string(), "cz".to_string()],
            target: target::COVID19.to_string(),
        }
    }
}

/// Decides whether a signature-verified certificate currently grants a
/// "fully vaccinated" status under a [`ValidationPolicy`].
pub struct CertificateValidator<B> {
    black_list_store: B,
    policy: ValidationPolicy,
}

impl<B: BlackListStore> CertificateValidator<B> {
    pub fn new(black_list_store: B) -> Self {
        Self::with_policy(black_list_store, ValidationPolicy::default())
    }

    pub fn with_policy(black_list_store: B, policy: ValidationPolicy) -> Self {
        Self {
            black_list_store,
            policy,
        }
    }

    /// Whether the certificate proves a complete, unexpired, unrevoked
    /// vaccination by an allowed issuer.
    ///
    /// Policy misses are `Ok(false)`; only a failing blacklist lookup turns
    /// into an error. The blacklist is consulted last, so certificates that
    /// already failed a policy check never hit the store.
    pub fn is_valid(&self, certificate: &Certificate) -> Result<bool, StoreError> {
        let Some(vaccination) = certificate.vaccination_entry() else {
            return Ok(false);
        };
        if vaccination.target != self.policy.target
            || !vaccination.is_fully_vaccinated()
            || certificate.is_expired()
            || !self.is_issuer_allowed(&certificate.issuer)
        {
            return Ok(false);
        }
        Ok(!self.is_on_black_list(certificate)?)
    }

    fn is_issuer_allowed(&self, issuer: &str) -> bool {
        self.policy
            .allowed_issuers
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(issuer))
    }

    /// Whether the vaccination entry's certificate id appears on the
    /// revocation list. Only vaccination entries are subject to the list;
    /// any other certificate is never listed.
    pub fn is_on_black_list(&self, certificate: &Certificate) -> Result<bool, StoreError> {
        let Some(vaccination) = certificate.vaccination_entry() else {
            return Ok(false);
        };
        Ok(!self
            .black_list_store
            .items_by_cert_id(&vaccination.certificate_id)?
            .is_empty())
    }
}
