//! Integrity fields carried by every signable record.

use serde::{Deserialize, Serialize};

use keystone_core::{Record, RecordId};

/// Scheme label persisted next to each signature.
///
/// This is a fixed label, independent of the digest the HSM applies
/// internally.
pub const SIGN_ALGORITHM: &str = "SHA256RSA_PKCS1_V15";

/// Tamper-evidence fields written by [`crate::IntegrityGuard::sign`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityStamp {
    /// The record id; serialized like every other id.
    pub business_no: Option<RecordId>,
    pub data_hash: Option<String>,
    pub data_signature: Option<String>,
    pub public_key_id: Option<String>,
    pub sign_algorithm: Option<String>,
    pub last_sign_time: Option<i64>,
}

impl IntegrityStamp {
    pub fn is_signed(&self) -> bool {
        self.data_hash.is_some() && self.data_signature.is_some()
    }
}

/// A record whose content is hashed and signed before persistence.
pub trait Signable: Record {
    /// Business fields in their fixed canonical order.
    ///
    /// The same list feeds both the hash content (followed by version, status
    /// and deleted flag) and the signed content (followed by the effective
    /// update/create time). Integrity fields must never appear here.
    fn business_fields(&self) -> Vec<Option<String>>;

    fn stamp(&self) -> &IntegrityStamp;

    fn stamp_mut(&mut self) -> &mut IntegrityStamp;
}
