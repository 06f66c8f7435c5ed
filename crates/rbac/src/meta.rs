use serde::{Deserialize, Serialize};

use keystone_core::{AuditFields, RecordId, RecordStatus};
use keystone_integrity::IntegrityStamp;

/// Fields every record carries: identity, lock version, lifecycle, audit and
/// integrity stamps. Flattened into each record's JSON.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMeta {
    pub id: RecordId,
    pub version: u64,
    pub status: RecordStatus,
    pub deleted: bool,
    #[serde(flatten)]
    pub audit: AuditFields,
    #[serde(flatten)]
    pub integrity: IntegrityStamp,
}

/// Implements `Record` and `Signable` for a type with a `meta: RecordMeta`
/// field. `$fields` lists the business fields in canonical order.
macro_rules! signable_record {
    ($ty:ty => |$this:ident| $fields:expr) => {
        impl keystone_core::Record for $ty {
            fn id(&self) -> keystone_core::RecordId {
                self.meta.id
            }

            fn set_id(&mut self, id: keystone_core::RecordId) {
                self.meta.id = id;
            }

            fn version(&self) -> u64 {
                self.meta.version
            }

            fn set_version(&mut self, version: u64) {
                self.meta.version = version;
            }

            fn status(&self) -> keystone_core::RecordStatus {
                self.meta.status
            }

            fn set_status(&mut self, status: keystone_core::RecordStatus) {
                self.meta.status = status;
            }

            fn is_deleted(&self) -> bool {
                self.meta.deleted
            }

            fn set_deleted(&mut self, deleted: bool) {
                self.meta.deleted = deleted;
            }

            fn audit(&self) -> &keystone_core::AuditFields {
                &self.meta.audit
            }

            fn audit_mut(&mut self) -> &mut keystone_core::AuditFields {
                &mut self.meta.audit
            }
        }

        impl keystone_integrity::Signable for $ty {
            fn business_fields(&self) -> Vec<Option<String>> {
                let $this = self;
                $fields
            }

            fn stamp(&self) -> &keystone_integrity::IntegrityStamp {
                &self.meta.integrity
            }

            fn stamp_mut(&mut self) -> &mut keystone_integrity::IntegrityStamp {
                &mut self.meta.integrity
            }
        }
    };
}
