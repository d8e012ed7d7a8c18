//! Object-created notification payload
//!
//! Only the fields the trigger reads are modelled; everything else in the
//! notification is ignored on decode.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageNotification {
    #[serde(rename = "Records", default)]
    pub records: Vec<NotificationRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub s3: S3Entity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Entity {
    pub bucket: BucketRef,
    pub object: ObjectRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketRef {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub key: String,
    /// Present only on versioned buckets
    #[serde(rename = "versionId", default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
}

impl StorageNotification {
    /// Notification for a single uploaded object
    pub fn object_created(bucket: &str, key: &str, version_id: &str) -> Self {
        Self {
            records: vec![NotificationRecord {
                s3: S3Entity {
                    bucket: BucketRef {
                        name: bucket.to_string(),
                    },
                    object: ObjectRef {
                        key: key.to_string(),
                        version_id: Some(version_id.to_string()),
                    },
                },
            }],
        }
    }
}
