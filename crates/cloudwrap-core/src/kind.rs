//! Operation kinds used to label every instrumented call
//!
//! Each provider/resource family defines a closed enum of the actions it
//! performs and implements [`CloudOperationKind`] for it. The annotator
//! erases the concrete enum into an [`OperationKindLabel`] so that records
//! from different families can flow through one telemetry sink.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Cloud platform an operation is performed against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudPlatform {
    Gcp,
    Azure,
    Aws,
}

impl fmt::Display for CloudPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloudPlatform::Gcp => write!(f, "gcp"),
            CloudPlatform::Azure => write!(f, "azure"),
            CloudPlatform::Aws => write!(f, "aws"),
        }
    }
}

/// The semantic action performed by a remote call
///
/// Implemented by a closed enum per provider/resource family:
///
/// ```rust
/// use cloudwrap_core::{CloudOperationKind, CloudPlatform};
///
/// #[derive(Debug, Clone, Copy)]
/// enum StorageOperation {
///     CreateBucket,
///     DeleteBucket,
/// }
///
/// impl CloudOperationKind for StorageOperation {
///     fn name(&self) -> &'static str {
///         match self {
///             StorageOperation::CreateBucket => "GOOGLE_CREATE_BUCKET",
///             StorageOperation::DeleteBucket => "GOOGLE_DELETE_BUCKET",
///         }
///     }
///
///     fn platform(&self) -> CloudPlatform {
///         CloudPlatform::Gcp
///     }
/// }
///
/// assert_eq!(StorageOperation::CreateBucket.label().to_string(), "gcp/GOOGLE_CREATE_BUCKET");
/// ```
pub trait CloudOperationKind: Copy + fmt::Debug + Send + Sync + 'static {
    /// Stable name used to group telemetry
    fn name(&self) -> &'static str;

    /// Platform the operation targets
    fn platform(&self) -> CloudPlatform;

    /// Erased label for this kind
    fn label(&self) -> OperationKindLabel {
        OperationKindLabel {
            platform: self.platform(),
            name: self.name(),
        }
    }
}

/// Serializable form of a [`CloudOperationKind`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct OperationKindLabel {
    pub platform: CloudPlatform,
    pub name: &'static str,
}

impl<K: CloudOperationKind> From<K> for OperationKindLabel {
    fn from(kind: K) -> Self {
        kind.label()
    }
}

impl fmt::Display for OperationKindLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.platform, self.name)
    }
}
