//! Resource identities registered for cleanup
//!
//! Each variant carries exactly the fields needed to find and delete the
//! resource again, nothing more. The JSON form is externally tagged:
//!
//! ```json
//! {"googleBlobUid": {"bucketName": "my-bucket", "blobName": "data.csv"}}
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleProjectUid {
    pub project_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleBucketUid {
    pub bucket_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleBlobUid {
    pub bucket_name: String,
    pub blob_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleBigQueryDatasetUid {
    pub project_id: String,
    pub dataset_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleBigQueryTableUid {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleNotebookInstanceUid {
    pub project_id: String,
    pub location: String,
    pub instance_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleServiceAccountUid {
    pub project_id: String,
    pub account_email: String,
}

/// Azure resource group; also scopes every other Azure resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureResourceGroupUid {
    pub tenant_id: String,
    pub subscription_id: String,
    pub resource_group_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureStorageContainerUid {
    pub resource_group: AzureResourceGroupUid,
    pub storage_account_name: String,
    pub container_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureVirtualMachineUid {
    pub resource_group: AzureResourceGroupUid,
    pub vm_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureDiskUid {
    pub resource_group: AzureResourceGroupUid,
    pub disk_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureManagedIdentityUid {
    pub resource_group: AzureResourceGroupUid,
    pub identity_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureDatabaseUid {
    pub resource_group: AzureResourceGroupUid,
    pub server_name: String,
    pub database_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureKubernetesNamespaceUid {
    pub resource_group: AzureResourceGroupUid,
    pub cluster_name: String,
    pub namespace_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsS3BucketUid {
    pub region: String,
    pub bucket_name: String,
}

/// Identity of one cloud resource to be cleaned up later
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceUid {
    #[serde(rename = "googleProjectUid")]
    GoogleProject(GoogleProjectUid),
    #[serde(rename = "googleBucketUid")]
    GoogleBucket(GoogleBucketUid),
    #[serde(rename = "googleBlobUid")]
    GoogleBlob(GoogleBlobUid),
    #[serde(rename = "googleBigQueryDatasetUid")]
    GoogleBigQueryDataset(GoogleBigQueryDatasetUid),
    #[serde(rename = "googleBigQueryTableUid")]
    GoogleBigQueryTable(GoogleBigQueryTableUid),
    #[serde(rename = "googleNotebookInstanceUid")]
    GoogleNotebookInstance(GoogleNotebookInstanceUid),
    #[serde(rename = "googleServiceAccountUid")]
    GoogleServiceAccount(GoogleServiceAccountUid),
    #[serde(rename = "azureResourceGroupUid")]
    AzureResourceGroup(AzureResourceGroupUid),
    #[serde(rename = "azureStorageContainerUid")]
    AzureStorageContainer(AzureStorageContainerUid),
    #[serde(rename = "azureVirtualMachineUid")]
    AzureVirtualMachine(AzureVirtualMachineUid),
    #[serde(rename = "azureDiskUid")]
    AzureDisk(AzureDiskUid),
    #[serde(rename = "azureManagedIdentityUid")]
    AzureManagedIdentity(AzureManagedIdentityUid),
    #[serde(rename = "azureDatabaseUid")]
    AzureDatabase(AzureDatabaseUid),
    #[serde(rename = "azureKubernetesNamespaceUid")]
    AzureKubernetesNamespace(AzureKubernetesNamespaceUid),
    #[serde(rename = "awsS3BucketUid")]
    AwsS3Bucket(AwsS3BucketUid),
}

impl ResourceUid {
    /// Wire tag of this variant
    pub fn resource_type(&self) -> &'static str {
        match self {
            ResourceUid::GoogleProject(_) => "googleProjectUid",
            ResourceUid::GoogleBucket(_) => "googleBucketUid",
            ResourceUid::GoogleBlob(_) => "googleBlobUid",
            ResourceUid::GoogleBigQueryDataset(_) => "googleBigQueryDatasetUid",
            ResourceUid::GoogleBigQueryTable(_) => "googleBigQueryTableUid",
            ResourceUid::GoogleNotebookInstance(_) => "googleNotebookInstanceUid",
            ResourceUid::GoogleServiceAccount(_) => "googleServiceAccountUid",
            ResourceUid::AzureResourceGroup(_) => "azureResourceGroupUid",
            ResourceUid::AzureStorageContainer(_) => "azureStorageContainerUid",
            ResourceUid::AzureVirtualMachine(_) => "azureVirtualMachineUid",
            ResourceUid::AzureDisk(_) => "azureDiskUid",
            ResourceUid::AzureManagedIdentity(_) => "azureManagedIdentityUid",
            ResourceUid::AzureDatabase(_) => "azureDatabaseUid",
            ResourceUid::AzureKubernetesNamespace(_) => "azureKubernetesNamespaceUid",
            ResourceUid::AwsS3Bucket(_) => "awsS3BucketUid",
        }
    }

    /// Short human-readable name of the resource for log lines
    pub fn display_name(&self) -> String {
        match self {
            ResourceUid::GoogleProject(u) => u.project_id.clone(),
            ResourceUid::GoogleBucket(u) => u.bucket_name.clone(),
            ResourceUid::GoogleBlob(u) => format!("{}/{}", u.bucket_name, u.blob_name),
            ResourceUid::GoogleBigQueryDataset(u) => format!("{}.{}", u.project_id, u.dataset_id),
            ResourceUid::GoogleBigQueryTable(u) => {
                format!("{}.{}.{}", u.project_id, u.dataset_id, u.table_id)
            }
            ResourceUid::GoogleNotebookInstance(u) => {
                format!("{}/{}/{}", u.project_id, u.location, u.instance_id)
            }
            ResourceUid::GoogleServiceAccount(u) => u.account_email.clone(),
            ResourceUid::AzureResourceGroup(g) => g.resource_group_name.clone(),
            ResourceUid::AzureStorageContainer(u) => {
                format!("{}/{}", u.storage_account_name, u.container_name)
            }
            ResourceUid::AzureVirtualMachine(u) => {
                format!("{}/{}", u.resource_group.resource_group_name, u.vm_name)
            }
            ResourceUid::AzureDisk(u) => {
                format!("{}/{}", u.resource_group.resource_group_name, u.disk_name)
            }
            ResourceUid::AzureManagedIdentity(u) => {
                format!("{}/{}", u.resource_group.resource_group_name, u.identity_name)
            }
            ResourceUid::AzureDatabase(u) => format!("{}/{}", u.server_name, u.database_name),
            ResourceUid::AzureKubernetesNamespace(u) => {
                format!("{}/{}", u.cluster_name, u.namespace_name)
            }
            ResourceUid::AwsS3Bucket(u) => format!("{}/{}", u.region, u.bucket_name),
        }
    }
}

impl fmt::Display for ResourceUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.resource_type(), self.display_name())
    }
}

macro_rules! impl_from_uid {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for ResourceUid {
                fn from(uid: $ty) -> Self {
                    ResourceUid::$variant(uid)
                }
            }
        )*
    };
}

impl_from_uid! {
    GoogleProject => GoogleProjectUid,
    GoogleBucket => GoogleBucketUid,
    GoogleBlob => GoogleBlobUid,
    GoogleBigQueryDataset => GoogleBigQueryDatasetUid,
    GoogleBigQueryTable => GoogleBigQueryTableUid,
    GoogleNotebookInstance => GoogleNotebookInstanceUid,
    GoogleServiceAccount => GoogleServiceAccountUid,
    AzureResourceGroup => AzureResourceGroupUid,
    AzureStorageContainer => AzureStorageContainerUid,
    AzureVirtualMachine => AzureVirtualMachineUid,
    AzureDisk => AzureDiskUid,
    AzureManagedIdentity => AzureManagedIdentityUid,
    AzureDatabase => AzureDatabaseUid,
    AzureKubernetesNamespace => AzureKubernetesNamespaceUid,
    AwsS3Bucket => AwsS3BucketUid,
}
