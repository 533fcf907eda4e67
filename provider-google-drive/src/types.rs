//! Google Drive API response types
//!
//! Data structures for deserializing Google Drive API v3 responses.

use bridge_traits::storage::{FileEntry, ProviderKind};
use serde::{Deserialize, Deserializer, Serialize};

/// Treats an explicit `null` like a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Google Drive API file resource, limited to the fields the listing requests.
///
/// Every field defaults to an empty string when Drive omits it or sends `null`.
///
/// See: https://developers.google.com/drive/api/v3/reference/files#resource
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct DriveFile {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub mime_type: String,
    /// Link for opening the file in a browser
    #[serde(deserialize_with = "null_as_default")]
    pub web_view_link: String,
    /// Creation time (RFC 3339)
    #[serde(deserialize_with = "null_as_default")]
    pub created_time: String,
}

impl DriveFile {
    pub fn into_file_entry(self) -> FileEntry {
        FileEntry {
            id: self.id,
            name: self.name,
            view_url: self.web_view_link,
            created_at: self.created_time,
            provider: ProviderKind::GoogleDrive,
            mime_type: self.mime_type,
        }
    }
}

/// Google Drive API files.list response
///
/// See: https://developers.google.com/drive/api/v3/reference/files/list
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesListResponse {
    /// Absent when the folder is empty
    #[serde(default, deserialize_with = "null_as_default")]
    pub files: Vec<DriveFile>,

    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Error envelope returned by Google APIs on non-2xx responses.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
}
