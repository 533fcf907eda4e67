//! Microsoft Graph response types

use bridge_traits::storage::{FileEntry, ProviderKind};
use serde::Deserialize;

/// A `driveItem` reduced to the selected fields. All four are required.
///
/// See: https://learn.microsoft.com/graph/api/resources/driveitem
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DriveItem {
    pub id: String,
    pub name: String,
    pub web_url: String,
    pub created_date_time: String,
}

impl DriveItem {
    /// Graph does not report a MIME type for the selected fields, so it is
    /// left empty.
    pub fn into_file_entry(self) -> FileEntry {
        FileEntry {
            id: self.id,
            name: self.name,
            view_url: self.web_url,
            created_at: self.created_date_time,
            provider: ProviderKind::OneDrive,
            mime_type: String::new(),
        }
    }
}

/// `GET /children` page.
#[derive(Debug, Deserialize)]
pub struct ChildrenResponse {
    pub value: Vec<DriveItem>,

    #[serde(rename = "@odata.nextLink", default)]
    pub next_link: Option<String>,
}

/// Graph error envelope.
#[derive(Debug, Deserialize)]
pub struct GraphErrorResponse {
    pub error: GraphErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct GraphErrorDetail {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl GraphErrorDetail {
    pub fn summary(&self) -> String {
        match (self.code.is_empty(), self.message.is_empty()) {
            (false, false) => format!("{}: {}", self.code, self.message),
            (false, true) => self.code.clone(),
            _ => self.message.clone(),
        }
    }
}
