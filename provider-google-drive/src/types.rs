//! Google Drive API response types
//!
//! Data structures for deserializing Google Drive API v3 responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{GoogleDriveError, Result};

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Fields requested for file resources
pub const FILE_FIELDS: &str =
    "id,name,mimeType,size,createdTime,modifiedTime,md5Checksum,parents,trashed";

/// Google Drive API file resource
///
/// See: https://developers.google.com/drive/api/v3/reference/files#resource
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub mime_type: String,

    /// File size in bytes (omitted for folders)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,

    /// Creation time (RFC 3339)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_time: Option<String>,

    /// Modification time (RFC 3339)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub md5_checksum: Option<String>,

    /// Parent folder IDs
    #[serde(default)]
    pub parents: Vec<String>,

    #[serde(default)]
    pub trashed: bool,
}

impl DriveFile {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }

    /// Modification time, falling back to the creation time.
    pub fn updated_time(&self) -> Result<DateTime<Utc>> {
        let raw = self
            .modified_time
            .as_deref()
            .or(self.created_time.as_deref())
            .ok_or_else(|| GoogleDriveError::InvalidTimestamp {
                file_id: self.id.clone(),
                message: "neither modifiedTime nor createdTime present".to_string(),
            })?;

        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| GoogleDriveError::InvalidTimestamp {
                file_id: self.id.clone(),
                message: format!("{:?}: {}", raw, e),
            })
    }
}

/// Google Drive API files.list response
///
/// See: https://developers.google.com/drive/api/v3/reference/files/list
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesListResponse {
    #[serde(default)]
    pub files: Vec<DriveFile>,

    /// Token for next page
    pub next_page_token: Option<String>,

    #[serde(default)]
    pub incomplete_search: bool,
}

/// Body of a files.create request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFileRequest<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<&'a str>,
    pub parents: [&'a str; 1],
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_deserialize_drive_file() {
        let json = r#"{
            "id": "abc123",
            "name": "note.md",
            "mimeType": "text/markdown",
            "size": "1024",
            "createdTime": "2023-01-01T00:00:00.000Z",
            "modifiedTime": "2023-01-02T00:00:00.000Z",
            "md5Checksum": "d41d8cd98f00b204e9800998ecf8427e",
            "parents": ["folder1"],
            "trashed": false
        }"#;

        let file: DriveFile = serde_json::from_str(json).unwrap();
        assert_eq!(file.id, "abc123");
        assert_eq!(file.name, "note.md");
        assert!(!file.is_folder());
        assert_eq!(
            file.updated_time().unwrap(),
            Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_updated_time_falls_back_to_created() {
        let file: DriveFile = serde_json::from_str(
            r#"{"id": "f", "mimeType": "application/vnd.google-apps.folder", "createdTime": "2023-05-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert!(file.is_folder());
        assert_eq!(
            file.updated_time().unwrap(),
            Utc.with_ymd_and_hms(2023, 5, 1, 10, 0, 0).unwrap()
        );

        let bare: DriveFile = serde_json::from_str(r#"{"id": "g"}"#).unwrap();
        assert!(matches!(
            bare.updated_time(),
            Err(GoogleDriveError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn test_deserialize_files_list_response() {
        let json = r#"{
            "files": [
                {
                    "id": "file1",
                    "name": "a.md",
                    "mimeType": "text/plain",
                    "modifiedTime": "2023-01-01T00:00:00.000Z"
                }
            ],
            "nextPageToken": "token123"
        }"#;

        let response: FilesListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.files.len(), 1);
        assert_eq!(response.next_page_token, Some("token123".to_string()));

        let empty: FilesListResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.files.is_empty());
        assert!(empty.next_page_token.is_none());
    }

    #[test]
    fn test_create_request_omits_mime_type_for_files() {
        let body = serde_json::to_value(CreateFileRequest {
            name: "n.md",
            mime_type: None,
            parents: ["p"],
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"name": "n.md", "parents": ["p"]}));
    }
}
