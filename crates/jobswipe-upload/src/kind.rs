//! Document kinds and where they are stored

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const MIB: u64 = 1024 * 1024;

/// What a file is, which decides its bucket, folder and content type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    /// Applicant resume (PDF)
    Resume,
    /// Front of an identity card
    FrontId,
    /// Back of an identity card
    BackId,
    /// Employer identification
    EmployerId,
    /// Profile picture
    Avatar,
}

impl FileKind {
    /// All kinds
    pub const ALL: [FileKind; 5] = [
        FileKind::Resume,
        FileKind::FrontId,
        FileKind::BackId,
        FileKind::EmployerId,
        FileKind::Avatar,
    ];

    /// Bucket holding this kind
    pub fn bucket(&self) -> &'static str {
        match self {
            Self::Resume => "resumes",
            Self::FrontId => "front_valid_id",
            Self::BackId => "back_valid_Id",
            Self::EmployerId => "employer_id",
            Self::Avatar => "profile_picture",
        }
    }

    /// Folder under the user id
    pub fn category(&self) -> &'static str {
        match self {
            Self::Resume => "resume",
            Self::FrontId => "front_id",
            Self::BackId => "back_id",
            Self::EmployerId => "employer_id",
            Self::Avatar => "avatar",
        }
    }

    /// PDF documents rather than images
    pub fn is_document(&self) -> bool {
        matches!(self, Self::Resume)
    }

    /// Content type declared for `file_name`
    pub fn content_type(&self, file_name: &str) -> String {
        if self.is_document() {
            return "application/pdf".to_string();
        }
        mime_guess::from_path(file_name)
            .iter()
            .find(|mime| mime.type_() == mime_guess::mime::IMAGE)
            .map(|mime| mime.essence_str().to_string())
            .unwrap_or_else(|| "image/jpeg".to_string())
    }

    /// Limit the picking screen applies before handing a file to the engine
    pub fn selection_limit(&self) -> u64 {
        match self {
            Self::Resume | Self::EmployerId => 5 * MIB,
            Self::FrontId | Self::BackId | Self::Avatar => 2 * MIB,
        }
    }

    /// `{user_id}/{category}/{timestamp_millis}_{file_name}`
    pub fn destination_path(&self, user_id: &str, file_name: &str, at: DateTime<Utc>) -> String {
        format!(
            "{}/{}/{}_{}",
            user_id,
            self.category(),
            at.timestamp_millis(),
            sanitize_file_name(file_name)
        )
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.category())
    }
}

impl FromStr for FileKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "resume" => Ok(Self::Resume),
            "front_id" => Ok(Self::FrontId),
            "back_id" => Ok(Self::BackId),
            "employer_id" => Ok(Self::EmployerId),
            "avatar" | "profile_picture" => Ok(Self::Avatar),
            other => Err(format!(
                "unknown file kind '{}', expected one of: resume, front_id, back_id, employer_id, avatar",
                other
            )),
        }
    }
}

/// Keep the last path component and replace anything outside `[A-Za-z0-9._-]`
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}
