use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

/// A database table whose rows point at stored objects.
///
/// The rows belong to other features (patient records, file attachments); the
/// gateway only reads them and, during repair or migration, rewrites the
/// reference column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceCollection {
    /// `patients.avatar_url`
    PatientAvatar,
    /// `patient_files.file_url` (with `patient_files.file_type`)
    FileAttachment,
}

impl ReferenceCollection {
    pub const ALL: [ReferenceCollection; 2] = [
        ReferenceCollection::PatientAvatar,
        ReferenceCollection::FileAttachment,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ReferenceCollection::PatientAvatar => "patient avatars",
            ReferenceCollection::FileAttachment => "file attachments",
        }
    }
}

impl Display for ReferenceCollection {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.label())
    }
}

/// One stored URL/path value together with the row that holds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectReference {
    pub collection: ReferenceCollection,
    pub record_id: Uuid,
    /// The raw stored value, byte for byte.
    pub url: String,
    /// MIME type recorded by the owning feature, when it keeps one.
    pub recorded_file_type: Option<String>,
}
