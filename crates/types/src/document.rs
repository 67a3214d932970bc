//! Supported document kinds.
//!
//! `KIND_TABLE` is the only list of accepted extensions. Batch validation and
//! per-file fetching both resolve kinds through [`DocumentKind::from_extension`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad grouping of a document kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentCategory {
    Document,
    Image,
    Data,
    Spreadsheet,
    Presentation,
}

/// One accepted file extension and the MIME type recorded for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentKind {
    pub extension: &'static str,
    pub mime_type: &'static str,
    pub category: DocumentCategory,
}

pub const KIND_TABLE: &[DocumentKind] = &[
    DocumentKind {
        extension: "pdf",
        mime_type: "application/pdf",
        category: DocumentCategory::Document,
    },
    DocumentKind {
        extension: "doc",
        mime_type: "application/msword",
        category: DocumentCategory::Document,
    },
    DocumentKind {
        extension: "docx",
        mime_type: "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        category: DocumentCategory::Document,
    },
    DocumentKind {
        extension: "jpg",
        mime_type: "image/jpeg",
        category: DocumentCategory::Image,
    },
    DocumentKind {
        extension: "jpeg",
        mime_type: "image/jpeg",
        category: DocumentCategory::Image,
    },
    DocumentKind {
        extension: "png",
        mime_type: "image/png",
        category: DocumentCategory::Image,
    },
    DocumentKind {
        extension: "json",
        mime_type: "application/json",
        category: DocumentCategory::Data,
    },
    DocumentKind {
        extension: "txt",
        mime_type: "text/plain",
        category: DocumentCategory::Data,
    },
    DocumentKind {
        extension: "csv",
        mime_type: "text/csv",
        category: DocumentCategory::Data,
    },
    DocumentKind {
        extension: "xls",
        mime_type: "application/vnd.ms-excel",
        category: DocumentCategory::Spreadsheet,
    },
    DocumentKind {
        extension: "xlsx",
        mime_type: "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        category: DocumentCategory::Spreadsheet,
    },
    DocumentKind {
        extension: "ppt",
        mime_type: "application/vnd.ms-powerpoint",
        category: DocumentCategory::Presentation,
    },
    DocumentKind {
        extension: "pptx",
        mime_type: "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        category: DocumentCategory::Presentation,
    },
];

impl DocumentKind {
    /// Look up a kind by extension (case-insensitive, no leading dot).
    pub fn from_extension(extension: &str) -> Option<&'static DocumentKind> {
        let extension = extension.to_ascii_lowercase();
        KIND_TABLE.iter().find(|kind| kind.extension == extension)
    }

    /// Resolve the kind of the file a URL points at.
    pub fn from_url(url: &str) -> Option<&'static DocumentKind> {
        extension_of(file_name_from_url(url)).and_then(Self::from_extension)
    }

    /// Comma separated upper-case list of accepted extensions, for messages.
    pub fn accepted_list() -> String {
        KIND_TABLE
            .iter()
            .map(|kind| kind.extension.to_ascii_uppercase())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_type)
    }
}

/// Final path segment of a URL with any query string removed.
pub fn file_name_from_url(url: &str) -> &str {
    let last = url.rsplit('/').next().unwrap_or(url);
    match last.split_once('?') {
        Some((name, _)) => name,
        None => last,
    }
}

/// Text after the last `.` of a file name. A name without a dot, or ending in
/// one, has no extension.
pub fn extension_of(file_name: &str) -> Option<&str> {
    match file_name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => Some(ext),
        _ => None,
    }
}
