//! Static name -> canonical value tables for fixed-field lookups.

use crate::core::fields;

const CONTENT_TYPES: &[(&str, &[&str])] = &[
    ("any", &["any"]),
    ("application", &["application/*"]),
    ("bmp", &["image/bmp"]),
    ("gif", &["image/gif"]),
    ("image", &["image/*"]),
    ("jpeg", &["image/jpeg"]),
    ("jpg", &["image/jpeg"]),
    (
        "excel",
        &["application/vnd.ms-excel", "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"],
    ),
    (
        "ppt",
        &[
            "application/vnd.ms-powerpoint",
            "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        ],
    ),
    ("ms-tnef", &["application/ms-tnef"]),
    (
        "word",
        &["application/msword", "application/vnd.openxmlformats-officedocument.wordprocessingml.document"],
    ),
    (
        "msword",
        &["application/msword", "application/vnd.openxmlformats-officedocument.wordprocessingml.document"],
    ),
    ("none", &["none"]),
    ("pdf", &["application/pdf"]),
    ("text", &["text/plain"]),
];

const OBJECTS: &[(&str, &[&str])] = &[
    ("attachment", &["any"]),
    ("att", &["any"]),
    ("phone", &["phone"]),
    ("u.po", &["u.po"]),
    ("ssn", &["ssn"]),
    ("url", &["url"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupTable {
    Attachment,
    Type,
    Has,
}

impl LookupTable {
    pub fn field(&self) -> &'static str {
        match self {
            LookupTable::Attachment => fields::ATTACHMENTS,
            LookupTable::Type => fields::MIME_TYPE,
            LookupTable::Has => fields::OBJECTS,
        }
    }

    fn entries(&self) -> &'static [(&'static str, &'static [&'static str])] {
        match self {
            LookupTable::Attachment | LookupTable::Type => CONTENT_TYPES,
            LookupTable::Has => OBJECTS,
        }
    }

    /// Canonical values for `token`; an unmapped token passes through unchanged.
    pub fn canonical(&self, token: &str) -> Vec<String> {
        let key = token.to_ascii_lowercase();
        match self.entries().iter().find(|(name, _)| *name == key) {
            Some((_, values)) => values.iter().map(|v| v.to_string()).collect(),
            None => vec![token.to_string()],
        }
    }
}
