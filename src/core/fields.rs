//! Field names of the backend schema.

pub const CONTENT: &str = "l.content";
pub const CONTACT_DATA: &str = "l.contactData";
pub const FIELD: &str = "l.field";
pub const FROM: &str = "from";
pub const TO: &str = "to";
pub const CC: &str = "cc";
pub const SUBJECT: &str = "subject";
pub const MESSAGE_ID: &str = "msg_id";
pub const ENV_FROM: &str = "env_from";
pub const ENV_TO: &str = "env_to";
pub const FILENAME: &str = "filename";
pub const MIME_TYPE: &str = "type";
pub const ATTACHMENTS: &str = "attachment";
pub const OBJECTS: &str = "has";
pub const DOMAIN_PREFIX: &str = "@";

pub const ITEM_ID: &str = "l.mbox_blob_id";
pub const PART_NAME: &str = "l.partname";
pub const VERSION: &str = "l.version";
pub const SORT_DATE: &str = "l.date";
pub const SORT_SIZE: &str = "l.size";
pub const SORT_SUBJECT: &str = "l.sort_subject";
pub const SORT_NAME: &str = "l.sort_name";
pub const ACCOUNT_ID: &str = "l.account_id";

pub const SOLR_ID: &str = "solrId";
pub const SCORE: &str = "score";

/// Stored fields returned with every hit unless the caller overrides them.
pub const MESSAGE_FETCH_FIELDS: &[&str] = &[PART_NAME, FILENAME, ITEM_ID, SORT_DATE, VERSION, MIME_TYPE];

/// Prefix for numeric structured fields (`#name:value`).
pub const NUMERIC_FIELD_PREFIX: &str = "#";

/// A logical search field backed by several weighted sub-fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CombinedField {
    pub name: &'static str,
    pub fields: &'static [&'static str],
    pub primary: &'static str,
}

impl CombinedField {
    /// Weight of a constituent sub-field; only the primary one is boosted.
    pub fn weight(&self, field: &str) -> u32 {
        if field == self.primary { 2 } else { 1 }
    }

    /// `subject^2 l.content from_sw ...`
    pub fn weighted_fields(&self) -> String {
        self.fields
            .iter()
            .map(|f| match self.weight(f) {
                1 => f.to_string(),
                w => format!("{}^{}", f, w),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub const CONTENT_GROUP: CombinedField = CombinedField {
    name: CONTENT,
    fields: &[SUBJECT, CONTENT, "from_sw", "to_sw", "cc_sw", "filename_sw"],
    primary: SUBJECT,
};

pub const CONTACT_GROUP: CombinedField = CombinedField {
    name: CONTACT_DATA,
    fields: &[CONTACT_DATA, TO],
    primary: CONTACT_DATA,
};

pub fn combined_field(name: &str) -> Option<&'static CombinedField> {
    match name {
        CONTENT => Some(&CONTENT_GROUP),
        CONTACT_DATA => Some(&CONTACT_GROUP),
        _ => None,
    }
}
