//! Visit payloads and their multipart form encoding.

use bytes::Bytes;
use serde_json::{Map, Value};

/// A file attached to a visit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilePart {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl FilePart {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            bytes: bytes.into(),
        }
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FormEntry {
    Text { name: String, value: String },
    File { name: String, part: FilePart },
}

impl FormEntry {
    pub fn name(&self) -> &str {
        match self {
            Self::Text { name, .. } | Self::File { name, .. } => name,
        }
    }
}

/// Ordered multipart form fields.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormData {
    entries: Vec<FormEntry>,
}

impl FormData {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn append_text(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push(FormEntry::Text {
            name: name.into(),
            value: value.into(),
        });
    }

    pub fn append_file(&mut self, name: impl Into<String>, part: FilePart) {
        self.entries.push(FormEntry::File {
            name: name.into(),
            part,
        });
    }

    pub fn entries(&self) -> &[FormEntry] {
        &self.entries
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.entries.iter().find_map(|entry| match entry {
            FormEntry::Text { name: key, value } if key == name => Some(value.as_str()),
            FormEntry::Text { .. } | FormEntry::File { .. } => None,
        })
    }

    /// Sum of all file sizes, used as the upload total.
    pub fn file_bytes(&self) -> u64 {
        self.entries
            .iter()
            .map(|entry| match entry {
                FormEntry::File { part, .. } => part.bytes.len() as u64,
                FormEntry::Text { .. } => 0,
            })
            .sum()
    }

    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What the caller asked to send.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VisitData {
    pub fields: Map<String, Value>,
    pub files: Vec<(String, FilePart)>,
}

impl VisitData {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    #[must_use]
    pub fn file(mut self, name: impl Into<String>, part: FilePart) -> Self {
        self.files.push((name.into(), part));
        self
    }

    pub fn has_files(&self) -> bool {
        !self.files.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.files.is_empty()
    }
}

impl From<Map<String, Value>> for VisitData {
    fn from(fields: Map<String, Value>) -> Self {
        Self {
            fields,
            files: Vec::new(),
        }
    }
}

/// Body of an exchange once the payload has been classified.
#[derive(Clone, Debug, PartialEq)]
pub enum RequestPayload {
    Fields(Map<String, Value>),
    Multipart(FormData),
}

impl Default for RequestPayload {
    fn default() -> Self {
        Self::empty()
    }
}

impl RequestPayload {
    pub fn empty() -> Self {
        Self::Fields(Map::new())
    }

    pub const fn is_multipart(&self) -> bool {
        matches!(self, Self::Multipart(_))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Fields(fields) => fields.is_empty(),
            Self::Multipart(form) => form.is_empty(),
        }
    }

    pub const fn fields(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::Fields(fields) => Some(fields),
            Self::Multipart(_) => None,
        }
    }
}

/// Flatten `data` into multipart form fields.
///
/// Nested objects become `key[sub]`, arrays `key[0]`. Booleans are sent as
/// `1`/`0` and null as an empty string. Files keep their field names.
pub fn object_to_form_data(data: VisitData) -> FormData {
    let mut form = FormData::new();
    for (name, value) in &data.fields {
        append_value(&mut form, name, value);
    }
    for (name, part) in data.files {
        form.append_file(name, part);
    }
    form
}

fn append_value(form: &mut FormData, name: &str, value: &Value) {
    match value {
        Value::Object(entries) => {
            for (key, nested) in entries {
                append_value(form, &format!("{name}[{key}]"), nested);
            }
        }
        Value::Array(items) => {
            for (index, nested) in items.iter().enumerate() {
                append_value(form, &format!("{name}[{index}]"), nested);
            }
        }
        Value::Bool(flag) => form.append_text(name, if *flag { "1" } else { "0" }),
        Value::Null => form.append_text(name, ""),
        Value::String(text) => form.append_text(name, text.as_str()),
        Value::Number(number) => form.append_text(name, number.to_string()),
    }
}
