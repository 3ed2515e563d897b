/// A numeric measured quantity attached to a [`Point`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    I64(i64),
    F64(f64),
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            FieldValue::I64(v) => v.fmt(f),
            FieldValue::F64(v) => v.fmt(f),
        }
    }
}

/// One measurement sample. The measurement name is assigned when the point
/// is written, not when it is built.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    measurement: Option<String>,
    tags: Vec<(String, String)>,
    fields: Vec<(String, FieldValue)>,
    time: String,
}

impl Point {
    pub fn new(
        tags: Vec<(String, String)>,
        fields: Vec<(String, FieldValue)>,
        time: String,
    ) -> Self {
        Point {
            measurement: None,
            tags,
            fields,
            time,
        }
    }

    pub fn measurement(&self) -> Option<&str> {
        self.measurement.as_deref()
    }

    pub fn set_measurement(&mut self, measurement: &str) {
        self.measurement = Some(measurement.to_string());
    }

    pub fn tags(&self) -> &[(String, String)] {
        &self.tags
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(tag_key, _)| tag_key == key)
            .map(|(_, value)| value.as_str())
    }

    /// Replaces the value of an existing tag. Returns false, leaving the
    /// point untouched, when the tag is absent.
    pub fn replace_tag(&mut self, key: &str, value: &str) -> bool {
        match self.tags.iter_mut().find(|(tag_key, _)| tag_key == key) {
            Some((_, tag_value)) => {
                *tag_value = value.to_string();
                true
            }
            None => false,
        }
    }

    pub fn fields(&self) -> &[(String, FieldValue)] {
        &self.fields
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(field_key, _)| field_key == key)
            .map(|(_, value)| value)
    }

    pub fn time(&self) -> &str {
        &self.time
    }
}
