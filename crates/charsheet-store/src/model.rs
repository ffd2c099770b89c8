// ABOUTME: The model adapter contract: descriptors pairing a table name with export/import hooks.
// ABOUTME: Also defines Identity, the write-once record identifier every persisted type carries.

use serde_json::Value;
use thiserror::Error;

/// Errors raised by a model's export or import hook.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("missing field {0}")]
    MissingField(String),

    #[error("invalid value for field {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Identifier of a persisted record. Empty until the first save, then fixed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Identity(Option<u64>);

impl Identity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<u64> {
        self.0
    }

    pub fn is_assigned(&self) -> bool {
        self.0.is_some()
    }

    /// Attach an identifier. Returns false and leaves the identity untouched
    /// if one was already assigned.
    pub(crate) fn assign(&mut self, id: u64) -> bool {
        if self.0.is_some() {
            return false;
        }
        self.0 = Some(id);
        true
    }
}

/// A type whose instances can be stored as records.
pub trait Persisted {
    fn identity(&self) -> &Identity;

    fn identity_mut(&mut self) -> &mut Identity;

    fn id(&self) -> Option<u64> {
        self.identity().get()
    }
}

/// Describes how one model type maps onto its table.
///
/// `create` builds the blank instance that `import` fills in, so import only
/// has to interpret the record, never construct the type.
pub struct ModelDescriptor<T> {
    name: String,
    create: fn() -> T,
    export: fn(&T) -> Result<Value, AdapterError>,
    import: fn(&mut T, &Value) -> Result<(), AdapterError>,
}

impl<T> ModelDescriptor<T> {
    pub fn new(
        name: impl Into<String>,
        create: fn() -> T,
        export: fn(&T) -> Result<Value, AdapterError>,
        import: fn(&mut T, &Value) -> Result<(), AdapterError>,
    ) -> Self {
        Self {
            name: name.into(),
            create,
            export,
            import,
        }
    }

    /// The table this model is stored in.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn create(&self) -> T {
        (self.create)()
    }

    pub fn export(&self, instance: &T) -> Result<Value, AdapterError> {
        (self.export)(instance)
    }

    pub fn import(&self, instance: &mut T, data: &Value) -> Result<(), AdapterError> {
        (self.import)(instance, data)
    }
}

impl<T> std::fmt::Debug for ModelDescriptor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelDescriptor")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Read a required string field from an exported record.
pub fn require_str<'a>(data: &'a Value, field: &str) -> Result<&'a str, AdapterError> {
    match data.get(field) {
        None | Some(Value::Null) => Err(AdapterError::MissingField(field.to_string())),
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(AdapterError::InvalidField {
            field: field.to_string(),
            reason: format!("expected a string, found {}", other),
        }),
    }
}

/// Read an optional string field from an exported record. Null and absent
/// are both treated as missing.
pub fn optional_str(data: &Value, field: &str) -> Result<Option<String>, AdapterError> {
    match data.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(AdapterError::InvalidField {
            field: field.to_string(),
            reason: format!("expected a string, found {}", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identity_is_write_once() {
        let mut identity = Identity::new();
        assert!(!identity.is_assigned());

        assert!(identity.assign(3));
        assert!(!identity.assign(9));
        assert_eq!(identity.get(), Some(3));
    }

    #[test]
    fn require_str_reports_missing_and_wrong_type() {
        let data = json!({"name": "Bob", "age": 40, "nick": null});

        assert_eq!(require_str(&data, "name").unwrap(), "Bob");
        assert!(matches!(
            require_str(&data, "nick"),
            Err(AdapterError::MissingField(_))
        ));
        assert!(matches!(
            require_str(&data, "age"),
            Err(AdapterError::InvalidField { .. })
        ));
    }

    #[test]
    fn optional_str_accepts_null() {
        let data = json!({"notes": null, "title": "x"});
        assert_eq!(optional_str(&data, "notes").unwrap(), None);
        assert_eq!(optional_str(&data, "absent").unwrap(), None);
        assert_eq!(optional_str(&data, "title").unwrap().as_deref(), Some("x"));
    }
}
