use jsonschema::{Draft, JSONSchema};
use once_cell::sync::Lazy;
use serde_json::Value;

use crate::error::{NormalizeError, Result};

pub const SOURCE_DOCUMENT_SCHEMA: &str = include_str!("../../../schemas/source_document.v1.json");

// jsonschema 0.17 wants a 'static schema; the parsed schema lives for the process
static COMPILED: Lazy<std::result::Result<JSONSchema, String>> = Lazy::new(|| {
    let schema: Value = serde_json::from_str(SOURCE_DOCUMENT_SCHEMA).map_err(|e| e.to_string())?;
    let schema_static: &'static Value = Box::leak(Box::new(schema));
    JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(schema_static)
        .map_err(|e| e.to_string())
});

/// Validate a structured document against `source_document.v1.json`,
/// collecting every failing path.
pub fn validate_source_document(instance: &Value) -> Result<()> {
    let compiled = COMPILED
        .as_ref()
        .map_err(|e| NormalizeError::Config(format!("Input schema failed to compile: {}", e)))?;

    if let Err(errors) = compiled.validate(instance) {
        let errors: Vec<String> = errors
            .map(|error| format!("{} at '{}'", error, error.instance_path))
            .collect();
        return Err(NormalizeError::Schema { errors });
    }
    Ok(())
}
