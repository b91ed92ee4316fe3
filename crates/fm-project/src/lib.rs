//! fm-project: model document format, validation and compilation.
//!
//! A model document declares variables (optionally defined by expression
//! trees), breakpoint sets, gridded tables and table functions. It is read
//! from YAML or JSON, validated, and compiled into an `fm_graph::Model`.

pub mod compile;
pub mod schema;
pub mod validate;

pub use compile::{build_model, compile};
pub use schema::*;
pub use validate::{ValidationError, validate_model};

/// Newest document version this crate understands.
pub const LATEST_VERSION: u32 = 1;

pub type ProjectResult<T> = Result<T, ProjectError>;

#[derive(thiserror::Error, Debug)]
pub enum ProjectError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Model error: {0}")]
    Model(#[from] fm_graph::ModelError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn from_yaml_str(content: &str) -> ProjectResult<ModelDoc> {
    let doc: ModelDoc = serde_yaml::from_str(content)?;
    validate_model(&doc)?;
    Ok(doc)
}

pub fn from_json_str(content: &str) -> ProjectResult<ModelDoc> {
    let doc: ModelDoc = serde_json::from_str(content)?;
    validate_model(&doc)?;
    Ok(doc)
}

/// Load a document, choosing JSON for `.json` files and YAML otherwise.
pub fn load(path: &std::path::Path) -> ProjectResult<ModelDoc> {
    let content = std::fs::read_to_string(path)?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => from_json_str(&content),
        _ => from_yaml_str(&content),
    }
}

pub fn save_yaml(path: &std::path::Path, doc: &ModelDoc) -> ProjectResult<()> {
    validate_model(doc)?;
    let content = serde_yaml::to_string(doc)?;
    std::fs::write(path, content)?;
    Ok(())
}

pub fn save_json(path: &std::path::Path, doc: &ModelDoc) -> ProjectResult<()> {
    validate_model(doc)?;
    let content = serde_json::to_string_pretty(doc)?;
    std::fs::write(path, content)?;
    Ok(())
}
