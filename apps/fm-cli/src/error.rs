pub type CliResult<T> = Result<T, CliError>;

#[derive(thiserror::Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Project(#[from] fm_project::ProjectError),

    #[error(transparent)]
    Model(#[from] fm_graph::ModelError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid assignment '{0}', expected NAME=VALUE")]
    Assignment(String),
}
