use thiserror::Error;

pub type Result<T> = std::result::Result<T, GridError>;

#[derive(Error, Debug)]
pub enum GridError {
    #[error("Unknown object type: {0}. Use 'run', 'session', 'datastore', 'clusters' or 'history'.")]
    UnknownObjectType(String),

    #[error("Unknown column '{column}' for object type '{object_type}'")]
    UnknownColumn { object_type: String, column: String },

    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
