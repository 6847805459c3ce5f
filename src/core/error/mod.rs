use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigInvalidJson,
    ConfigInvalidValue,

    ValidationInvalidArgument,

    MappingLoadFailed,
    MappingAmbiguous,

    FileReadFailed,
    FileWriteFailed,

    InternalIoError,
    InternalJsonError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigInvalidJson => "config.invalid_json",
            ErrorCode::ConfigInvalidValue => "config.invalid_value",

            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",

            ErrorCode::MappingLoadFailed => "mapping.load_failed",
            ErrorCode::MappingAmbiguous => "mapping.ambiguous",

            ErrorCode::FileReadFailed => "file.read_failed",
            ErrorCode::FileWriteFailed => "file.write_failed",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
        }
    }

    /// Per-file failures are reported against the file and never abort a run.
    pub fn is_per_file(&self) -> bool {
        matches!(self, ErrorCode::FileReadFailed | ErrorCode::FileWriteFailed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidJsonDetails {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidValueDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArgumentDetails {
    pub field: String,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingLoadDetails {
    pub path: String,
    pub error: String,
}

/// One `old` pattern that more than one rule wants to rewrite differently.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RuleConflict {
    pub old: String,
    pub candidates: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingAmbiguousDetails {
    pub conflicts: Vec<RuleConflict>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileIoDetails {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalIoErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalJsonErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

fn to_details<T: Serialize>(details: T) -> Value {
    serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

/// A per-file failure surfaced in a report instead of aborting the run.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FileWarning {
    pub code: String,
    pub file: String,
    pub message: String,
}

impl FileWarning {
    pub fn from_error(file: impl Into<String>, err: &Error) -> Self {
        let message = match err.details.get("error").and_then(Value::as_str) {
            Some(detail) => format!("{}: {}", err.message, detail),
            None => err.message.clone(),
        };
        FileWarning {
            code: err.code.as_str().to_string(),
            file: file.into(),
            message,
        }
    }
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
        }
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
    ) -> Self {
        let details = to_details(InvalidArgumentDetails {
            field: field.into(),
            problem: problem.into(),
        });

        Self::new(
            ErrorCode::ValidationInvalidArgument,
            "Invalid argument",
            details,
        )
    }

    pub fn config_invalid_json(path: impl Into<String>, err: serde_json::Error) -> Self {
        let details = to_details(ConfigInvalidJsonDetails {
            path: path.into(),
            error: err.to_string(),
        });

        Self::new(
            ErrorCode::ConfigInvalidJson,
            "Invalid JSON in configuration",
            details,
        )
    }

    pub fn config_invalid_value(
        key: impl Into<String>,
        value: Option<String>,
        problem: impl Into<String>,
    ) -> Self {
        let details = to_details(ConfigInvalidValueDetails {
            key: key.into(),
            value,
            problem: problem.into(),
        });

        Self::new(
            ErrorCode::ConfigInvalidValue,
            "Invalid configuration value",
            details,
        )
    }

    pub fn mapping_load_failed(path: impl Into<String>, error: impl Into<String>) -> Self {
        let path = path.into();
        let details = to_details(MappingLoadDetails {
            path: path.clone(),
            error: error.into(),
        });

        Self::new(
            ErrorCode::MappingLoadFailed,
            format!("Failed to load mapping file '{}'", path),
            details,
        )
        .with_hint("Check the mapping path in repackage.json or pass --package-map / --symbol-map")
    }

    pub fn mapping_ambiguous(conflicts: Vec<RuleConflict>) -> Self {
        let count = conflicts.len();
        let details = to_details(MappingAmbiguousDetails { conflicts });

        Self::new(
            ErrorCode::MappingAmbiguous,
            format!("{} rename pattern(s) map to more than one target", count),
            details,
        )
        .with_hint("Resolve the conflicting mapping lines, or rerun with --allow-ambiguous")
    }

    pub fn file_read(path: impl Into<String>, error: impl Into<String>) -> Self {
        let path = path.into();
        let details = to_details(FileIoDetails {
            path: path.clone(),
            error: error.into(),
        });

        Self::new(
            ErrorCode::FileReadFailed,
            format!("Failed to read {}", path),
            details,
        )
    }

    pub fn file_write(path: impl Into<String>, error: impl Into<String>) -> Self {
        let path = path.into();
        let details = to_details(FileIoDetails {
            path: path.clone(),
            error: error.into(),
        });

        Self::new(
            ErrorCode::FileWriteFailed,
            format!("Failed to write {}", path),
            details,
        )
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        let details = to_details(InternalIoErrorDetails {
            error: error.into(),
            context,
        });

        Self::new(ErrorCode::InternalIoError, "IO error", details)
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        let details = to_details(InternalJsonErrorDetails {
            error: error.into(),
            context,
        });

        Self::new(ErrorCode::InternalJsonError, "JSON error", details)
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }
}
