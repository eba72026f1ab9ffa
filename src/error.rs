use thiserror::Error;

pub type Result<T> = std::result::Result<T, FuzzyError>;

#[derive(Error, Debug)]
pub enum FuzzyError {
    #[error("line {line}: {message}  [{content}]")]
    Parse {
        line: usize,
        content: String,
        message: String,
    },

    #[error("schema error: {message}")]
    Schema { message: String },

    #[error("data error: {message}")]
    Data { message: String },

    #[error("lookup error: {message}")]
    Lookup { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

// Convenience macros for creating errors
#[macro_export]
macro_rules! schema_error {
    ($($arg:tt)*) => {
        $crate::error::FuzzyError::Schema {
            message: format!($($arg)*),
        }
    };
}

#[macro_export]
macro_rules! data_error {
    ($($arg:tt)*) => {
        $crate::error::FuzzyError::Data {
            message: format!($($arg)*),
        }
    };
}

#[macro_export]
macro_rules! lookup_error {
    ($($arg:tt)*) => {
        $crate::error::FuzzyError::Lookup {
            message: format!($($arg)*),
        }
    };
}

#[macro_export]
macro_rules! parse_error {
    ($line:expr, $content:expr, $($arg:tt)*) => {
        $crate::error::FuzzyError::Parse {
            line: $line,
            content: $content.to_string(),
            message: format!($($arg)*),
        }
    };
}
