use thiserror::Error;

/// Feil fra sesjonsnivå-operasjoner (kalibrering, config, parsing).
/// Hot-path-funksjoner returnerer aldri denne; de gir degenererte men definerte verdier.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("calibration requires at least 4 point correspondences, got {0}")]
    TooFewCorrespondences(usize),

    #[error("source/destination point counts differ ({src} vs {dst})")]
    CorrespondenceMismatch { src: usize, dst: usize },

    #[error("calibration system is singular")]
    SingularSystem,

    #[error("invalid pixel scale: {0}")]
    InvalidScale(f64),

    #[error("invalid json at `{path}`: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("config io: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_path_to_error::Error<serde_json::Error>> for CoreError {
    fn from(err: serde_path_to_error::Error<serde_json::Error>) -> Self {
        let path = err.path().to_string();
        CoreError::Json { path, source: err.into_inner() }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
