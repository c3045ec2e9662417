use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Malformed pack descriptor: {0}")]
    MalformedSource(String),

    #[error("Invalid URL in field '{field}': {value} ({reason})")]
    InvalidReference {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Not a catalog response from {url} (content type: {content_type})\n\n\
             Hint: the API URL must point at a modpack endpoint, e.g.\n\
             https://api.technicpack.net/modpack/<slug>")]
    NotACatalog { url: String, content_type: String },

    #[error("Build '{build}' not found for pack '{pack}'")]
    UnknownBuild { pack: String, build: String },

    #[error("Invalid installation state: {0}")]
    InvalidState(String),

    #[error("Download of '{component}' failed: {reason}")]
    Transfer { component: String, reason: String },

    #[error("Extraction of '{component}' failed: {reason}")]
    Extract { component: String, reason: String },

    #[error("State file is corrupt: {0}\n\n\
             Hint: the state file will be discarded and the pack reinstalled.")]
    CorruptState(String),

    #[error("State file schema version {found} is not supported (expected {expected})")]
    SchemaMismatch { found: u32, expected: u32 },

    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{claimant}' tried to claim {} which is owned by '{owner}'", path.display())]
    FileOwnershipConflict {
        path: PathBuf,
        owner: String,
        claimant: String,
    },

    #[error("Mod loader installation failed: {0}")]
    Loader(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error aborts a whole run.
    ///
    /// Per-component failures (transfer, extraction, filesystem and ownership
    /// errors) are contained to the component that raised them.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::Transfer { .. }
                | Error::Extract { .. }
                | Error::Filesystem { .. }
                | Error::FileOwnershipConflict { .. }
        )
    }

    pub(crate) fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Filesystem {
            path: path.into(),
            source,
        }
    }
}
