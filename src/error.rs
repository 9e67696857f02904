use std::path::PathBuf;

use thiserror::Error;

/// Everything that can stop a labeling session.
///
/// None of these are recovered from: they travel up to `main` and end the
/// process with a diagnostic.
#[derive(Debug, Error)]
pub enum LabelerError {
    #[error("images directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("failed to create labels directory {}: {source}", path.display())]
    DirectoryCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode image {}: {source}", path.display())]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("config file {} is corrupt: {source}", path.display())]
    ConfigCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("label file {} is corrupt: {source}", path.display())]
    LabelCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid setting {name} = {value}: expected a positive number")]
    InvalidSetting { name: &'static str, value: String },

    #[error("no png/jpg/jpeg/bmp images in {}", .0.display())]
    EmptyDataset(PathBuf),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LabelerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, LabelerError>;
