//! Manual rotation labeling: page through `images/`, set an angle per image
//! on a drag gauge, and store it as `labels/<stem>.json`.

pub mod app;
pub mod error;
pub mod imaging;
pub mod session;
pub mod settings;
pub mod store;

pub use error::{LabelerError, Result};
pub use session::{Command, Preview, Session};
pub use settings::Settings;
pub use store::{DatasetLayout, ImageEntry};
