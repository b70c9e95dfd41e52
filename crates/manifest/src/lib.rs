pub mod error;
mod model;
mod reader;

pub use error::{ManifestError, ManifestResult};
pub use model::{EntryRejection, ManifestEntry};
pub use reader::{read_manifest, ManifestWarning};
