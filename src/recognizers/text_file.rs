//! A "recognizer" which reads text recognized earlier.
//!
//! For an image at `leaflet.jpg` we read `leaflet.jpg.txt`, one fragment per
//! line. This makes runs reproducible without an OCR engine installed.

use std::ffi::OsString;

use crate::prelude::*;

use super::{TextRecognizer, split_fragments};

/// Reads recognized text from a sidecar file next to the image.
#[derive(Debug)]
pub struct TextFileRecognizer;

/// The sidecar path for an image.
pub fn sidecar_path(image: &Path) -> PathBuf {
    let mut name = OsString::from(image.as_os_str());
    name.push(".txt");
    PathBuf::from(name)
}

#[async_trait]
impl TextRecognizer for TextFileRecognizer {
    async fn recognize(&self, path: &Path) -> Result<Vec<String>> {
        let sidecar = sidecar_path(path);
        let text = tokio::fs::read_to_string(&sidecar)
            .await
            .with_context(|| format!("cannot read recognized text from {}", sidecar.display()))?;
        Ok(split_fragments(&text))
    }
}
