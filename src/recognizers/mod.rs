//! Text recognizers.
//!
//! A recognizer turns an image into a flat list of text fragments, in the
//! order the engine reports them. Fragments carry no layout information.

use std::sync::Arc;

use clap::ValueEnum;

use crate::prelude::*;

pub mod tesseract;
pub mod text_file;

/// Interface to a text recognition engine.
#[async_trait]
pub trait TextRecognizer: Send + Sync + 'static {
    /// Recognize the text fragments in an image.
    async fn recognize(&self, path: &Path) -> Result<Vec<String>>;
}

/// The recognizers we support.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[clap(rename_all = "kebab-case")]
pub enum RecognizerType {
    /// Run the `tesseract` CLI.
    #[default]
    Tesseract,

    /// Read previously recognized text from `<image>.txt`.
    TextFile,
}

impl RecognizerType {
    /// Instantiate an appropriate recognizer.
    pub async fn create_recognizer(&self, lang: &str) -> Result<Arc<dyn TextRecognizer>> {
        match self {
            RecognizerType::Tesseract => {
                Ok(Arc::new(tesseract::TesseractRecognizer::new(lang).await?))
            }
            RecognizerType::TextFile => Ok(Arc::new(text_file::TextFileRecognizer)),
        }
    }
}

/// Split engine output into trimmed, non-empty fragments.
pub fn split_fragments(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_fragments_drops_blank_lines() {
        let text = "  HILLCREST RICE CAKE BARS 5PK/90G \r\n\n$1.99\n   \n\u{c}every day\n";
        assert_eq!(
            split_fragments(text),
            vec!["HILLCREST RICE CAKE BARS 5PK/90G", "$1.99", "every day"]
        );
    }

    #[test]
    fn split_fragments_of_blank_text_is_empty() {
        assert!(split_fragments(" \n\u{c}\n").is_empty());
    }
}
