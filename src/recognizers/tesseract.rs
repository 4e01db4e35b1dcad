//! Text recognition using the `tesseract` CLI tool.

use tokio::process::Command;

use crate::{command::check_for_command_failure, prelude::*};

use super::{TextRecognizer, split_fragments};

/// Page segmentation mode for sparse text in no particular order, which suits
/// leaflets better than the default full-page mode.
const SPARSE_TEXT_PSM: &str = "11";

/// Recognizer wrapping the `tesseract` CLI tool.
#[derive(Debug)]
pub struct TesseractRecognizer {
    /// The language to pass with `-l`. `None` uses tesseract's default.
    lang: Option<String>,
}

impl TesseractRecognizer {
    /// Create a new recognizer, checking that `tesseract` is installed.
    ///
    /// If `lang` is not installed, we fall back to tesseract's default
    /// language instead of failing on every image.
    #[instrument(level = "debug")]
    pub async fn new(lang: &str) -> Result<Self> {
        let output = Command::new("tesseract")
            .arg("--list-langs")
            .output()
            .await
            .context("cannot run tesseract (is it installed and on your PATH?)")?;
        check_for_command_failure("tesseract", &output)?;

        // Older versions print the language list to standard error.
        let listing = format!(
            "{}\n{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        let installed = parse_installed_langs(&listing);
        let selected = select_lang(lang, &installed);
        if selected.is_none() {
            warn!(
                requested = lang,
                ?installed,
                "tesseract language not installed, using tesseract's default"
            );
        }
        Ok(Self { lang: selected })
    }
}

/// Parse the output of `tesseract --list-langs`.
fn parse_installed_langs(listing: &str) -> Vec<String> {
    listing
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("List of available languages"))
        .map(str::to_owned)
        .collect()
}

/// Use `requested` only if every part of it (`eng+fra`) is installed.
fn select_lang(requested: &str, installed: &[String]) -> Option<String> {
    let all_installed = requested
        .split('+')
        .all(|part| installed.iter().any(|lang| lang == part));
    all_installed.then(|| requested.to_owned())
}

#[async_trait]
impl TextRecognizer for TesseractRecognizer {
    #[instrument(level = "debug", skip(self), fields(path = %path.display()))]
    async fn recognize(&self, path: &Path) -> Result<Vec<String>> {
        let mut cmd = Command::new("tesseract");
        cmd.arg(path).arg("stdout").args(["--psm", SPARSE_TEXT_PSM]);
        if let Some(lang) = &self.lang {
            cmd.args(["-l", lang]);
        }
        let output = cmd.output().await.context("cannot run tesseract")?;
        check_for_command_failure("tesseract", &output)?;
        Ok(split_fragments(&String::from_utf8_lossy(&output.stdout)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_language_listing() {
        let listing = "List of available languages in \"/usr/share/tessdata/\" (3):\neng\nosd\nfra\n";
        assert_eq!(parse_installed_langs(listing), vec!["eng", "osd", "fra"]);
    }

    #[test]
    fn falls_back_when_language_is_missing() {
        let installed = vec!["eng".to_owned(), "osd".to_owned()];
        assert_eq!(select_lang("eng", &installed).as_deref(), Some("eng"));
        assert_eq!(select_lang("deu", &installed), None);
        assert_eq!(select_lang("eng+deu", &installed), None);
    }
}
