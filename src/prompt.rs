//! The extraction prompt.
//!
//! The prompt is configuration data, not code: a TOML file containing the
//! system message, a catalogue of known recognition errors, worked examples,
//! and Handlebars message templates. The only value supplied by the caller is
//! `raw_text`.

use handlebars::{Handlebars, no_escape};
use serde_json::Map;

use crate::{product::ProductRecord, prelude::*};

/// The built-in prompt, used unless `--prompt` is given.
const DEFAULT_EXTRACTION_PROMPT: &str = include_str!("prompt/extraction_prompt.toml");

/// A JSON Object value, without the surrounding [`Value::Object`] wrapper.
pub type JsonObject = Map<String, Value>;

/// Get our built-in extraction prompt.
pub fn default_extraction_prompt() -> ExtractionPrompt {
    toml::from_str::<ExtractionPrompt>(DEFAULT_EXTRACTION_PROMPT)
        .expect("failed to parse built-in extraction prompt")
}

/// Render a template using shared bindings.
pub trait RenderTemplate {
    type Output;

    /// Render the template.
    fn render_template(
        &self,
        handlebars: &Handlebars,
        bindings: &JsonObject,
    ) -> Result<Self::Output>;
}

/// A prompt for turning recognized text into product records.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractionPrompt {
    /// The developer (aka "system") message, if any.
    pub developer: Option<String>,

    /// Known recognition errors and their corrections.
    #[serde(default)]
    pub corrections: Vec<Correction>,

    /// Worked examples of recognized text and the expected records.
    #[serde(default)]
    pub examples: Vec<WorkedExample>,

    /// User messages.
    pub messages: Vec<Message>,
}

/// A known recognition error.
#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Correction {
    /// The text as the recognizer reports it.
    pub seen: String,

    /// What it should have been.
    pub meant: String,
}

/// Recognized fragments and the record we want for them.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkedExample {
    /// Recognized text fragments.
    pub ocr: Vec<String>,

    /// The record that should be extracted.
    pub output: ProductRecord,
}

/// A user message template.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Message {
    /// The user message.
    pub user: String,
}

/// Who is speaking in a rendered message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    System,
    User,
}

/// A message ready to send to the reasoning service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedMessage {
    pub role: Role,
    pub content: String,
}

impl ExtractionPrompt {
    /// Load a prompt from a TOML file.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let data = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt at path: {:?}", path))?;
        let prompt = toml::from_str::<Self>(&data)
            .with_context(|| format!("Failed to parse TOML from file at path: {:?}", path))?;
        prompt
            .render("")
            .with_context(|| format!("Invalid prompt template in {:?}", path))?;
        Ok(prompt)
    }

    /// Render the prompt for one image's recognized text.
    pub fn render(&self, raw_text: &str) -> Result<Vec<RenderedMessage>> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        // We're generating prompts, not HTML.
        handlebars.register_escape_fn(no_escape);
        let bindings = self.bindings(raw_text)?;
        self.render_template(&handlebars, &bindings)
    }

    /// Build the template bindings.
    fn bindings(&self, raw_text: &str) -> Result<JsonObject> {
        let mut examples = Vec::with_capacity(self.examples.len());
        for (idx, example) in self.examples.iter().enumerate() {
            let ocr = example
                .ocr
                .iter()
                .map(serde_json::to_string)
                .collect::<Result<Vec<_>, _>>()?
                .join(", ");
            let output = serde_json::to_string(&example.output)
                .context("failed to serialize worked example")?;
            examples.push(json!({
                "number": idx + 1,
                "ocr": ocr,
                "output": output,
            }));
        }

        let mut bindings = Map::new();
        bindings.insert("raw_text".to_owned(), Value::String(raw_text.to_owned()));
        bindings.insert(
            "corrections".to_owned(),
            serde_json::to_value(&self.corrections)?,
        );
        bindings.insert("examples".to_owned(), Value::Array(examples));
        Ok(bindings)
    }
}

impl RenderTemplate for ExtractionPrompt {
    type Output = Vec<RenderedMessage>;

    fn render_template(
        &self,
        handlebars: &Handlebars,
        bindings: &JsonObject,
    ) -> Result<Self::Output> {
        let mut messages = Vec::new();
        if let Some(developer) = &self.developer {
            messages.push(RenderedMessage {
                role: Role::System,
                content: handlebars.render_template(developer, bindings)?,
            });
        }
        for message in &self.messages {
            messages.push(message.render_template(handlebars, bindings)?);
        }
        Ok(messages)
    }
}

impl RenderTemplate for Message {
    type Output = RenderedMessage;

    fn render_template(
        &self,
        handlebars: &Handlebars,
        bindings: &JsonObject,
    ) -> Result<Self::Output> {
        Ok(RenderedMessage {
            role: Role::User,
            content: handlebars.render_template(&self.user, bindings)?,
        })
    }
}
