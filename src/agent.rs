//! The structuring agent, which turns noisy recognized text into product
//! records with the help of the reasoning service.
//!
//! The agent never fails. Anything that goes wrong is logged, and the caller
//! gets an empty list, which is a normal outcome for an image.

use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::{
    drivers::{Driver, LlmOpts},
    prelude::*,
    product::ProductRecord,
    prompt::ExtractionPrompt,
};

/// Matches a reply wrapped in a code fence. Everything but the opening
/// backticks is optional, so one-line fences and truncated replies match too.
static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A```(?:[A-Za-z][\w+-]*)?[ \t]*\r?\n?(.*?)(?:```)?\z")
        .expect("failed to compile regex")
});

/// Turns recognized text into product records.
pub struct StructuringAgent {
    driver: Arc<dyn Driver>,
    prompt: ExtractionPrompt,
    llm_opts: LlmOpts,
}

impl StructuringAgent {
    /// Create a new agent.
    pub fn new(driver: Arc<dyn Driver>, prompt: ExtractionPrompt, llm_opts: LlmOpts) -> Self {
        Self {
            driver,
            prompt,
            llm_opts,
        }
    }

    /// Extract products from the recognized text of one image.
    #[instrument(level = "debug", skip_all, fields(chars = raw_text.len()))]
    pub async fn extract_products(&self, raw_text: &str) -> Vec<ProductRecord> {
        let messages = match self.prompt.render(raw_text) {
            Ok(messages) => messages,
            Err(err) => {
                warn!("Could not render extraction prompt: {err:?}");
                return vec![];
            }
        };

        let reply = match self.driver.chat_completion(&messages, &self.llm_opts).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!("LLM API error: {err:?}");
                return vec![];
            }
        };

        match parse_reply(&reply) {
            Ok(records) => {
                debug!(count = records.len(), "Parsed products from reply");
                records
            }
            Err(err) => {
                warn!(raw_reply = %reply, "Failed to parse LLM reply: {err:?}");
                vec![]
            }
        }
    }
}

/// Remove a surrounding code fence (```` ```json ... ``` ````), if present.
pub fn strip_code_fence(reply: &str) -> &str {
    let reply = reply.trim();
    match CODE_FENCE.captures(reply) {
        Some(caps) => caps.get(1).map_or("", |m| m.as_str()).trim(),
        None => reply,
    }
}

/// Parse a reply into product records.
///
/// The reply must contain JSON. We accept an array of products, an object with
/// a `products` array, or a single product object. Individual products which
/// can't be used are dropped with a warning.
pub fn parse_reply(reply: &str) -> Result<Vec<ProductRecord>> {
    let cleaned = strip_code_fence(reply);
    let value = serde_json::from_str::<Value>(cleaned).context("reply is not valid JSON")?;
    let candidates = match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("products") {
            Some(Value::Array(items)) => items,
            Some(other) => {
                obj.insert("products".to_owned(), other);
                vec![Value::Object(obj)]
            }
            None => vec![Value::Object(obj)],
        },
        other => {
            return Err(anyhow!("expected a JSON array of products, found {other}"));
        }
    };

    let mut records = Vec::with_capacity(candidates.len());
    for (idx, candidate) in candidates.into_iter().enumerate() {
        match ProductRecord::from_candidate(candidate) {
            Ok(record) => records.push(record),
            Err(err) => warn!(index = idx, "Dropping product from reply: {err:#}"),
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        product::tests::record, prompt::default_extraction_prompt,
        testing::ScriptedDriver,
    };

    const REPLY: &str = r#"[
  {"product_name": "HILLCREST RICE CAKE BARS", "weight_volume": "5PK/90G", "price": "$1.99", "price_per_unit": "$2.21 per 100g", "description": "Chocolate or Strawberry"},
  {"product_name": "Aussie Asparagus", "price": "$2.49"}
]"#;

    fn agent(driver: Arc<ScriptedDriver>) -> StructuringAgent {
        StructuringAgent::new(driver, default_extraction_prompt(), LlmOpts::default())
    }

    #[test]
    fn strips_code_fences() {
        let cases = [
            ("```json\n[1]\n```", "[1]"),
            ("```JSON\r\n[1]\r\n```", "[1]"),
            ("```\n[1]\n```", "[1]"),
            ("```[1]```", "[1]"),
            ("  \n```json\n[1]\n```\n ", "[1]"),
            ("```json\n[1, 2", "[1, 2"),
            ("```json \n[1]\n```", "[1]"),
            ("```json\t\r\n[1]\r\n```", "[1]"),
            ("```json[1]```", "[1]"),
            ("```json{\"a\": 1}```", "{\"a\": 1}"),
            ("[1]", "[1]"),
            ("  [1]  ", "[1]"),
        ];
        for (input, expected) in cases {
            assert_eq!(strip_code_fence(input), expected, "input: {input:?}");
        }
    }

    #[test]
    fn fenced_and_unfenced_replies_parse_identically() {
        let plain = parse_reply(REPLY).unwrap();
        let fenced = parse_reply(&format!("```json\n{REPLY}\n```")).unwrap();
        let bare_fence = parse_reply(&format!("```\n{REPLY}\n```")).unwrap();
        assert_eq!(plain.len(), 2);
        assert_eq!(plain, fenced);
        assert_eq!(plain, bare_fence);
    }

    #[test]
    fn loose_fences_parse_like_unfenced_replies() {
        let plain = parse_reply(REPLY).unwrap();
        let trailing_space = parse_reply(&format!("```json \n{REPLY}\n```")).unwrap();
        let one_line = parse_reply(&format!("```json{}```", REPLY.replace('\n', ""))).unwrap();
        assert_eq!(plain, trailing_space);
        assert_eq!(plain, one_line);
    }

    #[test]
    fn parsed_records_have_required_keys_and_defaults() {
        let records = parse_reply(REPLY).unwrap();
        assert_eq!(records[1], record("Aussie Asparagus", "$2.49"));
        for record in &records {
            assert!(record.product_name.is_some());
            assert!(record.price.is_some());
        }
    }

    #[test]
    fn unusable_products_are_dropped_individually() {
        let records = parse_reply(
            r#"[{"price": "$1.00"}, "junk", {"product_name": "TimTam", "price": "$3.99"}]"#,
        )
        .unwrap();
        assert_eq!(records, vec![record("TimTam", "$3.99")]);
    }

    #[test]
    fn accepts_object_wrappers() {
        let wrapped =
            parse_reply(r#"{"products": [{"product_name": "A", "price": "$1"}]}"#).unwrap();
        assert_eq!(wrapped, vec![record("A", "$1")]);

        let single = parse_reply(r#"{"product_name": "A", "price": "$1"}"#).unwrap();
        assert_eq!(single, vec![record("A", "$1")]);
    }

    #[test]
    fn malformed_replies_are_errors() {
        for reply in ["Sorry, I can't help with that.", "42", "\"text\"", "```json\n[{\n```"] {
            assert!(parse_reply(reply).is_err(), "reply: {reply:?}");
        }
    }

    #[tokio::test]
    async fn extract_products_sends_the_rendered_prompt() {
        let driver = Arc::new(ScriptedDriver::replying(REPLY));
        let records = agent(driver.clone())
            .extract_products("HILLCREST RICE CAKE BARS 5PK/90G\n$1.99")
            .await;
        assert_eq!(records.len(), 2);
        assert_eq!(driver.call_count(), 1);
        let sent = driver.last_messages();
        assert_eq!(sent.len(), 2);
        assert!(sent[1].content.contains("HILLCREST RICE CAKE BARS 5PK/90G\n$1.99"));
    }

    #[tokio::test]
    async fn extract_products_fails_soft() {
        let failing = Arc::new(ScriptedDriver::failing("401 Unauthorized"));
        assert!(agent(failing).extract_products("text").await.is_empty());

        let garbage = Arc::new(ScriptedDriver::replying("not json at all"));
        assert!(agent(garbage).extract_products("text").await.is_empty());
    }
}
