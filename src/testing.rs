//! In-memory fakes for the external collaborators, for unit tests.

use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use crate::{
    drivers::{Driver, LlmOpts},
    prelude::*,
    prompt::RenderedMessage,
    recognizers::TextRecognizer,
};

/// A driver which returns canned replies, in order.
#[derive(Debug)]
pub struct ScriptedDriver {
    replies: Mutex<Vec<Result<String, String>>>,
    calls: AtomicUsize,
    last_messages: Mutex<Vec<RenderedMessage>>,
}

impl ScriptedDriver {
    /// Reply with each of `replies` in turn, repeating the last one.
    pub fn with_replies(replies: Vec<Result<String, String>>) -> Self {
        Self {
            replies: Mutex::new(replies),
            calls: AtomicUsize::new(0),
            last_messages: Mutex::new(vec![]),
        }
    }

    /// Always reply with `reply`.
    pub fn replying(reply: &str) -> Self {
        Self::with_replies(vec![Ok(reply.to_owned())])
    }

    /// Always fail with `error`.
    pub fn failing(error: &str) -> Self {
        Self::with_replies(vec![Err(error.to_owned())])
    }

    /// How many requests have we seen?
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The messages of the most recent request.
    pub fn last_messages(&self) -> Vec<RenderedMessage> {
        self.last_messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Driver for ScriptedDriver {
    async fn chat_completion(
        &self,
        messages: &[RenderedMessage],
        _llm_opts: &LlmOpts,
    ) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_messages.lock().unwrap() = messages.to_vec();
        let mut replies = self.replies.lock().unwrap();
        let reply = if replies.len() > 1 {
            replies.remove(0)
        } else {
            replies.first().cloned().unwrap_or_else(|| Err("no reply".to_owned()))
        };
        reply.map_err(|err| anyhow!(err))
    }
}

/// A recognizer with fixed fragments per image path.
#[derive(Debug, Default)]
pub struct FakeRecognizer {
    texts: HashMap<PathBuf, Result<Vec<String>, String>>,
}

impl FakeRecognizer {
    /// Recognize `fragments` in `path`.
    pub fn with_text(mut self, path: &Path, fragments: &[&str]) -> Self {
        self.texts.insert(
            path.to_owned(),
            Ok(fragments.iter().map(|f| f.to_string()).collect()),
        );
        self
    }

    /// Fail when asked to recognize `path`.
    pub fn with_failure(mut self, path: &Path, error: &str) -> Self {
        self.texts.insert(path.to_owned(), Err(error.to_owned()));
        self
    }
}

#[async_trait]
impl TextRecognizer for FakeRecognizer {
    async fn recognize(&self, path: &Path) -> Result<Vec<String>> {
        match self.texts.get(path) {
            Some(Ok(fragments)) => Ok(fragments.clone()),
            Some(Err(err)) => Err(anyhow!(err.clone())),
            None => Ok(vec![]),
        }
    }
}

/// Build a JSON reply containing `count` products named `<prefix> <n>`.
pub fn reply_with_products(prefix: &str, count: usize) -> String {
    let products = (1..=count)
        .map(|n| {
            json!({
                "product_name": format!("{prefix} {n}"),
                "weight_volume": "",
                "price": format!("${n}.99"),
                "price_per_unit": "",
                "description": "",
            })
        })
        .collect::<Vec<_>>();
    Value::Array(products).to_string()
}
