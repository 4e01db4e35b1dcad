//! Reasoning service drivers.
//!
//! We only talk to OpenAI-compatible `/chat/completions` endpoints, which also
//! covers LiteLLM and Ollama gateways. The [`Driver`] trait keeps the rest of
//! the code independent of the client library.

use std::{error, fmt, time::Duration};

use clap::Args;
use tokio::time;

use crate::{prelude::*, prompt::RenderedMessage};

pub mod openai;

/// The model used unless `--model` is given.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Options controlling how we call the reasoning service.
#[derive(Args, Clone, Debug)]
pub struct LlmOpts {
    /// The model to use.
    #[clap(long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// The temperature to use for sampling, between 0.0 and 2.0. We default
    /// to a low value, because we want the same leaflet to produce the same
    /// records.
    #[clap(long, default_value_t = 0.1)]
    pub temperature: f32,

    /// An upper limit on the number of completion tokens to generate. Very
    /// long leaflets may produce truncated (and therefore unparsable) replies.
    #[clap(long, default_value_t = 2000)]
    pub max_completion_tokens: u32,

    /// A timeout, in seconds, for the reasoning service to return a complete
    /// response. By default we rely on the client's own timeouts.
    #[clap(long)]
    pub timeout: Option<u64>,
}

impl Default for LlmOpts {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_owned(),
            temperature: 0.1,
            max_completion_tokens: 2000,
            timeout: None,
        }
    }
}

impl LlmOpts {
    /// Apply our timeout, if any, to a request future.
    pub async fn apply_timeout<T, E>(
        &self,
        future: impl Future<Output = Result<T, E>>,
    ) -> Result<T, LlmError<E>> {
        match self.timeout {
            Some(secs) => match time::timeout(Duration::from_secs(secs), future).await {
                Ok(inner) => inner.map_err(LlmError::Native),
                Err(_) => Err(LlmError::Timeout),
            },
            None => future.await.map_err(LlmError::Native),
        }
    }
}

/// Interface trait for reasoning service drivers.
#[async_trait]
pub trait Driver: fmt::Debug + Send + Sync + 'static {
    /// Run a "chat completion" request, and return the text of the reply.
    async fn chat_completion(
        &self,
        messages: &[RenderedMessage],
        llm_opts: &LlmOpts,
    ) -> Result<String>;
}

/// An error which occurred while calling the reasoning service.
#[derive(Debug)]
pub enum LlmError<E> {
    /// An error reported by the client library.
    Native(E),

    /// The request took longer than `--timeout`.
    Timeout,
}

impl<E> fmt::Display for LlmError<E>
where
    E: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::Native(err) => write!(f, "LLM error: {err}"),
            LlmError::Timeout => write!(f, "LLM request timed out"),
        }
    }
}

impl<E> error::Error for LlmError<E>
where
    E: error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            LlmError::Native(err) => Some(err),
            LlmError::Timeout => None,
        }
    }
}
