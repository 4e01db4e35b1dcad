//! Our OpenAI driver, which we also use for LiteLLM, Ollama and other
//! compatible gateways.

use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs, FinishReason,
    },
};

use crate::{
    config::ServiceConfig,
    prelude::*,
    prompt::{RenderedMessage, Role},
};

use super::{Driver, LlmOpts};

/// Our OpenAI driver.
#[derive(Debug)]
pub struct OpenAiDriver {
    /// The OpenAI client.
    client: Client<OpenAIConfig>,
}

impl OpenAiDriver {
    /// Create a new OpenAI driver from our service configuration.
    pub fn new(config: &ServiceConfig) -> Self {
        let mut client_config = OpenAIConfig::new().with_api_key(config.api_key.clone());
        if let Some(api_base) = &config.api_base {
            client_config = client_config.with_api_base(api_base.clone());
        }
        Self {
            client: Client::with_config(client_config),
        }
    }
}

/// Convert our rendered messages to OpenAI request messages.
fn to_openai_messages(
    messages: &[RenderedMessage],
) -> Result<Vec<ChatCompletionRequestMessage>> {
    messages
        .iter()
        .map(|message| -> Result<ChatCompletionRequestMessage> {
            Ok(match message.role {
                Role::System => ChatCompletionRequestSystemMessageArgs::default()
                    .content(message.content.clone())
                    .build()?
                    .into(),
                Role::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(message.content.clone())
                    .build()?
                    .into(),
            })
        })
        .collect()
}

/// Build a chat completion request using our sampling options.
fn build_request(
    messages: &[RenderedMessage],
    llm_opts: &LlmOpts,
) -> Result<CreateChatCompletionRequest> {
    CreateChatCompletionRequestArgs::default()
        .model(llm_opts.model.clone())
        .messages(to_openai_messages(messages)?)
        .temperature(llm_opts.temperature)
        .max_completion_tokens(llm_opts.max_completion_tokens)
        .build()
        .context("Error building request")
}

#[async_trait]
impl Driver for OpenAiDriver {
    #[instrument(level = "debug", skip_all, fields(model = %llm_opts.model))]
    async fn chat_completion(
        &self,
        messages: &[RenderedMessage],
        llm_opts: &LlmOpts,
    ) -> Result<String> {
        let req = build_request(messages, llm_opts)?;
        trace!(?req, "Request");

        let chat = self.client.chat();
        let response = llm_opts
            .apply_timeout(chat.create(req))
            .await
            .context("Error calling OpenAI")?;

        if let Some(usage) = &response.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Token usage"
            );
        }

        let choice = response
            .choices
            .first()
            .ok_or_else(|| anyhow!("No choices in OpenAI response"))?;
        match choice.finish_reason {
            Some(FinishReason::ContentFilter) => {
                return Err(anyhow!("Content filter triggered"));
            }
            Some(FinishReason::Length) => {
                warn!(
                    max_completion_tokens = llm_opts.max_completion_tokens,
                    "Reply was cut off at the completion token limit"
                );
            }
            _ => {}
        }
        let content = choice
            .message
            .content
            .clone()
            .ok_or_else(|| anyhow!("OpenAI response has no content"))?;
        debug!(%content, "Response");
        Ok(content)
    }
}
