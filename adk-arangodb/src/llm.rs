//! Language model boundary.
//!
//! The pipeline talks to models through two traits: [`LanguageModel`] for
//! plain text generation, and [`ToolCalling`] for models that understand tool
//! invocations and tool results in the conversation. A model advertises the
//! second capability through [`LanguageModel::tool_calling`], which the
//! pipeline resolves once at construction time.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// A tool invocation requested by the assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// A tool the model may call, described by a JSON schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// A chat message sent to a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System { content: String },
    User { content: String },
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool { tool_call_id: String, content: String },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message::System { content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message::User { content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant { content: content.into(), tool_calls: Vec::new() }
    }

    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Message::Tool { tool_call_id: tool_call_id.into(), content: content.into() }
    }

    /// The text content of the message.
    pub fn content(&self) -> &str {
        match self {
            Message::System { content }
            | Message::User { content }
            | Message::Assistant { content, .. }
            | Message::Tool { content, .. } => content,
        }
    }
}

/// A model that turns a conversation into text.
///
/// # Example
///
/// ```rust,ignore
/// use adk_arangodb::{LanguageModel, Message};
///
/// let answer = model.generate(vec![Message::user("Who directed Heat?")]).await?;
/// ```
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Model name used in logs and errors.
    fn name(&self) -> &str;

    /// Generate a completion for the conversation.
    async fn generate(&self, messages: Vec<Message>) -> Result<String>;

    /// Return the tool-calling capability of this model, if it has one.
    ///
    /// Models that support tools override this with `Some(self)`.
    fn tool_calling(self: Arc<Self>) -> Option<Arc<dyn ToolCalling>> {
        None
    }
}

/// The tool-binding capability of a model.
#[async_trait]
pub trait ToolCalling: Send + Sync {
    /// Generate a completion for a conversation that may contain tool calls
    /// and tool results, with `tools` bound to the model.
    async fn generate_with_tools(
        &self,
        messages: Vec<Message>,
        tools: &[ToolDefinition],
    ) -> Result<String>;
}
