//! Scripted test doubles for the model and database boundaries.
//!
//! Both mocks record every call they receive so tests can assert on the
//! exact prompts, queries and bind variables a component produced.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{ArangoError, Result};
use crate::graph::{BindVars, GraphQueryExecutor, Row};
use crate::llm::{LanguageModel, Message, ToolCalling, ToolDefinition};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One request received by [`MockLanguageModel`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub messages: Vec<Message>,
    /// Tools bound to the request; `None` for plain generation.
    pub tools: Option<Vec<ToolDefinition>>,
}

/// A [`LanguageModel`] that replays scripted responses in order.
///
/// # Example
///
/// ```rust,ignore
/// use adk_arangodb::mock::MockLanguageModel;
///
/// let model = MockLanguageModel::new("mock")
///     .with_response("FOR p IN Person RETURN p.name")
///     .with_response("Alice and Bob.");
/// ```
#[derive(Debug, Default)]
pub struct MockLanguageModel {
    name: String,
    responses: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<RecordedRequest>>,
    tool_calling: bool,
    failure: Option<String>,
    delay: Option<Duration>,
}

impl MockLanguageModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    /// Queue a response. Responses are returned first-in first-out.
    pub fn with_response(self, response: impl Into<String>) -> Self {
        lock(&self.responses).push_back(response.into());
        self
    }

    /// Advertise the [`ToolCalling`] capability.
    pub fn with_tool_calling(mut self) -> Self {
        self.tool_calling = true;
        self
    }

    /// Fail every call with [`ArangoError::Model`].
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    async fn respond(&self, request: RecordedRequest) -> Result<String> {
        lock(&self.requests).push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.failure {
            return Err(ArangoError::Model { model: self.name.clone(), message: message.clone() });
        }
        lock(&self.responses).pop_front().ok_or_else(|| ArangoError::Model {
            model: self.name.clone(),
            message: "no scripted response left".to_string(),
        })
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, messages: Vec<Message>) -> Result<String> {
        self.respond(RecordedRequest { messages, tools: None }).await
    }

    fn tool_calling(self: Arc<Self>) -> Option<Arc<dyn ToolCalling>> {
        if self.tool_calling { Some(self as Arc<dyn ToolCalling>) } else { None }
    }
}

#[async_trait]
impl ToolCalling for MockLanguageModel {
    async fn generate_with_tools(
        &self,
        messages: Vec<Message>,
        tools: &[ToolDefinition],
    ) -> Result<String> {
        self.respond(RecordedRequest { messages, tools: Some(tools.to_vec()) }).await
    }
}

type Handler = dyn Fn(&str, &BindVars) -> Result<Vec<Row>> + Send + Sync;

/// A [`GraphQueryExecutor`] returning canned rows.
#[derive(Default)]
pub struct MockGraphExecutor {
    rows: Vec<Row>,
    handler: Option<Box<Handler>>,
    failure: Option<String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<(String, BindVars)>>,
    closed: AtomicBool,
}

impl MockGraphExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `rows` from every query.
    pub fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.rows = rows;
        self
    }

    /// Compute results from the query and bind variables. Takes precedence
    /// over [`with_rows`](Self::with_rows).
    pub fn with_handler(
        mut self,
        handler: impl Fn(&str, &BindVars) -> Result<Vec<Row>> + Send + Sync + 'static,
    ) -> Self {
        self.handler = Some(Box::new(handler));
        self
    }

    /// Fail every query with [`ArangoError::Execution`].
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every `(query, bind_vars)` pair executed so far.
    pub fn calls(&self) -> Vec<(String, BindVars)> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Whether [`close`](GraphQueryExecutor::close) was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GraphQueryExecutor for MockGraphExecutor {
    async fn execute(&self, query: &str, bind_vars: &BindVars) -> Result<Vec<Row>> {
        lock(&self.calls).push((query.to_string(), bind_vars.clone()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.failure {
            return Err(ArangoError::execution(message.clone()));
        }
        match &self.handler {
            Some(handler) => handler(query, bind_vars),
            None => Ok(self.rows.clone()),
        }
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
