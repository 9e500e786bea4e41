//! Question answering over an ArangoDB graph.
//!
//! [`GraphQaPipeline`] runs four strictly ordered stages per question:
//! the AQL model writes a query, the executor runs it, the first `top_k`
//! rows become the context, and the QA model turns that context into an
//! answer. Each stage waits for the previous one; invocations share no
//! mutable state and may run concurrently.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use adk_arangodb::{GraphQaPipeline, QaConfig};
//!
//! let pipeline = GraphQaPipeline::builder()
//!     .graph(Arc::new(graph))
//!     .llm(Arc::new(model))
//!     .schema("Person(name), Project(name), worked_on: Person -> Project")
//!     .config(QaConfig::builder().top_k(5).build()?)
//!     .build()?;
//!
//! let output = pipeline.invoke("Which developers worked on project X?").await?;
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info};

use crate::config::QaConfig;
use crate::error::{ArangoError, Result, Stage};
use crate::graph::{BindVars, GraphQueryExecutor, Row};
use crate::llm::{LanguageModel, Message, ToolCall, ToolCalling, ToolDefinition};
use crate::prompt::{FUNCTION_RESPONSE_SYSTEM, PromptTemplate};

/// Id of the synthetic tool call that carries the query context.
pub const TOOL_CALL_ID: &str = "call_arango_tool";

/// Name of the synthetic tool that carries the query context.
pub const TOOL_NAME: &str = "GetInformation";

/// The question plus any extra prompt variables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaInputs {
    pub question: String,
    /// Extra variables for the generation prompt. `schema` and `question`
    /// are reserved and ignored here.
    #[serde(default)]
    pub extra: HashMap<String, String>,
}

impl QaInputs {
    pub fn new(question: impl Into<String>) -> Self {
        Self { question: question.into(), extra: HashMap::new() }
    }

    pub fn with_input(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

impl From<&str> for QaInputs {
    fn from(question: &str) -> Self {
        Self::new(question)
    }
}

/// The result of one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QaAnswer {
    /// A synthesized answer.
    Answer(String),
    /// The raw query rows, when `return_direct` is set.
    Rows(Vec<Row>),
}

impl QaAnswer {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            QaAnswer::Answer(text) => Some(text),
            QaAnswer::Rows(_) => None,
        }
    }

    pub fn as_rows(&self) -> Option<&[Row]> {
        match self {
            QaAnswer::Rows(rows) => Some(rows),
            QaAnswer::Answer(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntermediateStep {
    /// The query after normalization.
    GeneratedQuery(String),
    /// The truncated rows handed to synthesis.
    Context(Vec<Row>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaOutput {
    pub result: QaAnswer,
    /// Present only when `return_intermediate_steps` is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intermediate_steps: Option<Vec<IntermediateStep>>,
}

/// Language tags stripped from a fence that has no newline.
const LANGUAGE_TAGS: &[&str] = &["aql", "arangodb", "sql", "json", "text"];

/// Strip surrounding whitespace and a markdown code fence (with an optional
/// language tag) from model output.
///
/// A reply that is only a fence normalizes to the empty query.
pub fn normalize_query(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let body = rest.strip_suffix("```").unwrap_or(rest);
    strip_language_tag(body).trim().to_string()
}

fn strip_language_tag(body: &str) -> &str {
    if let Some((first, rest)) = body.split_once('\n') {
        return if first.trim().chars().all(|c| c.is_ascii_alphanumeric()) { rest } else { body };
    }
    let body = body.trim_start();
    let (word, rest) = body.split_once(char::is_whitespace).unwrap_or((body, ""));
    if LANGUAGE_TAGS.iter().any(|tag| word.eq_ignore_ascii_case(tag)) { rest } else { body }
}

/// Generates, executes and answers AQL queries. Build with
/// [`GraphQaPipeline::builder()`].
pub struct GraphQaPipeline {
    graph: Arc<dyn GraphQueryExecutor>,
    aql_llm: Arc<dyn LanguageModel>,
    qa_llm: Arc<dyn LanguageModel>,
    tool_llm: Option<Arc<dyn ToolCalling>>,
    config: QaConfig,
    schema: String,
    aql_prompt: PromptTemplate,
    qa_prompt: PromptTemplate,
    function_response_system: String,
}

impl GraphQaPipeline {
    /// Create a new [`GraphQaPipelineBuilder`].
    pub fn builder() -> GraphQaPipelineBuilder {
        GraphQaPipelineBuilder::default()
    }

    pub fn config(&self) -> &QaConfig {
        &self.config
    }

    pub fn graph(&self) -> &Arc<dyn GraphQueryExecutor> {
        &self.graph
    }

    /// Answer a question.
    pub async fn invoke(&self, question: &str) -> Result<QaOutput> {
        self.invoke_with_inputs(QaInputs::new(question)).await
    }

    /// Answer a question with extra generation prompt variables.
    ///
    /// # Errors
    ///
    /// Errors from the models and the executor are returned unchanged, and
    /// no later stage runs. With `stage_timeout_ms` set, a stage that runs
    /// too long fails with [`ArangoError::Timeout`].
    pub async fn invoke_with_inputs(&self, inputs: QaInputs) -> Result<QaOutput> {
        let QaInputs { question, extra } = inputs;
        let mut steps = Vec::new();

        let mut variables: HashMap<&str, String> =
            extra.iter().map(|(key, value)| (key.as_str(), value.clone())).collect();
        variables.insert("schema", self.schema.clone());
        variables.insert("question", question.clone());
        let prompt = self.aql_prompt.format(&variables)?;

        let generated = self
            .run_stage(Stage::GenerateQuery, self.aql_llm.generate(vec![Message::user(prompt)]))
            .await?;
        let query = normalize_query(&generated);
        debug!(model = self.aql_llm.name(), query = %query, "generated AQL");
        steps.push(IntermediateStep::GeneratedQuery(query.clone()));

        let mut rows = if query.is_empty() {
            debug!("generated query is empty, skipping execution");
            Vec::new()
        } else {
            self.run_stage(Stage::Execute, self.graph.execute(&query, &BindVars::new())).await?
        };
        rows.truncate(self.config.top_k);

        if self.config.return_direct {
            info!(row_count = rows.len(), "query completed");
            return Ok(self.output(QaAnswer::Rows(rows), steps));
        }

        let context = serde_json::to_string(&rows)?;
        debug!(context = %context, "full context");
        steps.push(IntermediateStep::Context(rows));

        let answer = match &self.tool_llm {
            Some(tool_llm) => {
                let messages = self.function_response_messages(&question, context);
                let tools = [get_information_tool()];
                self.run_stage(Stage::Synthesize, tool_llm.generate_with_tools(messages, &tools))
                    .await?
            }
            None => {
                let variables =
                    HashMap::from([("context", context), ("question", question.clone())]);
                let prompt = self.qa_prompt.format(&variables)?;
                self.run_stage(Stage::Synthesize, self.qa_llm.generate(vec![Message::user(prompt)]))
                    .await?
            }
        };

        info!(model = self.qa_llm.name(), "query completed");
        Ok(self.output(QaAnswer::Answer(answer), steps))
    }

    /// Close the executor.
    pub async fn shutdown(self) -> Result<()> {
        self.graph.close().await
    }

    fn output(&self, result: QaAnswer, steps: Vec<IntermediateStep>) -> QaOutput {
        let intermediate_steps = self.config.return_intermediate_steps.then_some(steps);
        QaOutput { result, intermediate_steps }
    }

    fn function_response_messages(&self, question: &str, context: String) -> Vec<Message> {
        let call = ToolCall {
            id: TOOL_CALL_ID.to_string(),
            name: TOOL_NAME.to_string(),
            arguments: json!({ "question": question }),
        };
        vec![
            Message::system(self.function_response_system.clone()),
            Message::user(question),
            Message::Assistant { content: String::new(), tool_calls: vec![call] },
            Message::tool(TOOL_CALL_ID, context),
        ]
    }

    async fn run_stage<T>(
        &self,
        stage: Stage,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let result = match self.config.stage_timeout_ms {
            Some(timeout_ms) => {
                match tokio::time::timeout(Duration::from_millis(timeout_ms), call).await {
                    Ok(result) => result,
                    Err(_) => Err(ArangoError::Timeout { stage, timeout_ms }),
                }
            }
            None => call.await,
        };
        result.map_err(|e| {
            error!(%stage, error = %e, "stage failed");
            e
        })
    }
}

fn get_information_tool() -> ToolDefinition {
    ToolDefinition {
        name: TOOL_NAME.to_string(),
        description: "Retrieve information from the ArangoDB graph to answer the question."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "question": { "type": "string" }
            },
            "required": ["question"]
        }),
    }
}

/// Builder for constructing a [`GraphQaPipeline`].
///
/// `graph` is required, plus either `llm` or both `aql_llm` and `qa_llm`.
/// A role-specific model takes precedence over `llm`.
#[derive(Default)]
pub struct GraphQaPipelineBuilder {
    graph: Option<Arc<dyn GraphQueryExecutor>>,
    llm: Option<Arc<dyn LanguageModel>>,
    aql_llm: Option<Arc<dyn LanguageModel>>,
    qa_llm: Option<Arc<dyn LanguageModel>>,
    config: Option<QaConfig>,
    schema: Option<String>,
    aql_prompt: Option<PromptTemplate>,
    qa_prompt: Option<PromptTemplate>,
    function_response_system: Option<String>,
}

impl GraphQaPipelineBuilder {
    pub fn graph(mut self, graph: Arc<dyn GraphQueryExecutor>) -> Self {
        self.graph = Some(graph);
        self
    }

    /// Use one model for both query generation and answer synthesis.
    pub fn llm(mut self, llm: Arc<dyn LanguageModel>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Model that writes AQL.
    pub fn aql_llm(mut self, llm: Arc<dyn LanguageModel>) -> Self {
        self.aql_llm = Some(llm);
        self
    }

    /// Model that writes the final answer.
    pub fn qa_llm(mut self, llm: Arc<dyn LanguageModel>) -> Self {
        self.qa_llm = Some(llm);
        self
    }

    pub fn config(mut self, config: QaConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Schema description substituted into the generation prompt.
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn aql_prompt(mut self, prompt: PromptTemplate) -> Self {
        self.aql_prompt = Some(prompt);
        self
    }

    pub fn qa_prompt(mut self, prompt: PromptTemplate) -> Self {
        self.qa_prompt = Some(prompt);
        self
    }

    /// System message used when `use_function_response` is enabled.
    pub fn function_response_system(mut self, system: impl Into<String>) -> Self {
        self.function_response_system = Some(system.into());
        self
    }

    /// Build the [`GraphQaPipeline`].
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::Config`] if a required field is missing or the
    /// config fails [`QaConfig::validate`], and [`ArangoError::Capability`] if
    /// `use_function_response` is set but the QA model cannot take tools.
    pub fn build(self) -> Result<GraphQaPipeline> {
        let graph =
            self.graph.ok_or_else(|| ArangoError::Config("graph is required".to_string()))?;
        let aql_llm = self.aql_llm.or_else(|| self.llm.clone()).ok_or_else(|| {
            ArangoError::Config("either llm or both aql_llm and qa_llm are required".to_string())
        })?;
        let qa_llm = self.qa_llm.or(self.llm).ok_or_else(|| {
            ArangoError::Config("either llm or both aql_llm and qa_llm are required".to_string())
        })?;

        let config = self.config.unwrap_or_default();
        config.validate()?;

        let tool_llm = if config.use_function_response {
            let tool_llm = Arc::clone(&qa_llm).tool_calling().ok_or_else(|| {
                ArangoError::Capability {
                    model: qa_llm.name().to_string(),
                    message: "use_function_response requires a model that supports tool calling"
                        .to_string(),
                }
            })?;
            Some(tool_llm)
        } else {
            None
        };

        Ok(GraphQaPipeline {
            graph,
            aql_llm,
            qa_llm,
            tool_llm,
            config,
            schema: self.schema.unwrap_or_default(),
            aql_prompt: self.aql_prompt.unwrap_or_else(PromptTemplate::aql_generation),
            qa_prompt: self.qa_prompt.unwrap_or_else(PromptTemplate::aql_qa),
            function_response_system: self
                .function_response_system
                .unwrap_or_else(|| FUNCTION_RESPONSE_SYSTEM.to_string()),
        })
    }
}
