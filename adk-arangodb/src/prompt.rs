//! Prompt templates for AQL generation and answer synthesis.
//!
//! Templates use Handlebars syntax (`{{question}}`) and render in strict
//! mode without HTML escaping, so query results and AQL pass through as is.

use std::collections::HashMap;
use std::sync::LazyLock;

use handlebars::{Handlebars, no_escape};
use regex::Regex;

use crate::error::{ArangoError, Result};

static REGISTRY: LazyLock<Handlebars<'static>> = LazyLock::new(|| {
    let mut registry = Handlebars::new();
    registry.set_strict_mode(true);
    registry.register_escape_fn(no_escape);
    registry
});

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\\)?\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}")
        .expect("placeholder pattern is valid")
});

/// Prompt asking the model to write an AQL query for a question.
pub const AQL_GENERATION_TEMPLATE: &str = "Task: Generate AQL query to retrieve data from an ArangoDB graph.
Instructions:
- Use only the provided attributes and collection names in the schema.
- Do not use any fields or collections not explicitly listed.
- Do not include any explanations or additional text.
- Return only a valid AQL query as output.

Schema:
{{schema}}

The question is:
{{question}}
";

/// Prompt asking the model to answer a question from query results.
pub const AQL_QA_TEMPLATE: &str = "You are an assistant that helps to form nice and human-understandable answers.
The information part contains the provided information that you must use to construct an answer.
The provided information is authoritative, you must never doubt it or try to use your internal knowledge to correct it.
Make the answer sound as a response to the question. Do not mention that you based the result on the given information.
Here is an example:

Question: Which developers worked on the AI project?
Context: [developer:Alice, developer:Bob]
Helpful Answer: Alice, Bob worked on the AI project.

Follow this example when generating answers.
If the provided information is empty, say that you don't know the answer.

Information:
{{context}}

Question: {{question}}
Helpful Answer:";

/// System prompt for answering from a tool result.
pub const FUNCTION_RESPONSE_SYSTEM: &str = "You are an assistant that helps to form nice and human
understandable answers based on the provided information from tools.
Do not add any other information that wasn't present in the tools, and use
very concise style in interpreting results!
";

/// A Handlebars prompt template with `{{name}}` placeholders.
///
/// # Example
///
/// ```rust,ignore
/// use adk_arangodb::PromptTemplate;
///
/// let template = PromptTemplate::new("Question: {{question}}");
/// let text = template.format(&[("question", "Who?".to_string())].into())?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self { template: template.into() }
    }

    /// The built-in AQL generation prompt (`schema`, `question`).
    pub fn aql_generation() -> Self {
        Self::new(AQL_GENERATION_TEMPLATE)
    }

    /// The built-in answer synthesis prompt (`context`, `question`).
    pub fn aql_qa() -> Self {
        Self::new(AQL_QA_TEMPLATE)
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Names of the simple `{{name}}` placeholders in order of first appearance.
    pub fn variables(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        // `\{{name}}` is a literal, not a placeholder
        for captures in PLACEHOLDER.captures_iter(&self.template) {
            if captures.get(1).is_some() {
                continue;
            }
            let name = &captures[2];
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        names
    }

    /// Render the template with `values`.
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::Validation`] if a placeholder has no value or
    /// the template does not parse.
    pub fn format(&self, values: &HashMap<&str, String>) -> Result<String> {
        REGISTRY
            .render_template(&self.template, values)
            .map_err(|e| ArangoError::Validation(format!("prompt template failed to render: {e}")))
    }
}
