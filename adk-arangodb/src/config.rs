//! Configuration for the graph QA pipeline, the vector store and the
//! ArangoDB connection.

use serde::{Deserialize, Serialize};

use crate::distance::DistanceStrategy;
use crate::error::{ArangoError, Result};
use crate::graph::SYSTEM_ATTRIBUTES;
use crate::ingest::is_collection_name;

/// Configuration parameters for [`GraphQaPipeline`](crate::GraphQaPipeline).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QaConfig {
    /// Number of result rows passed on to answer synthesis.
    pub top_k: usize,
    /// Attach the generated query and the context to the output.
    pub return_intermediate_steps: bool,
    /// Return the query rows themselves instead of a synthesized answer.
    pub return_direct: bool,
    /// Hand the context to the model as a tool result instead of prompt text.
    pub use_function_response: bool,
    /// Upper bound for each boundary call, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_timeout_ms: Option<u64>,
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            return_intermediate_steps: false,
            return_direct: false,
            use_function_response: false,
            stage_timeout_ms: None,
        }
    }
}

impl QaConfig {
    /// Create a new builder for constructing a [`QaConfig`].
    pub fn builder() -> QaConfigBuilder {
        QaConfigBuilder::default()
    }

    /// Check the invariants that [`QaConfigBuilder::build`] enforces.
    ///
    /// Configs written as struct literals bypass the builder, so consumers
    /// call this again before use.
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::Config`] if:
    /// - `top_k == 0`
    /// - `stage_timeout_ms == Some(0)`
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(ArangoError::Config("top_k must be greater than zero".to_string()));
        }
        if self.stage_timeout_ms == Some(0) {
            return Err(ArangoError::Config(
                "stage_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`QaConfig`].
#[derive(Debug, Clone, Default)]
pub struct QaConfigBuilder {
    config: QaConfig,
}

impl QaConfigBuilder {
    /// Set the number of rows kept from the query result.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Attach intermediate steps to the output.
    pub fn return_intermediate_steps(mut self, enabled: bool) -> Self {
        self.config.return_intermediate_steps = enabled;
        self
    }

    /// Return query rows directly, skipping answer synthesis.
    pub fn return_direct(mut self, enabled: bool) -> Self {
        self.config.return_direct = enabled;
        self
    }

    /// Pass the context as a tool result. Requires a tool-calling QA model.
    pub fn use_function_response(mut self, enabled: bool) -> Self {
        self.config.use_function_response = enabled;
        self
    }

    /// Bound every boundary call by `timeout_ms` milliseconds.
    pub fn stage_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.config.stage_timeout_ms = Some(timeout_ms);
        self
    }

    /// Build the [`QaConfig`].
    ///
    /// # Errors
    ///
    /// See [`QaConfig::validate`].
    pub fn build(self) -> Result<QaConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Field layout and metric of a vector collection.
///
/// Stored documents look like `{_key, <text_field>, <embedding_field>, ...metadata}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorStoreConfig {
    pub collection_name: String,
    pub text_field: String,
    pub embedding_field: String,
    pub distance_strategy: DistanceStrategy,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            collection_name: "documents".to_string(),
            text_field: "text".to_string(),
            embedding_field: "embedding".to_string(),
            distance_strategy: DistanceStrategy::Cosine,
        }
    }
}

impl VectorStoreConfig {
    /// Create a new builder for constructing a [`VectorStoreConfig`].
    pub fn builder() -> VectorStoreConfigBuilder {
        VectorStoreConfigBuilder::default()
    }
}

/// Builder for constructing a validated [`VectorStoreConfig`].
#[derive(Debug, Clone, Default)]
pub struct VectorStoreConfigBuilder {
    config: VectorStoreConfig,
}

impl VectorStoreConfigBuilder {
    pub fn collection_name(mut self, name: impl Into<String>) -> Self {
        self.config.collection_name = name.into();
        self
    }

    pub fn text_field(mut self, field: impl Into<String>) -> Self {
        self.config.text_field = field.into();
        self
    }

    pub fn embedding_field(mut self, field: impl Into<String>) -> Self {
        self.config.embedding_field = field.into();
        self
    }

    pub fn distance_strategy(mut self, strategy: DistanceStrategy) -> Self {
        self.config.distance_strategy = strategy;
        self
    }

    /// Build the [`VectorStoreConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::Config`] if the collection name is not a valid
    /// ArangoDB name, a field is empty or a system attribute, or the text and
    /// embedding fields coincide.
    pub fn build(self) -> Result<VectorStoreConfig> {
        let c = &self.config;
        if !is_collection_name(&c.collection_name) {
            return Err(ArangoError::Config(format!(
                "invalid collection_name '{}'",
                c.collection_name
            )));
        }
        for (label, field) in [("text_field", &c.text_field), ("embedding_field", &c.embedding_field)]
        {
            if field.is_empty() {
                return Err(ArangoError::Config(format!("{label} must not be empty")));
            }
            if SYSTEM_ATTRIBUTES.contains(&field.as_str()) {
                return Err(ArangoError::Config(format!(
                    "{label} cannot be the system attribute '{field}'"
                )));
            }
        }
        if c.text_field == c.embedding_field {
            return Err(ArangoError::Config(format!(
                "text_field and embedding_field must differ (both '{}')",
                c.text_field
            )));
        }
        Ok(self.config)
    }
}

/// Connection settings for an ArangoDB server.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct ArangoConfig {
    pub url: String,
    pub database: String,
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    /// Rows per cursor batch; the server default applies when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u32>,
}

impl std::fmt::Debug for ArangoConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArangoConfig")
            .field("url", &self.url)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl Default for ArangoConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8529".to_string(),
            database: "_system".to_string(),
            username: "root".to_string(),
            password: None,
            batch_size: None,
        }
    }
}

impl ArangoConfig {
    pub fn new(url: impl Into<String>, database: impl Into<String>) -> Self {
        Self { url: url.into(), database: database.into(), ..Self::default() }
    }

    /// Set username and password.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = Some(password.into());
        self
    }

    /// Set the cursor batch size.
    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Read settings from `ARANGODB_URL`, `ARANGODB_DATABASE`,
    /// `ARANGODB_USERNAME` and `ARANGODB_PASSWORD`, falling back to the
    /// defaults for unset variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            url: lookup("ARANGODB_URL").unwrap_or(defaults.url),
            database: lookup("ARANGODB_DATABASE").unwrap_or(defaults.database),
            username: lookup("ARANGODB_USERNAME").unwrap_or(defaults.username),
            password: lookup("ARANGODB_PASSWORD"),
            batch_size: None,
        }
    }

    /// Check the settings before connecting.
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::Config`] for an empty url or database name, or
    /// a zero batch size.
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(ArangoError::Config("url must not be empty".to_string()));
        }
        if self.database.trim().is_empty() {
            return Err(ArangoError::Config("database must not be empty".to_string()));
        }
        if self.batch_size == Some(0) {
            return Err(ArangoError::Config("batch_size must be greater than zero".to_string()));
        }
        Ok(())
    }
}
