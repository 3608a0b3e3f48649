//! Call options and the option splitter.
//!
//! A caller hands every operation one merged [`CallOptions`] value. Before it
//! goes on the wire it is split in two: the [`RunnableConfig`] part the
//! server's runtime understands, and the remaining caller-defined fields,
//! which travel separately as `kwargs`. Callbacks are stripped from the
//! config; they are local observers and never serialized.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::callbacks::Callbacks;
use crate::error::RemoteResult;
use crate::types::JsonMap;

fn is_false(value: &bool) -> bool {
    !*value
}

/// The execution configuration understood by the remote runtime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunnableConfig {
    /// Tags for this call and any sub-calls.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Metadata for this call and any sub-calls.
    #[serde(default, skip_serializing_if = "JsonMap::is_empty")]
    pub metadata: JsonMap,

    /// Name for the tracer run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_name: Option<String>,

    /// Maximum number of parallel calls the remote may make.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,

    /// Maximum recursion depth of the remote graph.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recursion_limit: Option<u32>,

    /// Runtime values for configurable fields of the remote runnable.
    #[serde(default, skip_serializing_if = "JsonMap::is_empty")]
    pub configurable: JsonMap,

    /// Identifier for the tracer run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,

    /// Local callbacks. Never serialized.
    #[serde(skip)]
    pub callbacks: Option<Callbacks>,
}

impl RunnableConfig {
    /// Serialize to the JSON object sent as `config`. Callbacks are dropped.
    pub fn to_wire(&self) -> RemoteResult<JsonMap> {
        match serde_json::to_value(remove_callbacks(self))? {
            Value::Object(map) => Ok(map),
            _ => Ok(JsonMap::new()),
        }
    }
}

/// Copy of `config` without callbacks; the original keeps its callbacks.
pub fn remove_callbacks(config: &RunnableConfig) -> RunnableConfig {
    RunnableConfig {
        callbacks: None,
        ..config.clone()
    }
}

/// The merged options a caller passes to an operation.
///
/// Recognized [`RunnableConfig`] fields are typed; anything else lands in
/// `extra` and is forwarded as `kwargs`. Deserializing from JSON routes
/// unknown keys into `extra` automatically:
///
/// ```
/// use remote_runnable::options::CallOptions;
///
/// let options: CallOptions = serde_json::from_value(serde_json::json!({
///     "tags": ["prod"],
///     "temperature": 0.2,
/// }))
/// .unwrap();
/// let (config, kwargs) = options.split();
/// assert_eq!(config.tags, vec!["prod".to_string()]);
/// assert_eq!(kwargs["temperature"], 0.2);
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallOptions {
    /// Tags for this call.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Metadata for this call.
    #[serde(default)]
    pub metadata: JsonMap,
    /// Name for the tracer run.
    #[serde(default)]
    pub run_name: Option<String>,
    /// Maximum number of parallel calls.
    #[serde(default)]
    pub max_concurrency: Option<usize>,
    /// Maximum recursion depth.
    #[serde(default)]
    pub recursion_limit: Option<u32>,
    /// Runtime values for configurable fields.
    #[serde(default)]
    pub configurable: JsonMap,
    /// Identifier for the tracer run.
    #[serde(default)]
    pub run_id: Option<Uuid>,
    /// Local callbacks.
    #[serde(skip)]
    pub callbacks: Option<Callbacks>,
    /// Caller-defined fields forwarded as `kwargs`.
    #[serde(flatten)]
    pub extra: JsonMap,
}

impl CallOptions {
    /// Create empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tag (builder-style).
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Add a metadata entry (builder-style).
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Set a configurable field value (builder-style).
    pub fn with_configurable(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.configurable.insert(key.into(), value.into());
        self
    }

    /// Attach callbacks (builder-style).
    pub fn with_callbacks(mut self, callbacks: impl Into<Callbacks>) -> Self {
        self.callbacks = Some(callbacks.into());
        self
    }

    /// Add a caller-defined field forwarded as a kwarg (builder-style).
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Separate into the runtime config and the remaining kwargs.
    pub fn split(self) -> (RunnableConfig, JsonMap) {
        let config = RunnableConfig {
            tags: self.tags,
            metadata: self.metadata,
            run_name: self.run_name,
            max_concurrency: self.max_concurrency,
            recursion_limit: self.recursion_limit,
            configurable: self.configurable,
            run_id: self.run_id,
            callbacks: self.callbacks,
        };
        (config, self.extra)
    }
}

/// Split optional caller options without consuming them.
///
/// Absent options yield an empty config and empty kwargs.
pub fn split_call_options(options: Option<&CallOptions>) -> (RunnableConfig, JsonMap) {
    options.cloned().unwrap_or_default().split()
}

/// Options that apply to a whole `batch` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchOptions {
    /// Maximum number of inputs the remote processes concurrently.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,

    /// Return per-input errors instead of failing the batch.
    /// Not supported by remote runnables; `batch` rejects it.
    #[serde(default, skip_serializing_if = "is_false")]
    pub return_exceptions: bool,
}

impl BatchOptions {
    /// Overlay these options onto a per-input config object. Batch keys win.
    pub fn merge_into(&self, config: &mut JsonMap) -> RemoteResult<()> {
        if let Value::Object(fields) = serde_json::to_value(self)? {
            config.extend(fields);
        }
        Ok(())
    }
}

/// Options passed to a call as a whole or one per input.
#[derive(Debug, Clone)]
pub enum BatchCallOptions {
    /// The same options for every input.
    Shared(CallOptions),
    /// One options value per input, matched by position.
    PerInput(Vec<CallOptions>),
}

impl From<CallOptions> for BatchCallOptions {
    fn from(options: CallOptions) -> Self {
        BatchCallOptions::Shared(options)
    }
}

impl From<Vec<CallOptions>> for BatchCallOptions {
    fn from(options: Vec<CallOptions>) -> Self {
        BatchCallOptions::PerInput(options)
    }
}

/// Include/exclude filters for `stream_log`.
///
/// Accepts camelCase keys when read from caller configuration
/// (`includeNames`, ...) and always writes the wire's snake_case keys
/// (`include_names`, ...). Unset filters are omitted from the request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "snake_case", deserialize = "camelCase"))]
pub struct StreamLogOptions {
    /// Only include runs with these names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_names: Option<Vec<String>>,
    /// Only include runs of these types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_types: Option<Vec<String>>,
    /// Only include runs with these tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_tags: Option<Vec<String>>,
    /// Exclude runs with these names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_names: Option<Vec<String>>,
    /// Exclude runs of these types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_types: Option<Vec<String>>,
    /// Exclude runs with these tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_tags: Option<Vec<String>>,
}

impl StreamLogOptions {
    /// The filters as wire fields, ready to merge into a request body.
    pub fn to_wire(&self) -> RemoteResult<JsonMap> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Ok(JsonMap::new()),
        }
    }
}
