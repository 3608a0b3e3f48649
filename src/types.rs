//! Domain values carried over the remote runnable wire format.
//!
//! The server speaks loosely-typed JSON; these are the strongly-typed values
//! the reviver reconstructs from it. Each type serializes to its canonical
//! wire encoding and deserializes *through the reviver*, so asking serde for
//! a `Message` applies exactly the same structural matching as reviving a
//! whole response and picking the message out of it.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::revive::Revived;

/// Free-form JSON object used for metadata, kwargs and generation info.
pub type JsonMap = Map<String, Value>;

// ============================================================================
// Documents
// ============================================================================

/// A piece of text with attached metadata.
///
/// Wire shape: `{"page_content": ..., "metadata": {...}, "type": "Document"}`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    /// The document text.
    pub page_content: String,
    /// Arbitrary metadata (source, page number, score, ...).
    pub metadata: JsonMap,
}

impl Document {
    /// Create a document with empty metadata.
    pub fn new(page_content: impl Into<String>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: JsonMap::new(),
        }
    }

    /// Attach one metadata entry (builder-style).
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Canonical wire encoding.
    pub fn to_wire(&self) -> Value {
        let mut obj = JsonMap::new();
        obj.insert("page_content".into(), Value::String(self.page_content.clone()));
        obj.insert("metadata".into(), Value::Object(self.metadata.clone()));
        obj.insert("type".into(), Value::String("Document".into()));
        Value::Object(obj)
    }
}

// ============================================================================
// Messages
// ============================================================================

/// Message body: plain text or a list of structured content parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text content.
    Text(String),
    /// Multi-part content (e.g. `{"type": "text", "text": ...}` or image parts).
    Parts(Vec<Value>),
}

impl MessageContent {
    fn to_wire(&self) -> Value {
        match self {
            MessageContent::Text(text) => Value::String(text.clone()),
            MessageContent::Parts(parts) => Value::Array(parts.clone()),
        }
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        MessageContent::Text(text.to_string())
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        MessageContent::Text(text)
    }
}

/// Which participant produced a message, plus the per-kind extra field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    /// A message from the human / end user.
    Human,
    /// A system instruction.
    System,
    /// A message with an arbitrary speaker role.
    Chat {
        /// Speaker role, e.g. `"assistant"` or `"critic"`.
        role: String,
    },
    /// The result of a function call.
    Function {
        /// Name of the function that produced the content.
        name: String,
    },
    /// The result of a tool call.
    Tool {
        /// Identifier of the tool call this message answers.
        tool_call_id: String,
    },
    /// A message produced by the model.
    Ai,
}

impl MessageKind {
    fn short_name(&self) -> &'static str {
        match self {
            MessageKind::Human => "human",
            MessageKind::System => "system",
            MessageKind::Chat { .. } => "chat",
            MessageKind::Function { .. } => "function",
            MessageKind::Tool { .. } => "tool",
            MessageKind::Ai => "ai",
        }
    }

    fn chunk_name(&self) -> &'static str {
        match self {
            MessageKind::Human => "HumanMessageChunk",
            MessageKind::System => "SystemMessageChunk",
            MessageKind::Chat { .. } => "ChatMessageChunk",
            MessageKind::Function { .. } => "FunctionMessageChunk",
            MessageKind::Tool { .. } => "ToolMessageChunk",
            MessageKind::Ai => "AIMessageChunk",
        }
    }

    /// Prefix used when rendering a conversation as a single string.
    pub fn display_prefix(&self) -> &str {
        match self {
            MessageKind::Human => "Human",
            MessageKind::System => "System",
            MessageKind::Chat { role } => role,
            MessageKind::Function { .. } => "Function",
            MessageKind::Tool { .. } => "Tool",
            MessageKind::Ai => "AI",
        }
    }
}

/// A chat message, or one incremental chunk of one.
///
/// Chunks are structurally identical to full messages; `chunk` keeps them
/// tagged separately so streamed output can be told apart from final output.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Who produced the message.
    pub kind: MessageKind,
    /// The message body.
    pub content: MessageContent,
    /// Provider-specific extras (function calls, tool calls, ...).
    pub additional_kwargs: JsonMap,
    /// Whether this is a streaming chunk rather than a complete message.
    pub chunk: bool,
}

impl Message {
    /// Create a complete message of the given kind.
    pub fn new(kind: MessageKind, content: impl Into<MessageContent>) -> Self {
        Self {
            kind,
            content: content.into(),
            additional_kwargs: JsonMap::new(),
            chunk: false,
        }
    }

    /// A human message.
    pub fn human(content: impl Into<MessageContent>) -> Self {
        Self::new(MessageKind::Human, content)
    }

    /// A system message.
    pub fn system(content: impl Into<MessageContent>) -> Self {
        Self::new(MessageKind::System, content)
    }

    /// An AI message.
    pub fn ai(content: impl Into<MessageContent>) -> Self {
        Self::new(MessageKind::Ai, content)
    }

    /// A chat message with an explicit role.
    pub fn chat(role: impl Into<String>, content: impl Into<MessageContent>) -> Self {
        Self::new(MessageKind::Chat { role: role.into() }, content)
    }

    /// A function result message.
    pub fn function(name: impl Into<String>, content: impl Into<MessageContent>) -> Self {
        Self::new(MessageKind::Function { name: name.into() }, content)
    }

    /// A tool result message.
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<MessageContent>) -> Self {
        Self::new(
            MessageKind::Tool {
                tool_call_id: tool_call_id.into(),
            },
            content,
        )
    }

    /// Turn this message into its chunk counterpart.
    pub fn into_chunk(mut self) -> Self {
        self.chunk = true;
        self
    }

    /// The `type` discriminator this message is written with.
    pub fn wire_type(&self) -> &'static str {
        if self.chunk {
            self.kind.chunk_name()
        } else {
            self.kind.short_name()
        }
    }

    /// Text of the message: the string content, or the concatenated `text`
    /// fields of `{"type": "text"}` parts.
    pub fn text(&self) -> String {
        match &self.content {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter(|part| part.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect(),
        }
    }

    /// Canonical wire encoding.
    pub fn to_wire(&self) -> Value {
        let mut obj = JsonMap::new();
        obj.insert("content".into(), self.content.to_wire());
        obj.insert(
            "additional_kwargs".into(),
            Value::Object(self.additional_kwargs.clone()),
        );
        obj.insert("type".into(), Value::String(self.wire_type().into()));
        match &self.kind {
            MessageKind::Chat { role } => {
                obj.insert("role".into(), Value::String(role.clone()));
            }
            MessageKind::Function { name } => {
                obj.insert("name".into(), Value::String(name.clone()));
            }
            MessageKind::Tool { tool_call_id } => {
                obj.insert("tool_call_id".into(), Value::String(tool_call_id.clone()));
            }
            MessageKind::Human | MessageKind::System | MessageKind::Ai => {}
        }
        Value::Object(obj)
    }
}

// ============================================================================
// Generations
// ============================================================================

/// One text completion produced by a model.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Generation {
    /// Generated text.
    pub text: String,
    /// Free-form provider metadata (finish reason, logprobs, ...).
    pub generation_info: Option<JsonMap>,
    /// Whether this is a streaming chunk.
    pub chunk: bool,
}

impl Generation {
    /// Create a complete generation with no metadata.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            generation_info: None,
            chunk: false,
        }
    }

    /// Canonical wire encoding.
    pub fn to_wire(&self) -> Value {
        let ty = if self.chunk {
            "GenerationChunk"
        } else {
            "Generation"
        };
        generation_wire(&self.text, self.generation_info.as_ref(), ty)
    }
}

/// A chat-model completion: text plus the message that carries it.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatGeneration {
    /// Generated text.
    pub text: String,
    /// Free-form provider metadata.
    pub generation_info: Option<JsonMap>,
    /// The generated message.
    pub message: Message,
    /// Whether this is a streaming chunk.
    pub chunk: bool,
}

impl ChatGeneration {
    /// Create a complete chat generation whose text is the message text.
    pub fn new(message: Message) -> Self {
        Self {
            text: message.text(),
            generation_info: None,
            message,
            chunk: false,
        }
    }

    /// Canonical wire encoding.
    pub fn to_wire(&self) -> Value {
        let ty = if self.chunk {
            "ChatGenerationChunk"
        } else {
            "ChatGeneration"
        };
        let mut value = generation_wire(&self.text, self.generation_info.as_ref(), ty);
        if let Value::Object(obj) = &mut value {
            obj.insert("message".into(), self.message.to_wire());
        }
        value
    }
}

fn generation_wire(text: &str, info: Option<&JsonMap>, ty: &str) -> Value {
    let mut obj = JsonMap::new();
    obj.insert("text".into(), Value::String(text.to_string()));
    obj.insert(
        "generation_info".into(),
        info.cloned().map(Value::Object).unwrap_or(Value::Null),
    );
    obj.insert("type".into(), Value::String(ty.into()));
    Value::Object(obj)
}

/// Either flavour of generation, as found inside an [`LlmResult`].
#[derive(Debug, Clone, PartialEq)]
pub enum AnyGeneration {
    /// A plain text generation.
    Text(Generation),
    /// A chat generation.
    Chat(ChatGeneration),
}

impl AnyGeneration {
    /// The generated text.
    pub fn text(&self) -> &str {
        match self {
            AnyGeneration::Text(g) => &g.text,
            AnyGeneration::Chat(g) => &g.text,
        }
    }

    fn to_wire(&self) -> Value {
        match self {
            AnyGeneration::Text(g) => g.to_wire(),
            AnyGeneration::Chat(g) => g.to_wire(),
        }
    }
}

/// Full result of a model call: one list of generations per prompt.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LlmResult {
    /// Generations, grouped per input prompt.
    pub generations: Vec<Vec<AnyGeneration>>,
    /// Free-form provider output (token usage, model name, ...).
    pub llm_output: Option<Value>,
    /// Run information attached by the server. Not part of the model output
    /// proper; kept separate so it never leaks into `llm_output`.
    pub run: Option<Value>,
}

impl LlmResult {
    /// The run identifier the server attached, if any.
    pub fn run_id(&self) -> Option<&str> {
        self.run
            .as_ref()
            .and_then(|run| run.get("run_id"))
            .and_then(Value::as_str)
    }

    /// Canonical wire encoding.
    pub fn to_wire(&self) -> Value {
        let mut obj = JsonMap::new();
        obj.insert(
            "generations".into(),
            Value::Array(
                self.generations
                    .iter()
                    .map(|row| Value::Array(row.iter().map(AnyGeneration::to_wire).collect()))
                    .collect(),
            ),
        );
        obj.insert(
            "llm_output".into(),
            self.llm_output.clone().unwrap_or(Value::Null),
        );
        obj.insert("run".into(), self.run.clone().unwrap_or(Value::Null));
        obj.insert("type".into(), Value::String("LLMResult".into()));
        Value::Object(obj)
    }
}

// ============================================================================
// Agent steps
// ============================================================================

/// An agent's decision to call a tool.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentAction {
    /// Name of the tool to call.
    pub tool: String,
    /// Tool input: a string or a structured object.
    pub tool_input: Value,
    /// The agent's reasoning text that led to this action.
    pub log: String,
}

impl AgentAction {
    /// Canonical wire encoding.
    pub fn to_wire(&self) -> Value {
        let mut obj = JsonMap::new();
        obj.insert("tool".into(), Value::String(self.tool.clone()));
        obj.insert("tool_input".into(), self.tool_input.clone());
        obj.insert("log".into(), Value::String(self.log.clone()));
        obj.insert("type".into(), Value::String("AgentAction".into()));
        Value::Object(obj)
    }
}

/// An agent's final answer.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentFinish {
    /// Named return values (usually at least `output`).
    pub return_values: JsonMap,
    /// The agent's final reasoning text.
    pub log: String,
}

impl AgentFinish {
    /// Canonical wire encoding.
    pub fn to_wire(&self) -> Value {
        let mut obj = JsonMap::new();
        obj.insert(
            "return_values".into(),
            Value::Object(self.return_values.clone()),
        );
        obj.insert("log".into(), Value::String(self.log.clone()));
        obj.insert("type".into(), Value::String("AgentFinish".into()));
        Value::Object(obj)
    }
}

// ============================================================================
// Prompt values
// ============================================================================

/// A formatted prompt, either as a message list or as raw text.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptValue {
    /// A chat prompt: an ordered list of messages.
    Chat {
        /// The prompt messages, in order.
        messages: Vec<Message>,
    },
    /// A plain string prompt.
    Text {
        /// The prompt text.
        text: String,
    },
}

impl PromptValue {
    /// Render the prompt as a single string.
    ///
    /// Chat prompts render one `Prefix: text` line per message.
    pub fn to_text(&self) -> String {
        match self {
            PromptValue::Text { text } => text.clone(),
            PromptValue::Chat { messages } => messages
                .iter()
                .map(|m| format!("{}: {}", m.kind.display_prefix(), m.text()))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Render the prompt as messages. A string prompt becomes one human message.
    pub fn to_messages(&self) -> Vec<Message> {
        match self {
            PromptValue::Chat { messages } => messages.clone(),
            PromptValue::Text { text } => vec![Message::human(text.as_str())],
        }
    }

    /// Canonical wire encoding.
    pub fn to_wire(&self) -> Value {
        let mut obj = JsonMap::new();
        match self {
            PromptValue::Chat { messages } => {
                obj.insert(
                    "messages".into(),
                    Value::Array(messages.iter().map(Message::to_wire).collect()),
                );
                obj.insert("type".into(), Value::String("ChatPromptValue".into()));
            }
            PromptValue::Text { text } => {
                obj.insert("text".into(), Value::String(text.clone()));
                obj.insert("type".into(), Value::String("StringPromptValue".into()));
            }
        }
        Value::Object(obj)
    }
}

// ============================================================================
// Log patches (stream_log)
// ============================================================================

/// One JSON Patch (RFC 6902) operation against the remote run log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    /// Insert `value` at `path`.
    Add {
        /// JSON Pointer into the run log.
        path: String,
        /// The value to insert.
        value: Revived,
    },
    /// Remove the value at `path`.
    Remove {
        /// JSON Pointer into the run log.
        path: String,
    },
    /// Replace the value at `path`.
    Replace {
        /// JSON Pointer into the run log.
        path: String,
        /// The replacement value.
        value: Revived,
    },
    /// Move the value at `from` to `path`.
    Move {
        /// Source JSON Pointer.
        from: String,
        /// Destination JSON Pointer.
        path: String,
    },
    /// Copy the value at `from` to `path`.
    Copy {
        /// Source JSON Pointer.
        from: String,
        /// Destination JSON Pointer.
        path: String,
    },
    /// Assert that the value at `path` equals `value`.
    Test {
        /// JSON Pointer into the run log.
        path: String,
        /// The expected value.
        value: Revived,
    },
}

impl PatchOperation {
    /// The JSON Pointer this operation targets.
    pub fn path(&self) -> &str {
        match self {
            PatchOperation::Add { path, .. }
            | PatchOperation::Remove { path }
            | PatchOperation::Replace { path, .. }
            | PatchOperation::Move { path, .. }
            | PatchOperation::Copy { path, .. }
            | PatchOperation::Test { path, .. } => path,
        }
    }
}

/// A batch of operations describing a change to the remote run log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLogPatch {
    /// Operations, to be applied in order.
    pub ops: Vec<PatchOperation>,
}

// ============================================================================
// serde glue: canonical encoding out, reviver in
// ============================================================================

macro_rules! wire_serde {
    ($ty:ty, $variant:ident, $expected:literal) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                self.to_wire().serialize(serializer)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                match Revived::deserialize(deserializer)? {
                    Revived::$variant(value) => Ok(value),
                    other => Err(de::Error::custom(format!(
                        "expected {}, found {}",
                        $expected,
                        other.kind_name()
                    ))),
                }
            }
        }
    };
}

wire_serde!(Document, Document, "Document");
wire_serde!(Message, Message, "a message");
wire_serde!(Generation, Generation, "Generation");
wire_serde!(ChatGeneration, ChatGeneration, "ChatGeneration");
wire_serde!(LlmResult, LlmResult, "LLMResult");
wire_serde!(AgentAction, AgentAction, "AgentAction");
wire_serde!(AgentFinish, AgentFinish, "AgentFinish");
wire_serde!(PromptValue, PromptValue, "a prompt value");
