//! Structural JSON-to-domain decoding ("reviving").
//!
//! Servers send domain values as plain JSON objects, mostly without a single
//! reliable tag. [`revive`] recognizes them by the set of keys they carry,
//! testing a fixed list of patterns in priority order:
//!
//! | # | Pattern | Required keys | Discriminator |
//! |---|---------|---------------|---------------|
//! | 1 | Document | `page_content`, `metadata` | none |
//! | 2 | Message family | `content`, `type`, `additional_kwargs` | `type` picks the kind |
//! | 3 | Generation family | `text`, `generation_info`, `type` | `type` picks the kind |
//! | 4 | AgentAction | `tool`, `tool_input`, `log`, `type` | `type == "AgentAction"` |
//! | 5 | AgentFinish | `return_values`, `log`, `type` | `type == "AgentFinish"` |
//! | 6 | LLMResult | `generations`, `run`, `type` | `type == "LLMResult"` |
//! | 7 | ChatPromptValue | `messages` | none (key presence only) |
//! | 8 | StringPromptValue | `text` | none (key presence only) |
//!
//! The first pattern whose keys are all present *and* whose builder accepts
//! the object wins. A rejected pattern falls through to the next one, so a
//! `{"text", "generation_info", "type": "Unknown"}` object ends up as a
//! string prompt. Objects matching nothing are revived field by field.
//!
//! The prompt-value patterns match on key presence alone and ignore any
//! `type` field.
//!
//! Falling through also reclassifies family members whose fields have the
//! wrong shape. A `ChatGeneration` with no `message`, or with a `message`
//! that is null or not itself a message, is revived as a string prompt from
//! its `text`. A message whose `content` is neither a string nor a list
//! (null included) matches no later pattern and is revived as a plain
//! object.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::types::{
    AgentAction, AgentFinish, AnyGeneration, ChatGeneration, Document, Generation, JsonMap,
    LlmResult, Message, MessageContent, MessageKind, PromptValue,
};

/// A revived JSON value: either a recognized domain value or a plain
/// structural value whose children have been revived.
#[derive(Debug, Clone, PartialEq)]
pub enum Revived {
    /// `null`, a boolean, a number or a string, passed through unchanged.
    Scalar(Value),
    /// An array with every element revived.
    Array(Vec<Revived>),
    /// An object that matched no pattern, with every field revived.
    Object(BTreeMap<String, Revived>),
    /// A document.
    Document(Document),
    /// A message or message chunk.
    Message(Message),
    /// A text generation or generation chunk.
    Generation(Generation),
    /// A chat generation or chat generation chunk.
    ChatGeneration(ChatGeneration),
    /// An agent tool call.
    AgentAction(AgentAction),
    /// An agent's final answer.
    AgentFinish(AgentFinish),
    /// A full model result.
    LlmResult(LlmResult),
    /// A chat or string prompt.
    PromptValue(PromptValue),
}

impl Revived {
    /// Short human-readable name of the variant, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Revived::Scalar(Value::Null) => "null",
            Revived::Scalar(Value::Bool(_)) => "boolean",
            Revived::Scalar(Value::Number(_)) => "number",
            Revived::Scalar(_) => "string",
            Revived::Array(_) => "array",
            Revived::Object(_) => "object",
            Revived::Document(_) => "Document",
            Revived::Message(_) => "message",
            Revived::Generation(_) => "Generation",
            Revived::ChatGeneration(_) => "ChatGeneration",
            Revived::AgentAction(_) => "AgentAction",
            Revived::AgentFinish(_) => "AgentFinish",
            Revived::LlmResult(_) => "LLMResult",
            Revived::PromptValue(_) => "prompt value",
        }
    }

    /// The message, if this is one.
    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Revived::Message(m) => Some(m),
            _ => None,
        }
    }

    /// The document, if this is one.
    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Revived::Document(d) => Some(d),
            _ => None,
        }
    }

    /// The elements, if this is a plain array.
    pub fn as_array(&self) -> Option<&[Revived]> {
        match self {
            Revived::Array(items) => Some(items),
            _ => None,
        }
    }

    /// The fields, if this is a plain object.
    pub fn as_object(&self) -> Option<&BTreeMap<String, Revived>> {
        match self {
            Revived::Object(fields) => Some(fields),
            _ => None,
        }
    }

    /// The string, if this is a string scalar.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Revived::Scalar(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Look up a field of a plain object.
    pub fn get(&self, key: &str) -> Option<&Revived> {
        self.as_object().and_then(|fields| fields.get(key))
    }

    /// Encode back to the wire format.
    pub fn to_wire(&self) -> Value {
        match self {
            Revived::Scalar(v) => v.clone(),
            Revived::Array(items) => Value::Array(items.iter().map(Revived::to_wire).collect()),
            Revived::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_wire()))
                    .collect(),
            ),
            Revived::Document(d) => d.to_wire(),
            Revived::Message(m) => m.to_wire(),
            Revived::Generation(g) => g.to_wire(),
            Revived::ChatGeneration(g) => g.to_wire(),
            Revived::AgentAction(a) => a.to_wire(),
            Revived::AgentFinish(f) => f.to_wire(),
            Revived::LlmResult(r) => r.to_wire(),
            Revived::PromptValue(p) => p.to_wire(),
        }
    }
}

impl From<Value> for Revived {
    fn from(value: Value) -> Self {
        revive(value)
    }
}

impl Serialize for Revived {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_wire().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Revived {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(revive)
    }
}

// ---------------------------------------------------------------------------
// Pattern table
// ---------------------------------------------------------------------------

type Builder = fn(&JsonMap) -> Option<Revived>;

struct Pattern {
    required: &'static [&'static str],
    build: Builder,
}

impl Pattern {
    fn matches(&self, obj: &JsonMap) -> bool {
        self.required.iter().all(|key| obj.contains_key(*key))
    }
}

/// Priority order is load-bearing: an object satisfying several key sets
/// resolves to the first one listed here.
const PATTERNS: &[Pattern] = &[
    Pattern {
        required: &["page_content", "metadata"],
        build: build_document,
    },
    Pattern {
        required: &["content", "type", "additional_kwargs"],
        build: build_message,
    },
    Pattern {
        required: &["text", "generation_info", "type"],
        build: build_generation,
    },
    Pattern {
        required: &["tool", "tool_input", "log", "type"],
        build: build_agent_action,
    },
    Pattern {
        required: &["return_values", "log", "type"],
        build: build_agent_finish,
    },
    Pattern {
        required: &["generations", "run", "type"],
        build: build_llm_result,
    },
    Pattern {
        required: &["messages"],
        build: build_chat_prompt,
    },
    Pattern {
        required: &["text"],
        build: build_string_prompt,
    },
];

/// Revive a decoded JSON value into domain values.
///
/// Pure and deterministic: no I/O, and the same input always produces the
/// same output.
pub fn revive(value: Value) -> Revived {
    match value {
        Value::Array(items) => Revived::Array(items.into_iter().map(revive).collect()),
        Value::Object(obj) => revive_object(obj),
        scalar => Revived::Scalar(scalar),
    }
}

/// Parse a JSON string and revive it.
pub fn deserialize(text: &str) -> Result<Revived, serde_json::Error> {
    serde_json::from_str::<Value>(text).map(revive)
}

fn revive_object(obj: Map<String, Value>) -> Revived {
    for pattern in PATTERNS {
        if pattern.matches(&obj) {
            if let Some(revived) = (pattern.build)(&obj) {
                return revived;
            }
        }
    }
    Revived::Object(obj.into_iter().map(|(k, v)| (k, revive(v))).collect())
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

fn str_field(obj: &JsonMap, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

/// A string field that may be missing or null; defaults to empty.
fn lenient_str_field(obj: &JsonMap, key: &str) -> Option<String> {
    match obj.get(key) {
        None | Some(Value::Null) => Some(String::new()),
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => None,
    }
}

/// An object field where null counts as empty.
fn map_field(obj: &JsonMap, key: &str) -> Option<JsonMap> {
    match obj.get(key) {
        None | Some(Value::Null) => Some(JsonMap::new()),
        Some(Value::Object(map)) => Some(map.clone()),
        Some(_) => None,
    }
}

/// An optional object field: `Some(None)` for null, `None` for a wrong type.
fn optional_map_field(obj: &JsonMap, key: &str) -> Option<Option<JsonMap>> {
    match obj.get(key) {
        None | Some(Value::Null) => Some(None),
        Some(Value::Object(map)) => Some(Some(map.clone())),
        Some(_) => None,
    }
}

fn non_null(obj: &JsonMap, key: &str) -> Option<Value> {
    obj.get(key).filter(|v| !v.is_null()).cloned()
}

fn type_field(obj: &JsonMap) -> Option<&str> {
    obj.get("type").and_then(Value::as_str)
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

fn build_document(obj: &JsonMap) -> Option<Revived> {
    Some(Revived::Document(Document {
        page_content: str_field(obj, "page_content")?,
        metadata: map_field(obj, "metadata")?,
    }))
}

#[derive(Clone, Copy)]
enum MessageTag {
    Human,
    System,
    Chat,
    Function,
    Tool,
    Ai,
}

/// Both the class-style (`HumanMessage`) and short (`human`) spellings are
/// accepted for full messages; chunks only have the class-style name.
fn parse_message_type(ty: &str) -> Option<(MessageTag, bool)> {
    let parsed = match ty {
        "HumanMessage" | "human" => (MessageTag::Human, false),
        "SystemMessage" | "system" => (MessageTag::System, false),
        "ChatMessage" | "chat" => (MessageTag::Chat, false),
        "FunctionMessage" | "function" => (MessageTag::Function, false),
        "ToolMessage" | "tool" => (MessageTag::Tool, false),
        "AIMessage" | "ai" => (MessageTag::Ai, false),
        "HumanMessageChunk" => (MessageTag::Human, true),
        "SystemMessageChunk" => (MessageTag::System, true),
        "ChatMessageChunk" => (MessageTag::Chat, true),
        "FunctionMessageChunk" => (MessageTag::Function, true),
        "ToolMessageChunk" => (MessageTag::Tool, true),
        "AIMessageChunk" => (MessageTag::Ai, true),
        _ => return None,
    };
    Some(parsed)
}

fn build_message(obj: &JsonMap) -> Option<Revived> {
    let (tag, chunk) = parse_message_type(type_field(obj)?)?;
    let content: MessageContent = serde_json::from_value(obj.get("content")?.clone()).ok()?;
    let kind = match tag {
        MessageTag::Human => MessageKind::Human,
        MessageTag::System => MessageKind::System,
        MessageTag::Ai => MessageKind::Ai,
        MessageTag::Chat => MessageKind::Chat {
            role: lenient_str_field(obj, "role")?,
        },
        MessageTag::Function => MessageKind::Function {
            name: lenient_str_field(obj, "name")?,
        },
        MessageTag::Tool => MessageKind::Tool {
            tool_call_id: lenient_str_field(obj, "tool_call_id")?,
        },
    };
    Some(Revived::Message(Message {
        kind,
        content,
        additional_kwargs: map_field(obj, "additional_kwargs")?,
        chunk,
    }))
}

fn build_generation(obj: &JsonMap) -> Option<Revived> {
    let (chat, chunk) = match type_field(obj)? {
        "ChatGenerationChunk" => (true, true),
        "ChatGeneration" => (true, false),
        "GenerationChunk" => (false, true),
        "Generation" => (false, false),
        _ => return None,
    };
    let text = str_field(obj, "text")?;
    let generation_info = optional_map_field(obj, "generation_info")?;
    if !chat {
        return Some(Revived::Generation(Generation {
            text,
            generation_info,
            chunk,
        }));
    }
    let message = match revive(obj.get("message")?.clone()) {
        Revived::Message(message) => message,
        _ => return None,
    };
    Some(Revived::ChatGeneration(ChatGeneration {
        text,
        generation_info,
        message,
        chunk,
    }))
}

fn build_agent_action(obj: &JsonMap) -> Option<Revived> {
    if type_field(obj)? != "AgentAction" {
        return None;
    }
    Some(Revived::AgentAction(AgentAction {
        tool: str_field(obj, "tool")?,
        tool_input: obj.get("tool_input")?.clone(),
        log: str_field(obj, "log")?,
    }))
}

fn build_agent_finish(obj: &JsonMap) -> Option<Revived> {
    if type_field(obj)? != "AgentFinish" {
        return None;
    }
    Some(Revived::AgentFinish(AgentFinish {
        return_values: map_field(obj, "return_values")?,
        log: str_field(obj, "log")?,
    }))
}

fn build_llm_result(obj: &JsonMap) -> Option<Revived> {
    if type_field(obj)? != "LLMResult" {
        return None;
    }
    let rows = match revive(obj.get("generations")?.clone()) {
        Revived::Array(rows) => rows,
        _ => return None,
    };
    let mut generations = Vec::with_capacity(rows.len());
    for row in rows {
        let Revived::Array(items) = row else {
            return None;
        };
        let mut parsed = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Revived::Generation(g) => parsed.push(AnyGeneration::Text(g)),
                Revived::ChatGeneration(g) => parsed.push(AnyGeneration::Chat(g)),
                _ => return None,
            }
        }
        generations.push(parsed);
    }
    Some(Revived::LlmResult(LlmResult {
        generations,
        llm_output: non_null(obj, "llm_output"),
        run: non_null(obj, "run"),
    }))
}

fn build_chat_prompt(obj: &JsonMap) -> Option<Revived> {
    let Value::Array(items) = obj.get("messages")? else {
        return None;
    };
    let mut messages = Vec::with_capacity(items.len());
    for item in items {
        match revive(item.clone()) {
            Revived::Message(m) => messages.push(m),
            _ => return None,
        }
    }
    Some(Revived::PromptValue(PromptValue::Chat { messages }))
}

fn build_string_prompt(obj: &JsonMap) -> Option<Revived> {
    Some(Revived::PromptValue(PromptValue::Text {
        text: str_field(obj, "text")?,
    }))
}
