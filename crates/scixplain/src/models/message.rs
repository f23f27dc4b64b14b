use serde::{Deserialize, Serialize};

use super::tool::ToolCall;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool call carrying the id the model assigned to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub id: String,
    pub tool_call: ToolCall,
}

/// A message to or from an LLM
///
/// Every role shares the same fields; the ones that do not apply stay empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    fn new(role: Role) -> Self {
        Message {
            role,
            content: None,
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    pub fn system<S: Into<String>>(text: S) -> Self {
        Self::new(Role::System).with_text(text)
    }

    pub fn user<S: Into<String>>(text: S) -> Self {
        Self::new(Role::User).with_text(text)
    }

    /// Create an empty assistant message, to be filled with text and/or tool requests
    pub fn assistant() -> Self {
        Self::new(Role::Assistant)
    }

    /// Create the result message answering the tool request `id`
    pub fn tool<I, N, S>(id: I, name: N, content: S) -> Self
    where
        I: Into<String>,
        N: Into<String>,
        S: Into<String>,
    {
        Message {
            tool_call_id: Some(id.into()),
            name: Some(name.into()),
            ..Self::new(Role::Tool).with_text(content)
        }
    }

    pub fn with_text<S: Into<String>>(mut self, text: S) -> Self {
        self.content = Some(text.into());
        self
    }

    pub fn with_tool_request<S: Into<String>>(mut self, id: S, tool_call: ToolCall) -> Self {
        self.tool_calls.push(ToolRequest {
            id: id.into(),
            tool_call,
        });
        self
    }

    /// The text of the message, empty when there is none
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}
