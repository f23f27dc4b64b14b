//! The single tool the model is offered: reading a section of an already fetched page

use serde::Deserialize;
use serde_json::json;

use crate::datasources::Page;
use crate::errors::{ExplainError, ExplainResult};
use crate::models::tool::{Tool, ToolCall};

pub const SECTION_TOOL_NAME: &str = "get_page_section";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SectionRequest {
    pub title: String,
    pub section: String,
}

pub fn section_tool() -> Tool {
    Tool::new(
        SECTION_TOOL_NAME,
        "Get the content of one section of one of the encyclopedia pages listed in the system message",
        json!({
            "type": "object",
            "properties": {
                "title": {
                    "type": "string",
                    "description": "The exact title of the page"
                },
                "section": {
                    "type": "string",
                    "description": "The exact name of the section, as listed for that page"
                }
            },
            "required": ["title", "section"]
        }),
    )
}

/// Decode a model tool call into a section request
pub fn parse_section_request(tool_call: &ToolCall) -> ExplainResult<SectionRequest> {
    if tool_call.name != SECTION_TOOL_NAME {
        return Err(ExplainError::InvalidToolCall(format!(
            "unknown tool '{}'",
            tool_call.name
        )));
    }
    serde_json::from_value(tool_call.arguments.clone()).map_err(|e| {
        ExplainError::InvalidToolCall(format!(
            "could not interpret arguments {} for {}: {}",
            tool_call.arguments, SECTION_TOOL_NAME, e
        ))
    })
}

/// Look up `section` of the first page titled `title` and serialize its content
pub fn resolve_section(title: &str, section: &str, pages: &[Page]) -> ExplainResult<String> {
    let page = pages
        .iter()
        .find(|page| page.title == title)
        .ok_or_else(|| ExplainError::PageNotFound(title.to_string()))?;

    let found = page
        .section(section)
        .ok_or_else(|| ExplainError::SectionNotFound {
            title: title.to_string(),
            section: section.to_string(),
        })?;

    Ok(serde_json::to_string_pretty(&found.content)?)
}
