use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tera::{Context, Error as TeraError, Tera};

/// Built-in system prompt, rendered with `data`, `age`, `experience` and `n_sections`
pub const DEFAULT_SYSTEM_TEMPLATE: &str = include_str!("prompts/system.md");

/// Built-in system prompt for turning a question into search terms
pub const SEARCH_TERMS_PROMPT: &str = include_str!("prompts/search_terms.md");

/// The values a system prompt template may reference
#[derive(Debug, Serialize)]
struct SystemPromptContext<'a> {
    data: &'a str,
    age: u32,
    experience: &'a str,
    n_sections: usize,
}

pub fn load_prompt<T: Serialize>(template: &str, context_data: &T) -> Result<String, TeraError> {
    let mut tera = Tera::default();
    tera.add_raw_template("inline_template", template)?;
    let context = Context::from_serialize(context_data)?;
    let rendered = tera.render("inline_template", &context)?;
    Ok(rendered)
}

/// Read a template from disk. `~` is not expanded here, callers pass a resolved path.
pub fn read_prompt_file(template_file: impl Into<PathBuf>) -> Result<String, TeraError> {
    let template_path = template_file.into();
    fs::read_to_string(&template_path).map_err(|e| {
        TeraError::chain(
            format!("Failed to read template file {}", template_path.display()),
            e,
        )
    })
}

pub fn load_prompt_file<T: Serialize>(
    template_file: impl Into<PathBuf>,
    context_data: &T,
) -> Result<String, TeraError> {
    let template_content = read_prompt_file(template_file)?;
    load_prompt(&template_content, context_data)
}

/// Render the system prompt. Referencing any slot other than the four provided is an error.
pub fn build_system_prompt(
    template: &str,
    data: &str,
    age: u32,
    experience: &str,
    n_sections: usize,
) -> Result<String, TeraError> {
    load_prompt(
        template,
        &SystemPromptContext {
            data,
            age,
            experience,
            n_sections,
        },
    )
}
