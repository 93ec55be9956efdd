//! Reusable prompts using Handlebars for templating. Handlebars adds
//! additional security controls since it can't do much out of the box
//! without registering your own helpers. Scraped web text should be
//! considered untrusted and Handlebars forces you to add only what
//! you need.

use std::fmt;

use anyhow::{Error, Result};
use handlebars::Handlebars;
use serde_json::json;

#[derive(Debug)]
pub enum Prompt {
    System,
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl From<Prompt> for String {
    fn from(item: Prompt) -> String {
        format!("{:?}", item)
    }
}

const SYSTEM_PROMPT: &str = r"{{instruction}}
Use the following (optional) external information if relevant:
{{context}}
";

pub fn templates<'a>() -> Result<Handlebars<'a>, Error> {
    let mut registry = Handlebars::new();
    registry.set_strict_mode(true);
    // Prompts are plain text, not HTML
    registry.register_escape_fn(handlebars::no_escape);
    registry.register_template_string(&Prompt::System.to_string(), SYSTEM_PROMPT)?;
    Ok(registry)
}

/// Render the content of the system turn that seeds every
/// conversation. An empty `context` leaves the context section empty
/// but the instruction intact.
pub fn system_prompt(instruction: &str, context: &str) -> Result<String, Error> {
    let rendered = templates()?.render(
        &Prompt::System.to_string(),
        &json!({
            "instruction": instruction,
            "context": context,
        }),
    )?;
    Ok(rendered)
}
