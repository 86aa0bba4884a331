//! Prompt assembly: template + schema document + user input + named values.
//!
//! Templates use `{name}` placeholders, with `{{` / `}}` escaping literal
//! braces. Two placeholders are special: `{schema}` receives the schema
//! document and `{input}` receives the user input; a template lacking
//! either gets the missing part appended. Any other placeholder must be
//! covered by the caller-supplied named values — an uncovered one is a
//! configuration error raised before any model call.

use std::collections::HashMap;

use crate::error::{ForgeError, Result};
use crate::validate::{render_errors, FieldError};

/// Sentinel that should never appear in real templates.
const ESCAPE_SENTINEL: &str = "\x00LBRACE\x00";
/// Sentinel for escaped closing brace.
const ESCAPE_SENTINEL_CLOSE: &str = "\x00RBRACE\x00";

/// Built-in extraction prompt, used when the caller supplies no template.
pub const DEFAULT_TEMPLATE: &str = "\
You are an expert at extracting entities from user provided text, data or
information, and you preserve as much semantic meaning as possible.
Interpret numbers written as words as numbers when the schema requires it,
and make sure to identify separate entities.

Analyze the provided input from the user and generate the entities or
objects that match the requested output according to the OUTPUT SCHEMA.

Your output MUST be a single JSON value that conforms to the OUTPUT SCHEMA
below. All JSON object property names MUST be enclosed in double quotes.

You MUST take the types of the OUTPUT SCHEMA into account and adjust your
provided text to fit the required types.

Here is the OUTPUT SCHEMA:
{schema}

Input from user:
{input}";

/// Schema section appended to custom templates that never mention `{schema}`.
const SCHEMA_SECTION: &str = "\
Your output MUST be a single JSON value that conforms to the OUTPUT SCHEMA
below. All JSON object property names MUST be enclosed in double quotes.

Here is the OUTPUT SCHEMA:
{schema}";

/// Named values consumed once per attempt by [`assemble`].
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    /// Rendered schema document, substituted at `{schema}`.
    pub schema_json: String,
    /// Caller's user input, substituted at `{input}`.
    pub user_input: String,
    /// Caller-supplied values for any other placeholder.
    pub values: HashMap<String, String>,
}

/// Merge a template and context into a prompt string.
///
/// Resolution rules, in order:
/// 1. no `{schema}` in the template → the schema section is appended;
/// 2. no `{input}` → the user input is appended;
/// 3. every remaining placeholder must be a named value, checked before
///    any substitution so the failure surfaces before the first model call.
pub fn assemble(template: &str, ctx: &PromptContext) -> Result<String> {
    // Pass 1: protect escaped braces
    let mut rendered = template.replace("{{", ESCAPE_SENTINEL);
    rendered = rendered.replace("}}", ESCAPE_SENTINEL_CLOSE);

    if !rendered.contains("{schema}") {
        rendered = format!("{}\n\n{}", rendered, SCHEMA_SECTION);
    }
    if !rendered.contains("{input}") {
        rendered = format!("{}\n\n{}", rendered, "{input}");
    }

    // Fail fast on placeholders nothing will fill in.
    for name in placeholder_names(&rendered) {
        if name != "schema" && name != "input" && !ctx.values.contains_key(name) {
            return Err(ForgeError::InvalidConfig(format!(
                "unresolved placeholder '{{{}}}' in prompt template",
                name
            )));
        }
    }

    // Pass 2: substitute. Schema and input go first so caller values can
    // never be injected into them.
    rendered = rendered.replace("{schema}", &ctx.schema_json);
    rendered = rendered.replace("{input}", &ctx.user_input);
    for (key, value) in &ctx.values {
        let placeholder = format!("{{{}}}", key);
        rendered = rendered.replace(&placeholder, value);
    }

    // Pass 3: restore escaped braces
    rendered = rendered.replace(ESCAPE_SENTINEL, "{");
    rendered = rendered.replace(ESCAPE_SENTINEL_CLOSE, "}");
    Ok(rendered)
}

/// Render the correction request for a retry attempt.
///
/// Kept in one place so the phrasing fed back to the model can be tuned and
/// tested independently of the retry loop.
pub fn correction_block(previous_raw: &str, errors: &[FieldError]) -> String {
    format!(
        "\n\nYour previous response could not be parsed into the required \
         structure.\n\nPrevious response:\n{}\n\nErrors:\n{}\n\nTry again and \
         fix the errors. Return a single JSON value that conforms to the \
         OUTPUT SCHEMA.",
        previous_raw,
        render_errors(errors)
    )
}

/// Collect `{ident}` placeholder names from a (brace-protected) template.
fn placeholder_names(template: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let bytes = template.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            if let Some(close) = template[i + 1..].find(['{', '}']) {
                let end = i + 1 + close;
                if bytes[end] == b'}' {
                    let name = &template[i + 1..end];
                    if !name.is_empty()
                        && name
                            .chars()
                            .all(|c| c.is_ascii_alphanumeric() || c == '_')
                        && !names.contains(&name)
                    {
                        names.push(name);
                    }
                }
                i = end;
                continue;
            }
        }
        i += 1;
    }
    names
}
