//! Natural-language to command translation through a chat model
//!
//! The model is asked for a single JSON object
//! `{"command": "<name>", "argument": "<text>"}`. Replies are parsed in
//! layers: the whole text (code fences stripped), then the first balanced
//! `{...}` inside it. Anything else is a malformed reply.

use std::sync::OnceLock;

use futures::future::BoxFuture;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::http::{self, HttpError};
use super::{CommandResolver, PipelineError, ResolvedCommand};
use crate::command::CommandName;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranslateError {
    #[error("Malformed AI response: {0}")]
    Malformed(String),

    #[error("{0}")]
    Http(#[from] HttpError),
}

#[derive(Debug, Deserialize)]
struct TranslationJson {
    command: String,
    #[serde(default)]
    argument: Option<String>,
}

pub fn build_prompt(heard: &str) -> String {
    let mut commands = String::new();
    for (i, cmd) in CommandName::all().iter().enumerate() {
        let usage = if cmd.requires_argument() {
            format!("{} <name>", cmd.keyword())
        } else {
            cmd.keyword().to_string()
        };
        commands.push_str(&format!("{}. {} ({})\n", i + 1, usage, cmd.description()));
    }

    format!(
        r#"You are an AI assistant for a voice-controlled shell.
User's speech: "{heard}"

Identify which of the following {count} shell commands the user intends to execute and extract any necessary argument.
The supported commands are:
{commands}
Argument processing rules:
- Convert spoken numbers to digits (e.g., "one" to "1").
- Interpret spoken characters: "dot" or "period" -> ".", "underscore" or "underline" -> "_", "slash" -> "/", "backslash" -> "\", "dash" or "hyphen" -> "-"
- File and directory names can contain spaces. Preserve them.

Respond ONLY with a JSON object in the following format:
{{"command": "COMMAND_NAME", "argument": "ARGUMENT_VALUE"}}

- If the command does not take an argument (ls, pwd, clear), "argument" should be an empty string.
- If the speech is unclear, ambiguous, or does not map to any supported command, respond with:
  {{"command": "unknown", "argument": ""}}

Examples:
"list the files" -> {{"command": "ls", "argument": ""}}
"where am I?" -> {{"command": "pwd", "argument": ""}}
"go to my project folder" -> {{"command": "cd", "argument": "my project folder"}}
"create a file report dot txt" -> {{"command": "touch", "argument": "report.txt"}}
"remove the old_stuff directory" -> {{"command": "rm -r", "argument": "old_stuff"}}
"what is two plus two" -> {{"command": "unknown", "argument": ""}}

User's speech: "{heard}"
JSON Response:"#,
        count = CommandName::all().len(),
    )
}

fn fence_pattern() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?s)^```[A-Za-z]*\s*(.*?)\s*```$").ok())
        .as_ref()
}

/// Remove a surrounding Markdown code fence, with or without a language tag
fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    fence_pattern()
        .and_then(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(text)
}

/// Extract the first `{...}` object from a text blob, honoring strings
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in text[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return text.get(start..start + i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

fn from_json(parsed: TranslationJson) -> ResolvedCommand {
    ResolvedCommand {
        name: CommandName::lookup(&parsed.command),
        argument: parsed.argument.unwrap_or_default().trim().to_string(),
    }
}

/// Turn a model reply into a command
pub fn parse_translation(reply: &str) -> Result<ResolvedCommand, TranslateError> {
    let text = strip_code_fence(reply);

    if let Ok(parsed) = serde_json::from_str::<TranslationJson>(text) {
        return Ok(from_json(parsed));
    }

    if let Some(json_str) = extract_json_object(text) {
        if let Ok(parsed) = serde_json::from_str::<TranslationJson>(json_str) {
            return Ok(from_json(parsed));
        }
    }

    Err(TranslateError::Malformed(http::truncate_error_detail(
        reply.trim(),
        200,
    )))
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// [`CommandResolver`] backed by a Chat Completions endpoint
pub struct HttpTranslator {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl HttpTranslator {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client: http::build_client(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    async fn complete(&self, prompt: &str) -> Result<String, HttpError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.0,
        };
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(http::map_reqwest_error)?;
        let response = http::check_response_status(response).await?;
        let parsed: ChatResponse = response.json().await.map_err(http::map_reqwest_error)?;
        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }

    pub async fn translate(&self, heard: &str) -> Result<ResolvedCommand, TranslateError> {
        let prompt = build_prompt(heard);
        let reply = http::with_retry("Translation", || self.complete(&prompt)).await?;
        debug!("Translator replied: {}", reply);
        parse_translation(&reply)
    }
}

impl CommandResolver for HttpTranslator {
    fn resolve<'a>(
        &'a self,
        text: &'a str,
    ) -> BoxFuture<'a, Result<ResolvedCommand, PipelineError>> {
        Box::pin(async move {
            self.translate(text)
                .await
                .map_err(|e| PipelineError::Translator(e.to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(name: CommandName, argument: &str) -> ResolvedCommand {
        ResolvedCommand {
            name,
            argument: argument.to_string(),
        }
    }

    #[test]
    fn test_plain_json() {
        assert_eq!(
            parse_translation(r#"{"command": "mkdir", "argument": "test results 1"}"#).unwrap(),
            resolved(CommandName::MakeDir, "test results 1")
        );
    }

    #[test]
    fn test_fenced_json() {
        let reply = "```json\n{\"command\": \"rm -r\", \"argument\": \"old_stuff\"}\n```";
        assert_eq!(
            parse_translation(reply).unwrap(),
            resolved(CommandName::RemoveTree, "old_stuff")
        );
        let reply = "```\n{\"command\": \"ls\", \"argument\": \"\"}\n```";
        assert_eq!(parse_translation(reply).unwrap(), resolved(CommandName::List, ""));
    }

    #[test]
    fn test_json_embedded_in_prose() {
        let reply = r#"Sure! Here you go: {"command": "touch", "argument": "report.txt"} Hope that helps."#;
        assert_eq!(
            parse_translation(reply).unwrap(),
            resolved(CommandName::Touch, "report.txt")
        );
    }

    #[test]
    fn test_null_or_missing_argument_is_empty() {
        assert_eq!(
            parse_translation(r#"{"command": "pwd", "argument": null}"#).unwrap(),
            resolved(CommandName::Pwd, "")
        );
        assert_eq!(
            parse_translation(r#"{"command": "clear"}"#).unwrap(),
            resolved(CommandName::Clear, "")
        );
    }

    #[test]
    fn test_api_names_and_unknown() {
        assert_eq!(
            parse_translation(r#"{"command": "removeFile", "argument": "a.txt"}"#).unwrap(),
            resolved(CommandName::RemoveFile, "a.txt")
        );
        assert_eq!(
            parse_translation(r#"{"command": "unknown", "argument": ""}"#).unwrap(),
            ResolvedCommand::unknown()
        );
        assert_eq!(
            parse_translation(r#"{"command": "shutdown", "argument": ""}"#)
                .unwrap()
                .name,
            CommandName::Unknown
        );
    }

    #[test]
    fn test_malformed_reply() {
        let err = parse_translation("I cannot help with that.").unwrap_err();
        assert!(matches!(err, TranslateError::Malformed(_)));
        assert!(parse_translation(r#"{"argument": "x"}"#).is_err());
    }

    #[test]
    fn test_extract_json_ignores_braces_in_strings() {
        let text = r#"noise {"command": "cd", "argument": "a}b"} trailing"#;
        assert_eq!(
            extract_json_object(text),
            Some(r#"{"command": "cd", "argument": "a}b"}"#)
        );
    }

    #[test]
    fn test_prompt_lists_every_command() {
        let prompt = build_prompt("make a folder");
        for cmd in CommandName::all() {
            assert!(prompt.contains(cmd.keyword()), "{}", cmd.keyword());
        }
        assert!(prompt.contains("User's speech: \"make a folder\""));
        assert!(prompt.contains("8 shell commands"));
    }
}
