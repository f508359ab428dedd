//! Naming assistant boundary.
//!
//! The resolver only sees the [`NamingAssistant`] trait: a batch of values in,
//! a partial map of batch position → proposed name out. [`request_names`]
//! does the batching and runs every proposal through the naming engine, so
//! whatever the assistant answers is sanitised and checked for collisions
//! before anyone uses it.
//!
//! With the `assistant` feature, [`ChatAssistant`] talks to an
//! OpenAI-compatible chat-completions endpoint (OpenRouter by default).

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{AntimagicError, AntimagicResult};
use crate::naming::{derive_name, NameLimits};

/// Proposes names for values the naming engine gave up on.
pub trait NamingAssistant {
    /// Propose names for `values`, avoiding `taken`.
    ///
    /// Keys are positions in `values`; omitted positions mean "no idea".
    fn propose_names(
        &self,
        values: &[&str],
        taken: &BTreeSet<String>,
    ) -> AntimagicResult<BTreeMap<usize, String>>;
}

/// Stand-in used when no assistant is configured; every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledAssistant;

impl NamingAssistant for DisabledAssistant {
    fn propose_names(
        &self,
        _values: &[&str],
        _taken: &BTreeSet<String>,
    ) -> AntimagicResult<BTreeMap<usize, String>> {
        Err(AntimagicError::assistant(
            "no naming assistant is configured (build with the `assistant` feature)",
        ))
    }
}

/// Ask the assistant for names in batches of `batch_size`.
///
/// Returns one slot per input value. A slot stays `None` when the assistant
/// skipped the value, proposed something that sanitises to nothing, or
/// proposed a name that is already taken (by `taken` or by an earlier slot).
pub fn request_names(
    assistant: &dyn NamingAssistant,
    values: &[&str],
    taken: &BTreeSet<String>,
    batch_size: usize,
) -> AntimagicResult<Vec<Option<String>>> {
    let mut taken = taken.clone();
    let mut names = Vec::with_capacity(values.len());

    for (batch_index, batch) in values.chunks(batch_size.max(1)).enumerate() {
        tracing::info!(batch = batch_index, size = batch.len(), "Requesting names from assistant");
        let proposals = assistant.propose_names(batch, &taken)?;

        for position in 0..batch.len() {
            let name = proposals
                .get(&position)
                .and_then(|proposal| derive_name(proposal, NameLimits::for_proposals()));
            match name {
                Some(name) if taken.contains(&name) => {
                    tracing::debug!(value = batch[position], name = %name, "Assistant proposal collides");
                    names.push(None);
                }
                Some(name) => {
                    taken.insert(name.clone());
                    names.push(Some(name));
                }
                None => names.push(None),
            }
        }
    }
    Ok(names)
}

#[cfg(feature = "assistant")]
pub use chat::ChatAssistant;

#[cfg(feature = "assistant")]
mod chat {
    use serde::Deserialize;
    use serde_json::{json, Value};
    use std::collections::{BTreeMap, BTreeSet};
    use std::time::Duration;

    use super::NamingAssistant;
    use crate::config::AntimagicConfig;
    use crate::error::{AntimagicError, AntimagicResult};

    const PROMPT: &str = "Pick suitable constant names for the following strings. \
        Constant names must be uppercase ASCII identifiers with words joined by _ \
        and no more than 5 words. A name must not start with a digit or contain \
        special characters. Never use the same name twice and never use a name \
        from the list of taken names.";

    /// HTTP client for an OpenAI-compatible chat-completions endpoint.
    #[derive(Debug, Clone)]
    pub struct ChatAssistant {
        client: reqwest::blocking::Client,
        endpoint: String,
        model: String,
        api_key_env: String,
    }

    #[derive(Deserialize)]
    struct ChatResponse {
        choices: Vec<Choice>,
    }

    #[derive(Deserialize)]
    struct Choice {
        message: MessageContent,
    }

    #[derive(Deserialize)]
    struct MessageContent {
        content: String,
    }

    impl ChatAssistant {
        pub fn from_config(config: &AntimagicConfig) -> AntimagicResult<Self> {
            let client = reqwest::blocking::Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .map_err(|e| AntimagicError::assistant(format!("cannot build HTTP client: {}", e)))?;
            Ok(Self {
                client,
                endpoint: config.assistant_endpoint.clone(),
                model: config.assistant_model.clone(),
                api_key_env: config.assistant_api_key_env.clone(),
            })
        }

        fn api_key(&self) -> AntimagicResult<String> {
            std::env::var(&self.api_key_env).map_err(|_| {
                AntimagicError::assistant(format!(
                    "{} not set. Export it to enable the naming assistant.",
                    self.api_key_env
                ))
            })
        }
    }

    impl NamingAssistant for ChatAssistant {
        fn propose_names(
            &self,
            values: &[&str],
            taken: &BTreeSet<String>,
        ) -> AntimagicResult<BTreeMap<usize, String>> {
            let api_key = self.api_key()?;
            let body = request_body(&self.model, values, taken);

            let response = self
                .client
                .post(&self.endpoint)
                .header("Authorization", format!("Bearer {}", api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .map_err(|e| AntimagicError::assistant(format!("request failed: {}", e)))?;

            if !response.status().is_success() {
                let status = response.status();
                let text = response.text().unwrap_or_default();
                return Err(AntimagicError::assistant(format!(
                    "API error {}: {}",
                    status, text
                )));
            }

            let chat: ChatResponse = response
                .json()
                .map_err(|e| AntimagicError::assistant(format!("failed to parse response: {}", e)))?;
            let content = chat
                .choices
                .first()
                .map(|c| c.message.content.as_str())
                .ok_or_else(|| AntimagicError::assistant("no choices in response"))?;

            parse_proposals(content, values.len())
        }
    }

    /// Chat request asking for one `stringN` field per value.
    pub(super) fn request_body(model: &str, values: &[&str], taken: &BTreeSet<String>) -> Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::with_capacity(values.len());
        for (index, value) in values.iter().enumerate() {
            let field = format!("string{}", index + 1);
            properties.insert(
                field.clone(),
                json!({ "type": "string", "description": value }),
            );
            required.push(Value::String(field));
        }

        let listing = values
            .iter()
            .enumerate()
            .map(|(index, value)| format!("string{}: {:?}", index + 1, value))
            .collect::<Vec<_>>()
            .join("\n");
        let taken = taken.iter().cloned().collect::<Vec<_>>().join(", ");

        json!({
            "model": model,
            "temperature": 0.0,
            "messages": [
                { "role": "system", "content": PROMPT },
                { "role": "user", "content": format!("{}\n\nTaken names: {}", listing, taken) }
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": "FieldNames",
                    "strict": true,
                    "schema": {
                        "type": "object",
                        "description": "Descriptions contain values of constants that the names should be assigned to",
                        "properties": properties,
                        "required": required,
                        "additionalProperties": false
                    }
                }
            }
        })
    }

    /// Map `{"string1": "NAME", ...}` back to batch positions.
    pub(super) fn parse_proposals(content: &str, len: usize) -> AntimagicResult<BTreeMap<usize, String>> {
        let fields: BTreeMap<String, Value> = serde_json::from_str(content)
            .map_err(|e| AntimagicError::assistant(format!("malformed proposal JSON: {}", e)))?;

        Ok((0..len)
            .filter_map(|index| {
                fields
                    .get(&format!("string{}", index + 1))
                    .and_then(Value::as_str)
                    .filter(|name| !name.trim().is_empty())
                    .map(|name| (index, name.to_string()))
            })
            .collect())
    }
}
