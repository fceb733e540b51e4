use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::errors::RelayError;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1200);
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(55);
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

pub const DEFAULT_INSTRUCTIONS: &str = "You answer questions using only the documents available \
through the file search tool. If the documents do not contain the answer, say so plainly. \
Keep answers concise and cite the documents you used.";

/// Which calling convention of the OpenAI API answers questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    /// Single synchronous `POST /responses` call.
    #[default]
    Responses,
    /// Assistant + Thread + Run workflow with status polling.
    Assistants,
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "responses" | "response" | "sync" => Ok(Self::Responses),
            "assistants" | "assistant" | "threads" | "async" => Ok(Self::Assistants),
            other => Err(format!(
                "unknown protocol '{other}', expected 'responses' or 'assistants'"
            )),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Responses => f.write_str("responses"),
            Self::Assistants => f.write_str("assistants"),
        }
    }
}

/// Documents the retrieval tool may search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentSources {
    pub vector_store_ids: Vec<String>,
    pub file_ids: Vec<String>,
}

impl DocumentSources {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vector_store_ids.is_empty() && self.file_ids.is_empty()
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub openai_api_key: String,
    pub openai_org_id: Option<String>,
    pub openai_model: String,
    pub api_base_url: Url,
    pub protocol: Protocol,
    pub sources: DocumentSources,
    pub instructions: String,
    pub max_search_results: Option<u32>,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
    pub http_timeout: Duration,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("openai_api_key", &"<redacted>")
            .field("openai_org_id", &self.openai_org_id)
            .field("openai_model", &self.openai_model)
            .field("api_base_url", &self.api_base_url.as_str())
            .field("protocol", &self.protocol)
            .field("sources", &self.sources)
            .field("max_search_results", &self.max_search_results)
            .field("poll_interval", &self.poll_interval)
            .field("poll_timeout", &self.poll_timeout)
            .field("http_timeout", &self.http_timeout)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Config`] when the API key or every document
    /// source is missing, or when an optional value cannot be parsed.
    pub fn from_env() -> Result<Self, RelayError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Blank values
    /// count as unset.
    ///
    /// # Errors
    ///
    /// Same conditions as [`AppConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RelayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let openai_api_key = get("OPENAI_API_KEY").ok_or_else(|| {
            RelayError::Config(
                "OPENAI_API_KEY is not set. Add your OpenAI API key to the function environment."
                    .to_string(),
            )
        })?;

        let mut vector_store_ids = get("OPENAI_VECTOR_STORE_IDS")
            .map(|v| split_ids(&v))
            .unwrap_or_default();
        if let Some(single) = get("OPENAI_VECTOR_STORE_ID") {
            for id in split_ids(&single) {
                if !vector_store_ids.contains(&id) {
                    vector_store_ids.push(id);
                }
            }
        }
        let file_ids = get("OPENAI_FILE_IDS")
            .map(|v| split_ids(&v))
            .unwrap_or_default();

        let sources = DocumentSources {
            vector_store_ids,
            file_ids,
        };
        if sources.is_empty() {
            return Err(missing_sources());
        }

        let base = get("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let api_base_url = Url::parse(&base)
            .map_err(|e| RelayError::Config(format!("OPENAI_BASE_URL '{base}' is invalid: {e}")))?;
        if !matches!(api_base_url.scheme(), "http" | "https") {
            return Err(RelayError::Config(format!(
                "OPENAI_BASE_URL must use http or https, got '{}'",
                api_base_url.scheme()
            )));
        }

        let protocol = match get("RELAY_PROTOCOL") {
            Some(raw) => raw
                .parse()
                .map_err(|e| RelayError::Config(format!("RELAY_PROTOCOL: {e}")))?,
            None => Protocol::default(),
        };

        let max_search_results = get("RELAY_MAX_SEARCH_RESULTS")
            .map(|raw| parse_number::<u32>("RELAY_MAX_SEARCH_RESULTS", &raw))
            .transpose()?
            .filter(|n| *n > 0);

        let poll_interval = get("RELAY_POLL_INTERVAL_MS")
            .map(|raw| parse_nonzero("RELAY_POLL_INTERVAL_MS", &raw))
            .transpose()?
            .map_or(DEFAULT_POLL_INTERVAL, Duration::from_millis);
        let poll_timeout = get("RELAY_POLL_TIMEOUT_SECS")
            .map(|raw| parse_nonzero("RELAY_POLL_TIMEOUT_SECS", &raw))
            .transpose()?
            .map_or(DEFAULT_POLL_TIMEOUT, Duration::from_secs);
        let http_timeout = get("RELAY_HTTP_TIMEOUT_SECS")
            .map(|raw| parse_nonzero("RELAY_HTTP_TIMEOUT_SECS", &raw))
            .transpose()?
            .map_or(DEFAULT_HTTP_TIMEOUT, Duration::from_secs);

        Ok(Self {
            openai_api_key,
            openai_org_id: get("OPENAI_ORG_ID"),
            openai_model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_base_url,
            protocol,
            sources,
            instructions: get("RELAY_INSTRUCTIONS")
                .unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_string()),
            max_search_results,
            poll_interval,
            poll_timeout,
            http_timeout,
        })
    }

    /// Fails when no vector store or file id is configured.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Config`] naming the variables to set.
    pub fn require_sources(&self) -> Result<&DocumentSources, RelayError> {
        if self.sources.is_empty() {
            return Err(missing_sources());
        }
        Ok(&self.sources)
    }
}

fn missing_sources() -> RelayError {
    RelayError::Config(
        "No document sources configured. Set OPENAI_VECTOR_STORE_IDS (or OPENAI_VECTOR_STORE_ID) \
         to one or more vector store ids, or OPENAI_FILE_IDS to one or more uploaded file ids."
            .to_string(),
    )
}

fn parse_number<T: FromStr>(key: &str, raw: &str) -> Result<T, RelayError> {
    raw.parse::<T>()
        .map_err(|_| RelayError::Config(format!("{key} must be a positive integer, got '{raw}'")))
}

// Durations of zero would disable the poll delay or fail every call.
fn parse_nonzero(key: &str, raw: &str) -> Result<u64, RelayError> {
    match parse_number::<u64>(key, raw)? {
        0 => Err(RelayError::Config(format!(
            "{key} must be a positive integer, got '{raw}'"
        ))),
        n => Ok(n),
    }
}

/// Splits a comma or whitespace separated id list, dropping blanks and
/// repeated ids.
#[must_use]
pub fn split_ids(raw: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for id in raw
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        if !ids.iter().any(|existing| existing == id) {
            ids.push(id.to_string());
        }
    }
    ids
}
