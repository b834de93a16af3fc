//! Per-provider response normalisation.
//!
//! Each function turns a raw response body into one flat, ordered list of
//! translations, or a protocol error when the shape is not recognised.

use crate::error::BackendError;
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(untagged)]
enum TextOrList {
    Text(String),
    List(Vec<String>),
}

impl From<TextOrList> for Vec<String> {
    fn from(value: TextOrList) -> Self {
        match value {
            TextOrList::Text(text) => vec![text],
            TextOrList::List(list) => list,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LocalServerResponse {
    Bare(TextOrList),
    Wrapped { translation: TextOrList },
}

/// Local server: a string, a list of strings, or `{"translation": ...}`.
pub fn normalize_local(body: &str) -> Result<Vec<String>, BackendError> {
    match serde_json::from_str::<LocalServerResponse>(body) {
        Ok(LocalServerResponse::Bare(value)) => Ok(value.into()),
        Ok(LocalServerResponse::Wrapped { translation }) => Ok(translation.into()),
        Err(_) => Err(unexpected("local server", body)),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum HostedItem {
    Object { translation_text: String },
    Text(String),
}

impl From<HostedItem> for String {
    fn from(item: HostedItem) -> Self {
        match item {
            HostedItem::Object { translation_text } => translation_text,
            HostedItem::Text(text) => text,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum HostedResponse {
    Items(Vec<HostedItem>),
    Single(HostedItem),
    Error { error: String },
}

/// Hosted inference: a list of `{translation_text}` objects (or strings),
/// or a single such object.
pub fn normalize_hosted(body: &str) -> Result<Vec<String>, BackendError> {
    match serde_json::from_str::<HostedResponse>(body) {
        Ok(HostedResponse::Items(items)) => Ok(items.into_iter().map(String::from).collect()),
        Ok(HostedResponse::Single(item)) => Ok(vec![item.into()]),
        Ok(HostedResponse::Error { error }) => Err(BackendError::protocol(format!(
            "hosted inference error: {}",
            error
        ))),
        Err(_) => Err(unexpected("hosted inference", body)),
    }
}

#[derive(Deserialize)]
struct DeepLResponse {
    translations: Vec<DeepLTranslation>,
}

#[derive(Deserialize)]
struct DeepLTranslation {
    text: String,
}

/// DeepL: `{"translations": [{"text": ...}, ...]}`.
pub fn normalize_deepl(body: &str) -> Result<Vec<String>, BackendError> {
    serde_json::from_str::<DeepLResponse>(body)
        .map(|r| r.translations.into_iter().map(|t| t.text).collect())
        .map_err(|_| unexpected("deepl", body))
}

fn unexpected(provider: &str, body: &str) -> BackendError {
    let shown: String = body.chars().take(200).collect();
    BackendError::protocol(format!("Unexpected {} response format: {}", provider, shown))
}
