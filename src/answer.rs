//! Answer generation over retrieved context.
//!
//! The full question-answering flow: retrieve the nearest records, assemble
//! the context bundle, and — only when there is context — call the chat
//! completion backend with the templated prompt. The question reaches the
//! prompt unmodified.

use sqlx::SqlitePool;
use std::time::Duration;

use crate::config::{AnswerConfig, Config};
use crate::context::{self, ContextBundle};
use crate::db;
use crate::error::{Error, Result};
use crate::http::post_json_with_retry;
use crate::search;

/// The outcome of one question: the answer (or the no-data sentinel) and
/// one reference entry per retrieved record.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AskOutcome {
    pub response: String,
    pub sources: Vec<String>,
}

/// Answer a free-text question against the embedded tariff table.
///
/// Retrieval failures propagate; when retrieval returns nothing the chat
/// backend is never invoked and the response is the fixed sentinel.
pub async fn ask(config: &Config, pool: &SqlitePool, question: &str) -> Result<AskOutcome> {
    let hits = search::search(config, pool, question, config.retrieval.top_k).await?;
    let bundle: ContextBundle = context::assemble_context(&hits);

    let response = if bundle.is_empty() {
        context::NO_RELEVANT_DATA.to_string()
    } else {
        generate_answer(&config.answer, &bundle.context_text, question).await?
    };

    Ok(AskOutcome {
        response,
        sources: bundle.sources,
    })
}

/// Call the chat completion backend with the templated prompt.
pub async fn generate_answer(
    config: &AnswerConfig,
    context_text: &str,
    question: &str,
) -> Result<String> {
    if !config.is_enabled() {
        return Err(Error::AnswerBackend(
            "answer provider is disabled".to_string(),
        ));
    }

    let model = config
        .model
        .as_ref()
        .ok_or_else(|| Error::AnswerBackend("answer.model required".to_string()))?;
    let api_key = config
        .api_key
        .as_ref()
        .ok_or_else(|| Error::AnswerBackend("OPENAI_API_KEY not set in the environment".to_string()))?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| Error::AnswerBackend(e.to_string()))?;

    let prompt = context::build_prompt(context_text, question);
    let body = serde_json::json!({
        "model": model,
        "messages": [
            { "role": "user", "content": prompt }
        ],
    });

    let json = post_json_with_retry(
        &client,
        "https://api.openai.com/v1/chat/completions",
        Some(api_key),
        &body,
        config.max_retries,
    )
    .await
    .map_err(Error::AnswerBackend)?;

    parse_chat_response(&json)
}

/// Extract `choices[0].message.content` from a chat completion response.
fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            Error::AnswerBackend("malformed response: missing choices[0].message.content".to_string())
        })
}

/// CLI entry point for `tarix ask`.
pub async fn run_ask(config: &Config, question: &str) -> anyhow::Result<()> {
    if !config.embedding.is_enabled() {
        anyhow::bail!("Ask requires embeddings. Set [embedding] provider in config.");
    }
    if !config.answer.is_enabled() {
        anyhow::bail!("Ask requires an answer provider. Set [answer] provider in config.");
    }

    let pool = db::connect(config).await?;
    let outcome = match ask(config, &pool, question).await {
        Ok(o) => o,
        Err(e) => {
            pool.close().await;
            return Err(e.into());
        }
    };

    println!("{}", outcome.response);
    println!();
    println!("Sources:");
    for source in &outcome.sources {
        println!("  {}", source);
    }

    pool.close().await;
    Ok(())
}
