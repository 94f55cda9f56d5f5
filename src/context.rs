//! Context assembly for the answer generator.
//!
//! Turns retrieved tariff records into (a) the labeled context block fed to
//! the chat model and (b) the list of reference URLs returned to the
//! caller. When retrieval finds nothing the assembler short-circuits to a
//! fixed sentinel and the chat model must not be invoked.

use crate::models::{SearchHit, TariffRecord};

/// Response text when retrieval produced no context.
pub const NO_RELEVANT_DATA: &str = "No relevant data found based on the context.";

/// Reference entry for a record with no HTS number.
pub const SOURCE_PLACEHOLDER: &str = "No valid HTS number";

/// Reference entry when there are no retrieved records at all.
pub const NO_SOURCES: &str = "Source not available for relevant data.";

/// Separator between records in the context block.
const RECORD_SEPARATOR: &str = "\n\n---\n\n";

/// Prompt sent to the chat model, with `{context}` and `{question}` slots.
const PROMPT_TEMPLATE: &str = "\
Answer the question based only on the following context:
{context}

---

Answer the question based on the above context: {question}

Give detailed responses.
";

/// The assembled context for one question: the text block handed to the
/// chat model and the reference URLs handed back to the caller.
#[derive(Debug, Clone)]
pub struct ContextBundle {
    pub context_text: String,
    pub sources: Vec<String>,
}

impl ContextBundle {
    /// True when there is no context and the chat model must be skipped.
    pub fn is_empty(&self) -> bool {
        self.context_text.is_empty()
    }
}

/// Assemble retrieved hits into a context bundle, preserving retrieval
/// order.
pub fn assemble_context(hits: &[SearchHit]) -> ContextBundle {
    let context_text = hits
        .iter()
        .map(|hit| render_record(&hit.record))
        .collect::<Vec<_>>()
        .join(RECORD_SEPARATOR);

    let mut sources: Vec<String> = hits
        .iter()
        .map(|hit| reference_url(hit.record.htsnumber.as_deref()))
        .collect();
    if sources.is_empty() {
        sources.push(NO_SOURCES.to_string());
    }

    ContextBundle {
        context_text,
        sources,
    }
}

/// Render one record as its labeled multi-line block. Missing values are
/// rendered as `None`, matching the canonical text convention.
fn render_record(record: &TariffRecord) -> String {
    let field = |value: &Option<String>| -> String {
        value.clone().unwrap_or_else(|| "None".to_string())
    };

    format!(
        "HTS Number: {}\nDescription: {}\nUnit of Quantity: {}\nGeneral Rate of Duty: {}\nSpecial Rate of Duty: {}\nExtra Rate of Duty: {}\nQuota Quantity: {}\nAdditional Duties: {}",
        field(&record.htsnumber),
        field(&record.description),
        field(&record.unitofquantity),
        field(&record.generalrateofduty),
        field(&record.specialrateofduty),
        field(&record.extrarateofduty),
        field(&record.quotaquantity),
        field(&record.additionalduties),
    )
}

/// Reference URL for a record, or the literal placeholder when the record
/// has no HTS number.
pub fn reference_url(htsnumber: Option<&str>) -> String {
    match htsnumber {
        Some(number) => format!("https://hts.usitc.gov/search?query={}", number),
        None => SOURCE_PLACEHOLDER.to_string(),
    }
}

/// Build the chat prompt from a context block and the user's question,
/// passed through unmodified.
pub fn build_prompt(context: &str, question: &str) -> String {
    PROMPT_TEMPLATE
        .replace("{context}", context)
        .replace("{question}", question)
}
