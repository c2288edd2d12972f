use async_trait::async_trait;
use quiz_core::model::{Question, QuestionDraft, QuestionError, QuestionId, QuestionKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::repository::{QuestionBank, StorageError};

/// Persisted shape of a question in a JSON bank file.
///
/// Mirrors the domain `Question` so the bank format does not leak into the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRecord {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub prompt: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub correct_answers: Vec<usize>,
    #[serde(default)]
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_items: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_items: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_matches: Option<BTreeMap<usize, usize>>,
}

impl QuestionRecord {
    /// Convert the record into a validated domain `Question`.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the record breaks a question invariant.
    pub fn into_question(self) -> Result<Question, QuestionError> {
        QuestionDraft {
            id: QuestionId::new(self.id),
            kind: self.kind,
            prompt: self.prompt,
            options: self.options,
            correct_answers: self.correct_answers,
            explanation: self.explanation,
            image_url: self.image_url.filter(|url| !url.trim().is_empty()),
            left_items: self.left_items,
            right_items: self.right_items,
            correct_matches: self.correct_matches,
        }
        .validate()
    }
}

/// Parse a JSON array of question records.
///
/// Malformed questions are logged and excluded rather than graded wrongly later.
/// Duplicate ids keep the first occurrence.
///
/// # Errors
///
/// Returns `StorageError::Serialization` for invalid JSON and
/// `StorageError::EmptyBank` when nothing usable remains.
pub fn parse_bank(json: &str) -> Result<Vec<Question>, StorageError> {
    let records: Vec<QuestionRecord> =
        serde_json::from_str(json).map_err(|e| StorageError::Serialization(e.to_string()))?;

    let mut questions: Vec<Question> = Vec::with_capacity(records.len());
    for record in records {
        let id = record.id;
        if questions.iter().any(|q| q.id().value() == id) {
            log::warn!("skipping question {id}: duplicate id");
            continue;
        }
        match record.into_question() {
            Ok(question) => questions.push(question),
            Err(err) => log::warn!("skipping question {id}: {err}"),
        }
    }

    if questions.is_empty() {
        return Err(StorageError::EmptyBank);
    }
    Ok(questions)
}

/// Question bank backed by a JSON file, re-read on every load.
#[derive(Debug, Clone)]
pub struct JsonFileBank {
    path: PathBuf,
}

impl JsonFileBank {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl QuestionBank for JsonFileBank {
    async fn load_questions(&self) -> Result<Vec<Question>, StorageError> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            StorageError::Connection(format!("{}: {e}", self.path.display()))
        })?;
        let questions = parse_bank(&raw)?;
        log::debug!(
            "loaded {} questions from {}",
            questions.len(),
            self.path.display()
        );
        Ok(questions)
    }
}
