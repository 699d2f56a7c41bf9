use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::embeddings::EmbeddingProvider;
use crate::generation::GenerativeModel;
use crate::index::{DEFAULT_TOP_K, SearchHit, VectorIndex};
use crate::{Result, SynapseError};

/// Questions suggested when the caller does not ask for a specific count
pub const DEFAULT_QUESTION_COUNT: usize = 5;

/// Characters of a retrieved chunk shown in a source preview
pub const DEFAULT_PREVIEW_LENGTH: usize = 200;

/// Document text handed to the model when suggesting questions
const SUGGESTION_CONTEXT_CHARS: usize = 8000;

const PROMPT_PREAMBLE: &str = "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.";

/// A generated answer and the passages it was grounded on
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub answer: String,
    /// Retrieved passages, most similar first
    pub sources: Vec<Source>,
}

/// Attribution for one retrieved passage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Source {
    pub source: String,
    pub page: usize,
    /// Preview of the passage text
    pub page_content: String,
    pub score: f32,
}

/// Answers questions from indexed documents.
///
/// embed question -> search index -> prompt the generative model with the hits.
pub struct AnsweringEngine {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    model: Arc<dyn GenerativeModel>,
    top_k: usize,
    preview_length: usize,
}

impl AnsweringEngine {
    #[inline]
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        model: Arc<dyn GenerativeModel>,
    ) -> Self {
        Self {
            embedder,
            index,
            model,
            top_k: DEFAULT_TOP_K,
            preview_length: DEFAULT_PREVIEW_LENGTH,
        }
    }

    #[inline]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    #[inline]
    pub const fn with_preview_length(mut self, preview_length: usize) -> Self {
        self.preview_length = preview_length;
        self
    }

    /// Answer `question` from the most similar indexed chunks.
    ///
    /// An empty index is not an error: the model is still asked, without context,
    /// and the answer carries no sources.
    #[inline]
    pub async fn answer(&self, question: &str) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(SynapseError::InvalidInput(
                "query must not be empty".to_string(),
            ));
        }

        let query_vector = self.embedder.embed(question).await?;
        let hits = self.index.search(&query_vector, self.top_k).await?;

        if hits.is_empty() {
            warn!("No indexed passages matched; answering without context");
        } else {
            debug!(
                "Retrieved {} passages (best score {:.3})",
                hits.len(),
                hits[0].score
            );
        }

        let context: Vec<&str> = hits.iter().map(|hit| hit.chunk.content.as_str()).collect();
        let prompt = build_prompt(&context, question);
        let answer = self.model.generate(&prompt).await?;

        info!(
            "Answered question with {} using {} sources",
            self.model.model_name(),
            hits.len()
        );

        Ok(Answer {
            answer: answer.trim().to_string(),
            sources: hits
                .into_iter()
                .map(|hit| self.to_source(hit))
                .collect(),
        })
    }

    /// Ask the model for `count` questions a reader could ask about `text`
    #[inline]
    pub async fn suggest_questions(&self, text: &str, count: usize) -> Result<Vec<String>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SynapseError::InvalidInput(
                "document content must not be empty".to_string(),
            ));
        }
        if count == 0 {
            return Err(SynapseError::InvalidInput(
                "question count must be greater than 0".to_string(),
            ));
        }

        let prompt = build_suggestion_prompt(&truncate_chars(text, SUGGESTION_CONTEXT_CHARS), count);
        let raw = self.model.generate(&prompt).await?;
        let questions = parse_questions(&raw, count);

        debug!("Model suggested {} questions", questions.len());
        Ok(questions)
    }

    fn to_source(&self, hit: SearchHit) -> Source {
        Source {
            page_content: preview(&hit.chunk.content, self.preview_length),
            source: hit.chunk.source,
            page: hit.chunk.page,
            score: hit.score,
        }
    }
}

/// Stuff every retrieved passage into a single grounding prompt
#[inline]
pub fn build_prompt(context: &[&str], question: &str) -> String {
    format!(
        "{}\n\n{}\n\nQuestion: {}\nHelpful Answer:",
        PROMPT_PREAMBLE,
        context.join("\n\n"),
        question
    )
}

/// First `length` characters of `text` followed by `...`
#[inline]
pub fn preview(text: &str, length: usize) -> String {
    format!("{}...", truncate_chars(text, length))
}

/// Extract up to `count` questions from a model response.
///
/// Prefers a JSON array of strings anywhere in the response, falling back to one
/// question per line with list markers stripped.
#[inline]
pub fn parse_questions(raw: &str, count: usize) -> Vec<String> {
    let from_json = raw
        .find('[')
        .zip(raw.rfind(']'))
        .filter(|(open, close)| open < close)
        .and_then(|(open, close)| raw.get(open..=close))
        .and_then(|array| serde_json::from_str::<Vec<String>>(array).ok());

    let questions: Vec<String> = match from_json {
        Some(questions) => questions,
        None => raw.lines().map(strip_list_marker).map(str::to_string).collect(),
    };

    questions
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty() && !q.starts_with("```") && q != "[" && q != "]")
        .take(count)
        .collect()
}

fn build_suggestion_prompt(text: &str, count: usize) -> String {
    format!(
        "You are an AI assistant that suggests relevant questions a user can ask about a given document.\n\n\
         Document Content: {}\n\n\
         Please suggest {} relevant questions that the user can ask to explore the document's content more effectively. \
         Format the questions as a JSON array of strings.",
        text, count
    )
}

fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    let without_number = line
        .find(|c: char| !c.is_ascii_digit())
        .filter(|&i| i > 0)
        .and_then(|i| line.get(i..))
        .and_then(|rest| rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')))
        .unwrap_or(line);

    without_number
        .trim_start_matches(['-', '*', '•'])
        .trim()
        .trim_end_matches(',')
        .trim_matches('"')
}

fn truncate_chars(text: &str, length: usize) -> String {
    text.chars().take(length).collect()
}
