use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::GenerationError;
use crate::metrics::GENERATION_LATENCY;
use crate::models::{GenerateRequest, GenerateResponse};

// Generation can take a while on CPU-only hosts
const REQUEST_TIMEOUT_SECS: u64 = 300;

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str, model: &str) -> Result<String, GenerationError>;
}

pub struct OllamaGenerator {
    client: reqwest::Client,
    base_url: String,
}

impl OllamaGenerator {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        // add http:// if not present
        let base_url = if base_url.starts_with("http") {
            base_url.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", base_url.trim_end_matches('/'))
        };
        Self { client, base_url }
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn generate(&self, prompt: &str, model: &str) -> Result<String, GenerationError> {
        let request = GenerateRequest {
            model: model.to_string(),
            prompt: prompt.to_string(),
            stream: false,
        };
        let start_time = Instant::now();

        let res = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .json(&request)
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(GenerationError::Status(res.status()));
        }
        let body: GenerateResponse = res.json().await?;
        GENERATION_LATENCY.observe(start_time.elapsed().as_secs_f64());
        debug!(model = %body.model, chars = body.response.chars().count(), "Model responded");

        if body.response.trim().is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        Ok(body.response)
    }
}

/// Instruction prompt asking the model for one new post in the voice of `posts`.
pub fn build_prompt(posts: &[String], char_limit: usize, sample_size: usize) -> String {
    let examples = posts
        .iter()
        .take(sample_size)
        .map(|p| format!("- {p}"))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "You write social media posts. Below are recent posts from one Bluesky account. \
Write a single new post in the same voice.\n\n\
Posts from the account:\n{examples}\n\n\
Rules:\n\
- Match the writing style, tone and personality of these posts\n\
- Stay on similar topics and themes\n\
- Keep it concise and at most {char_limit} characters\n\
- Only use hashtags if the examples use them\n\
- Do not wrap the post in quotation marks or say that it was generated\n\n\
Reply with the post text only:"
    )
}

/// Trim the model output and cut it to `char_limit` characters, preferring a
/// sentence end in the last 30% or a word break in the last 20%.
pub fn fit_to_limit(text: &str, char_limit: usize) -> String {
    let text = text.trim().trim_matches('"').trim_matches('\'');
    if text.chars().count() <= char_limit {
        return text.to_string();
    }

    let cut: String = text.chars().take(char_limit).collect();
    let chars: Vec<char> = cut.chars().collect();
    let last_period = chars.iter().rposition(|c| *c == '.');
    let last_space = chars.iter().rposition(|c| *c == ' ');

    let keep = match (last_period, last_space) {
        (Some(p), _) if p * 10 > char_limit * 7 => p + 1,
        (_, Some(s)) if s * 10 > char_limit * 8 => s,
        _ => chars.len(),
    };
    chars[..keep].iter().collect()
}

/// Content substituted for a failed generation; the error-message check rejects it.
pub fn failure_content(err: &GenerationError) -> String {
    format!("Error: generation failed: {err}")
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_includes_sampled_posts_and_limit() {
        let posts: Vec<String> = (0..30).map(|i| format!("post number {i}")).collect();
        let prompt = build_prompt(&posts, 280, 20);
        assert!(prompt.contains("- post number 0"));
        assert!(prompt.contains("- post number 19"));
        assert!(!prompt.contains("- post number 20"));
        assert!(prompt.contains("at most 280 characters"));
    }

    #[test]
    fn short_text_is_only_trimmed() {
        assert_eq!(fit_to_limit("  \"hello there\"  ", 280), "hello there");
    }

    #[test]
    fn long_text_cuts_at_sentence_end() {
        let text = format!("{}. {}", "a".repeat(80), "b ".repeat(20));
        let fitted = fit_to_limit(&text, 100);
        assert_eq!(fitted, format!("{}.", "a".repeat(80)));
    }

    #[test]
    fn long_text_falls_back_to_word_break() {
        let text = "word ".repeat(40);
        let fitted = fit_to_limit(&text, 50);
        assert!(fitted.chars().count() <= 50);
        assert!(fitted.ends_with("word"));
    }

    #[test]
    fn hard_cut_without_breaks() {
        let fitted = fit_to_limit(&"x".repeat(300), 280);
        assert_eq!(fitted.chars().count(), 280);
    }

    #[test]
    fn failure_content_reads_as_error() {
        let content = failure_content(&GenerationError::EmptyResponse);
        assert!(content.to_lowercase().contains("error:"));
    }
}
