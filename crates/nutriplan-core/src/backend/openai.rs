//! OpenAI-compatible chat client used for both meal generation and
//! nutrition extraction.
//!
//! Both uses request JSON-object replies. Generation replies are checked
//! against the meal shape and re-requested, with the parse error fed back,
//! until one fits or the request budget runs out.

use std::time::Duration;

use anyhow::{Context, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::generation::{MealGenerator, MealRequest};
use crate::lookup::{LookupError, NutritionExtractor, NutritionFacts};
use crate::models::{Ingredient, Meal};

use super::{ConfigError, ServiceSettings};

const CONNECT_TIMEOUT_SECS: u64 = 30;
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Requests per generation call before giving up on a malformed reply.
pub const MAX_SHAPE_REQUESTS: u32 = 3;

const GENERATION_SYSTEM_PROMPT: &str = "You are a sports nutritionist who writes precise, \
     realistic recipes in Spanish. Always answer with a single JSON object.";

const EXTRACTION_SYSTEM_PROMPT: &str = "You read food composition records and extract \
     nutrition facts. Always answer with a single JSON object.";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

impl ChatMessage {
    fn system(content: &str) -> Self {
        Self {
            role: "system",
            content: content.to_string(),
        }
    }

    fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }

    fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant",
            content: content.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Meal shape expected from the generator.
#[derive(Debug, Deserialize)]
struct GeneratedMeal {
    title: String,
    #[serde(default)]
    description: String,
    total_calories: f64,
    ingredients: Vec<GeneratedIngredient>,
    #[serde(default)]
    preparation: Vec<String>,
    #[serde(default)]
    alternative: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeneratedIngredient {
    name: String,
    quantity: String,
    weight_grams: f64,
}

#[derive(Debug, Deserialize)]
struct ExtractedFacts {
    food_name: String,
    calories_100g: f64,
    #[serde(default)]
    notes: String,
}

/// Parse a generator reply into a meal for `request`'s slot.
fn parse_meal(content: &str, request: &MealRequest) -> anyhow::Result<Meal> {
    let generated: GeneratedMeal =
        serde_json::from_str(content).context("reply is not a valid meal object")?;
    if generated.title.trim().is_empty() {
        bail!("meal title is empty");
    }
    if generated.ingredients.is_empty() {
        bail!("meal has no ingredients");
    }
    if let Some(bad) = generated
        .ingredients
        .iter()
        .find(|i| !(i.weight_grams.is_finite() && i.weight_grams > 0.0))
    {
        bail!("ingredient {:?} has no positive weight_grams", bad.name);
    }
    Ok(Meal {
        meal_time: request.spec.meal_time,
        title: generated.title,
        description: generated.description,
        total_calories: generated.total_calories,
        ingredients: generated
            .ingredients
            .into_iter()
            .map(|i| Ingredient {
                name: i.name,
                quantity: i.quantity,
                weight_grams: i.weight_grams,
                kcal: 0.0,
            })
            .collect(),
        preparation: generated.preparation,
        alternative: generated.alternative.filter(|a| !a.trim().is_empty()),
    })
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Chat-completions client for an OpenAI-compatible endpoint.
pub struct OpenAiCompatibleClient {
    client: Client,
    base_url: String,
    api_key: String,
    generation_model: String,
    extraction_model: String,
}

impl std::fmt::Debug for OpenAiCompatibleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatibleClient")
            .field("base_url", &self.base_url)
            .field("generation_model", &self.generation_model)
            .field("extraction_model", &self.extraction_model)
            .finish_non_exhaustive()
    }
}

impl OpenAiCompatibleClient {
    pub fn new(settings: &ServiceSettings) -> Result<Self, ConfigError> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ConfigError::MissingVars(vec![super::LLM_API_KEY_ENV.to_string()]))?;
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ConfigError::Init {
                client: "llm",
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key,
            generation_model: settings.generation_model.clone(),
            extraction_model: settings.extraction_model.clone(),
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    /// Send one chat request and return the reply text.
    async fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<String, LookupError> {
        let body = ChatRequest {
            model,
            messages,
            temperature: 0.2,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let response = self
            .client
            .post(self.api_url("chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        let text = response.text().await.map_err(classify)?;
        if !status.is_success() {
            let excerpt: String = text.chars().take(500).collect();
            return Err(LookupError::Backend(format!("{status}: {excerpt}")));
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| LookupError::Backend(format!("malformed chat response: {e}")))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LookupError::Backend("chat response had no content".to_string()))
    }
}

fn classify(e: reqwest::Error) -> LookupError {
    if e.is_timeout() {
        LookupError::Timeout(e.to_string())
    } else if e.is_connect() {
        LookupError::Connection(e.to_string())
    } else {
        LookupError::Backend(e.to_string())
    }
}

#[async_trait]
impl MealGenerator for OpenAiCompatibleClient {
    async fn generate(&self, request: &MealRequest) -> anyhow::Result<Meal> {
        let mut messages = vec![
            ChatMessage::system(GENERATION_SYSTEM_PROMPT),
            ChatMessage::user(request.prompt.clone()),
        ];
        let mut last_error = None;

        for shape_attempt in 1..=MAX_SHAPE_REQUESTS {
            let content = self.chat(&self.generation_model, &messages).await?;
            match parse_meal(&content, request) {
                Ok(meal) => return Ok(meal),
                Err(e) => {
                    tracing::warn!(
                        meal_time = %request.spec.meal_time,
                        shape_attempt,
                        error = %e,
                        "generator reply did not match the meal shape"
                    );
                    messages.push(ChatMessage::assistant(content));
                    messages.push(ChatMessage::user(format!(
                        "That reply could not be used ({e:#}). Answer again with only the \
                         JSON object described above."
                    )));
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow::anyhow!("no reply from generator"))
            .context(format!(
                "generator produced no valid meal in {MAX_SHAPE_REQUESTS} requests"
            )))
    }
}

#[async_trait]
impl NutritionExtractor for OpenAiCompatibleClient {
    async fn extract(
        &self,
        ingredient: &str,
        document: &str,
    ) -> Result<NutritionFacts, LookupError> {
        let prompt = format!(
            "Ingredient requested: {ingredient}\n\nFood composition record:\n{document}\n\n\
             Respond with a JSON object with fields food_name (the food the record \
             describes), calories_100g (kcal per 100 g, a number) and notes (anything the \
             cook should know about the match, or an empty string)."
        );
        let messages = [
            ChatMessage::system(EXTRACTION_SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ];
        let content = self.chat(&self.extraction_model, &messages).await?;
        let facts: ExtractedFacts = serde_json::from_str(&content)
            .map_err(|e| LookupError::Backend(format!("malformed extraction reply: {e}")))?;
        Ok(NutritionFacts {
            food_name: facts.food_name,
            calories_100g: facts.calories_100g,
            notes: facts.notes,
        })
    }
}
