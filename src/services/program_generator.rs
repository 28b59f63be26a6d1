use crate::domain::profile::OnboardingProfile;
use crate::domain::program::{validate_program, ProgramData, ProgramValidationError, MAX_WEEKS};
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestUserMessage, ChatCompletionRequestUserMessageContent,
    CreateChatCompletionRequestArgs, Role,
};
use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::time::{sleep, Duration};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
const MAX_RETRIES: u64 = 3;

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("program generation is disabled")]
    Disabled,
    #[error("upstream model error: {0}")]
    Upstream(String),
    #[error("model returned malformed program: {0}")]
    Malformed(String),
    #[error("model returned an invalid program: {0}")]
    Invalid(#[from] ProgramValidationError),
}

#[async_trait]
pub trait ProgramSource: Send + Sync {
    async fn generate(
        &self,
        profile: &OnboardingProfile,
        today: NaiveDate,
    ) -> Result<ProgramData, GenerationError>;
}

const SYSTEM_PROMPT: &str = r#"Tu es un coach de course à pied diplômé.
Tu construis des plans d'entraînement progressifs, sûrs et personnalisés.
Réponds UNIQUEMENT avec un objet JSON, sans texte autour, de la forme :
{"title": string, "weeks": [{"week_number": 1, "focus": string, "sessions": [
  {"day": "Lundi", "type": string, "description": string, "distance_km": number,
   "duration_min": number, "pace_target": "M:SS", "rpe": 1-10, "is_rest": bool}
]}]}
Les semaines sont numérotées à partir de 1, un jour au plus par séance.
Inclus des jours de repos (is_rest: true) et du renforcement musculaire."#;

/// Removes a surrounding markdown code fence if the model added one.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parses and validates a model answer.
pub fn parse_program(raw: &str, fallback_title: &str) -> Result<ProgramData, GenerationError> {
    let mut program: ProgramData = serde_json::from_str(strip_code_fences(raw))
        .map_err(|e| GenerationError::Malformed(e.to_string()))?;
    validate_program(&program)?;
    if program.title.trim().is_empty() {
        program.title = fallback_title.to_string();
    }
    Ok(program)
}

pub fn build_user_prompt(profile: &OnboardingProfile, today: NaiveDate) -> String {
    let weeks = profile.weeks_until_target(today).min(MAX_WEEKS as u32);
    let mut prompt = format!(
        "Niveau : {}\nObjectif : {}\nDate cible : {}\nSéances par semaine : {}\nDurée du plan : {} semaines à partir du {}\n",
        profile.level.as_str(),
        profile.goal.trim(),
        profile.target_date,
        profile.sessions_per_week,
        weeks,
        today,
    );
    if let Some(reference) = profile.reference_time.as_deref() {
        prompt.push_str(&format!("Chrono de référence : {reference}\n"));
    }
    if let Some(notes) = profile.injury_notes.as_deref().filter(|n| !n.trim().is_empty()) {
        prompt.push_str(&format!("Blessures / contraintes : {}\n", notes.trim()));
    }
    if let Some(race) = &profile.race {
        prompt.push_str(&format!(
            "Course objectif : {} ({:.1} km) le {}\n",
            race.name, race.distance_km, race.date
        ));
    }
    prompt
}

#[derive(Clone)]
pub struct OpenAiProgramSource {
    client: Option<Client<OpenAIConfig>>,
    model: String,
}

impl OpenAiProgramSource {
    pub fn new(api_key: Option<String>, model: Option<String>) -> Self {
        let client = api_key
            .filter(|k| !k.trim().is_empty())
            .map(|key| Client::with_config(OpenAIConfig::new().with_api_key(key)));
        Self {
            client,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }

    pub fn from_env() -> Self {
        Self::new(
            std::env::var("OPENAI_API_KEY").ok(),
            std::env::var("OPENAI_MODEL").ok(),
        )
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }
}

#[async_trait]
impl ProgramSource for OpenAiProgramSource {
    async fn generate(
        &self,
        profile: &OnboardingProfile,
        today: NaiveDate,
    ) -> Result<ProgramData, GenerationError> {
        let Some(client) = &self.client else {
            return Err(GenerationError::Disabled);
        };
        let user_prompt = build_user_prompt(profile, today);
        let mut retries = 0;

        loop {
            let messages = vec![
                ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                    role: Role::System,
                    content: SYSTEM_PROMPT.to_string(),
                    name: None,
                }),
                ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                    role: Role::User,
                    content: ChatCompletionRequestUserMessageContent::Text(user_prompt.clone()),
                    name: None,
                }),
            ];

            let request = CreateChatCompletionRequestArgs::default()
                .model(self.model.as_str())
                .messages(messages)
                .build()
                .map_err(|e| GenerationError::Upstream(e.to_string()))?;

            match client.chat().create(request).await {
                Ok(resp) => {
                    let content = resp
                        .choices
                        .first()
                        .and_then(|c| c.message.content.clone())
                        .unwrap_or_default();
                    let program = parse_program(&content, profile.goal.trim());
                    if let Err(e) = &program {
                        tracing::warn!("Rejected generated program: {}", e);
                    }
                    return program;
                }
                Err(err) => {
                    retries += 1;
                    if retries > MAX_RETRIES {
                        tracing::error!("OpenAI error after {} retries: {}", MAX_RETRIES, err);
                        return Err(GenerationError::Upstream(err.to_string()));
                    }
                    sleep(Duration::from_millis(500 * retries)).await;
                }
            }
        }
    }
}
