use crate::context::ContextBuilder;
use crate::structured::generate_json;
use serde::{Deserialize, Serialize};
use skillai_core::{Error, Partner, PartnerDraft, ProviderError, Result};
use skillai_providers::{Provider, RetryPolicy};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct DescriptionReply {
    description: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SuggestionReply {
    suggested_prompt: String,
}

/// A project to get startup advice for.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PitchRequest {
    pub app_name: String,
    pub app_description: String,
    pub target_audience: String,
}

impl PitchRequest {
    fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("App name", &self.app_name),
            ("App description", &self.app_description),
            ("Target audience", &self.target_audience),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Validation(format!("{} cannot be empty", field)));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompetitionSuggestion {
    pub category: String,
    pub justification: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PitchPoint {
    pub point: String,
    pub elaboration: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PitchIdeas {
    #[serde(default)]
    pub competition_suggestions: Vec<CompetitionSuggestion>,
    #[serde(default)]
    pub pitch_points: Vec<PitchPoint>,
}

pub fn fallback_prompt(skill: &str) -> String {
    format!("Tell me about your project related to {}.", skill)
}

/// Provider-backed helpers for creating partners.
pub struct PartnerAuthor {
    provider: Arc<dyn Provider>,
    retry: RetryPolicy,
}

impl PartnerAuthor {
    pub fn new(provider: Arc<dyn Provider>, retry: RetryPolicy) -> Self {
        Self { provider, retry }
    }

    /// Short catchy blurb, under 25 words.
    pub async fn describe(&self, name: &str, skill: &str) -> Result<String> {
        let messages = ContextBuilder::description_messages(name, skill);
        let reply: DescriptionReply =
            generate_json(self.provider.as_ref(), &self.retry, &messages).await?;
        let description = reply.description.trim();
        if description.is_empty() {
            return Err(ProviderError::other("provider returned an empty description").into());
        }
        Ok(description.to_string())
    }

    /// A starter prompt for the partner; never fails.
    pub async fn suggest_prompt(&self, skill: &str) -> String {
        let messages = ContextBuilder::suggestion_messages(skill);
        match generate_json::<SuggestionReply>(self.provider.as_ref(), &self.retry, &messages).await {
            Ok(reply) if !reply.suggested_prompt.trim().is_empty() => {
                reply.suggested_prompt.trim().to_string()
            }
            Ok(_) => {
                warn!(skill = %skill, "Empty suggested prompt, using fallback");
                fallback_prompt(skill)
            }
            Err(e) => {
                warn!(skill = %skill, error = %e, "Failed to generate suggested prompt, using fallback");
                fallback_prompt(skill)
            }
        }
    }

    /// Competitions to enter and pitch points for an early-stage project.
    pub async fn pitch_ideas(&self, request: &PitchRequest) -> Result<PitchIdeas> {
        request.validate()?;
        let messages = ContextBuilder::pitch_messages(
            request.app_name.trim(),
            request.app_description.trim(),
            request.target_audience.trim(),
        );
        let ideas: PitchIdeas =
            generate_json(self.provider.as_ref(), &self.retry, &messages).await?;
        if ideas.competition_suggestions.is_empty() && ideas.pitch_points.is_empty() {
            return Err(ProviderError::other("provider returned no strategic advice").into());
        }
        info!(
            app = %request.app_name,
            competitions = ideas.competition_suggestions.len(),
            points = ideas.pitch_points.len(),
            "Generated pitch ideas"
        );
        Ok(ideas)
    }

    /// Validate the draft, generate its description and build the partner.
    pub async fn create_partner(&self, draft: PartnerDraft) -> Result<Partner> {
        draft.validate()?;
        let description = self.describe(draft.name.trim(), draft.skill.trim()).await?;
        let partner = draft.into_partner(description);
        info!(slug = %partner.slug, capability = %partner.primary_capability(), "Partner drafted");
        Ok(partner)
    }
}
