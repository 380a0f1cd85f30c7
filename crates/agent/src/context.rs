use crate::market::StockQuote;
use skillai_core::types::ChatMessage;
use skillai_core::{Partner, Result};

/// Seniority a partner speaks with, derived from its version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExperienceTier {
    JuniorAnalyst,
    Analyst,
    SeniorAdvisor,
}

impl ExperienceTier {
    pub fn from_version(version: f64) -> Self {
        if version < 2.0 {
            ExperienceTier::JuniorAnalyst
        } else if version < 3.0 {
            ExperienceTier::Analyst
        } else {
            ExperienceTier::SeniorAdvisor
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ExperienceTier::JuniorAnalyst => "Junior Analyst",
            ExperienceTier::Analyst => "Analyst",
            ExperienceTier::SeniorAdvisor => "Senior Advisor",
        }
    }

    fn guidance(&self) -> &'static str {
        match self {
            ExperienceTier::JuniorAnalyst => {
                "Focus on executing the request accurately. Keep your suggested next steps direct and simple."
            }
            ExperienceTier::Analyst => {
                "After answering the core request, add a layer of analysis. Your suggested next steps should be analytical."
            }
            ExperienceTier::SeniorAdvisor => {
                "Give the answer, the analysis and the strategic implications, connecting them to broader trends. \
                 Anticipate needs the user has not mentioned yet."
            }
        }
    }
}

/// Builds the prompts sent to the provider for each partner flow.
pub struct ContextBuilder;

impl ContextBuilder {
    /// System prompt for a chat turn with `partner`.
    pub fn chat_system_prompt(partner: &Partner) -> String {
        let tier = ExperienceTier::from_version(partner.version);
        let mut prompt = String::new();

        prompt.push_str(&format!(
            "You are {}, a world-class AI assistant acting as a real work partner. Your expertise is in {}.\n",
            partner.name, partner.skill
        ));
        prompt.push_str(&format!(
            "Your partner version, {:.1}, reflects your experience level. You are working as a {}.\n\n",
            partner.version,
            tier.label()
        ));

        prompt.push_str("## Core Directives\n");
        prompt.push_str("1. If the request is ambiguous, form a hypothesis about the user's intent and ask a guiding question to confirm it.\n");
        prompt.push_str("2. Do not invent facts. Say so when you are unsure.\n");
        prompt.push_str("3. After fulfilling a request, predict the user's next need and end with a relevant follow-up suggestion or question.\n");
        prompt.push_str(&format!("4. {}\n", tier.guidance()));

        prompt
    }

    /// Full message list for a chat turn: system prompt followed by the history.
    pub fn chat_messages(partner: &Partner, history: &[ChatMessage]) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage::system(&Self::chat_system_prompt(partner)));
        messages.extend(history.iter().cloned());
        messages
    }

    /// Appended to a finance partner's system prompt after a quote lookup.
    pub fn market_data_section(ticker: &str, quote: &Result<StockQuote>) -> String {
        let mut section = String::from("\n## Market Data\n");
        match quote {
            Ok(q) => {
                section.push_str(&format!(
                    "A getStockPrice lookup just returned the latest price of {}: {:.2}.\n",
                    q.symbol, q.price
                ));
                section.push_str(
                    "Tell the user you looked the price up, present it clearly, then suggest a next step suited to your experience level.\n",
                );
            }
            Err(e) => {
                section.push_str(&format!(
                    "A getStockPrice lookup for {} failed: {}\n",
                    ticker, e
                ));
                section.push_str("Tell the user the live price is unavailable right now. Do not guess a price.\n");
            }
        }
        section
    }

    pub fn pitch_messages(app_name: &str, app_description: &str, target_audience: &str) -> Vec<ChatMessage> {
        let system = "You are a world-class startup advisor. Give concrete, actionable strategic advice for early-stage software projects.\n\
             Based on the app name, description and target audience you will:\n\
             1. Suggest 3-4 distinct competition or hackathon categories the project could enter, each with a short justification.\n\
             2. Write 3-4 strong pitch points that highlight the project's strengths and potential, each with a short elaboration.\n\
             Focus on creativity, market potential and innovation. Keep the advice encouraging and practical, \
             and answer in the language of the app description.\n\
             Reply with a JSON object: {\"competitionSuggestions\": [{\"category\": string, \"justification\": string}], \
             \"pitchPoints\": [{\"point\": string, \"elaboration\": string}]}.";
        let user = format!(
            "App Name: {}\nDescription: {}\nTarget Audience: {}\n\n\
             Generate competition suggestions and key pitch points for this project.",
            app_name, app_description, target_audience
        );
        vec![ChatMessage::system(system), ChatMessage::user(&user)]
    }

    pub fn evolution_messages(partner_name: &str, current_skill: &str, current_version: f64) -> Vec<ChatMessage> {
        let system = "You are a system that evolves AI assistants. Your task is to upgrade an AI partner's skill to the next level.\n\
             Based on the partner's name, current skill and version, write a new, more advanced skill description that reflects learning and growth.\n\
             Reply with a JSON object: {\"newSkillDescription\": string, \"newVersion\": number}.";
        let user = format!(
            "AI Partner Name: {}\nCurrent Skill: {}\nCurrent Version: {:.1}\n\nGenerate an evolved skill description for version {:.1} + 0.1.",
            partner_name, current_skill, current_version, current_version
        );
        vec![ChatMessage::system(system), ChatMessage::user(&user)]
    }

    pub fn description_messages(name: &str, skill: &str) -> Vec<ChatMessage> {
        let user = format!(
            "Generate a very short, catchy description for an AI assistant. The description must be under 25 words.\n\n\
             Partner Name: {}\nPartner's Main Skill: {}\n\n\
             Reply with a JSON object: {{\"description\": string}}.",
            name, skill
        );
        vec![ChatMessage::user(&user)]
    }

    pub fn suggestion_messages(skill: &str) -> Vec<ChatMessage> {
        let user = format!(
            "You are an AI prompt generator. Write one suggested prompt a user could send to an AI partner with the skill below. \
             Keep it simple so the user gets value from the partner quickly.\n\n\
             Skill: {}\n\n\
             Reply with a JSON object: {{\"suggestedPrompt\": string}}.",
            skill
        );
        vec![ChatMessage::user(&user)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(ExperienceTier::from_version(1.0), ExperienceTier::JuniorAnalyst);
        assert_eq!(ExperienceTier::from_version(1.9), ExperienceTier::JuniorAnalyst);
        assert_eq!(ExperienceTier::from_version(2.0), ExperienceTier::Analyst);
        assert_eq!(ExperienceTier::from_version(2.9), ExperienceTier::Analyst);
        assert_eq!(ExperienceTier::from_version(3.0), ExperienceTier::SeniorAdvisor);
        assert_eq!(ExperienceTier::from_version(4.2), ExperienceTier::SeniorAdvisor);
    }

    #[test]
    fn test_chat_prompt_mentions_skill_version_and_tier() {
        let partner = Partner {
            slug: "finance-whiz".to_string(),
            name: "Finance Whiz".to_string(),
            skill: "equity research".to_string(),
            version: 2.3,
            ..Partner::default()
        };
        let prompt = ContextBuilder::chat_system_prompt(&partner);
        assert!(prompt.contains("equity research"));
        assert!(prompt.contains("2.3"));
        assert!(prompt.contains("Analyst"));
        assert!(!prompt.contains("Senior Advisor"));
    }

    #[test]
    fn test_chat_messages_prepend_system() {
        let partner = Partner::default();
        let history = vec![ChatMessage::user("hi")];
        let messages = ContextBuilder::chat_messages(&partner, &history);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1], history[0]);
    }

    #[test]
    fn test_evolution_prompt_carries_inputs() {
        let messages = ContextBuilder::evolution_messages("Writer", "copywriting", 1.4);
        let user = &messages[1].content;
        assert!(user.contains("Writer"));
        assert!(user.contains("copywriting"));
        assert!(user.contains("1.4"));
    }

    #[test]
    fn test_market_data_section() {
        let found = ContextBuilder::market_data_section(
            "IBM",
            &Ok(StockQuote {
                symbol: "IBM".to_string(),
                price: 187.4,
            }),
        );
        assert!(found.contains("IBM: 187.40"));

        let failed = ContextBuilder::market_data_section(
            "IBM",
            &Err(skillai_core::Error::Tool("limit reached".to_string())),
        );
        assert!(failed.contains("limit reached"));
        assert!(failed.contains("Do not guess"));
    }

    #[test]
    fn test_pitch_prompt_carries_inputs() {
        let messages = ContextBuilder::pitch_messages("SkillAI", "AI partners that evolve", "freelancers");
        assert_eq!(messages[0].role, "system");
        assert!(messages[0].content.contains("competitionSuggestions"));
        assert!(messages[1].content.contains("SkillAI"));
        assert!(messages[1].content.contains("freelancers"));
    }
}
