//! Evolution of an eligible partner into its next version.
//!
//! An evolution asks the provider for a more advanced skill description,
//! then commits the new skill and version together, clears the partner's
//! XP and raises the one-shot handoff flag for the partner listing.

use crate::context::ContextBuilder;
use crate::experience::ExperienceTracker;
use crate::structured::generate_json;
use serde::{Deserialize, Serialize};
use skillai_core::partner::next_version;
use skillai_core::{Error, Partner, ProviderError, Result};
use skillai_providers::{Provider, RetryPolicy};
use skillai_storage::{SessionFlags, EVOLVED_SLUG_KEY};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvolveRequest {
    pub partner_name: String,
    pub current_skill: String,
    pub current_version: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvolveReply {
    pub new_skill_description: String,
    /// Reported by the model, never trusted.
    #[serde(default)]
    pub new_version: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvolutionOutcome {
    pub slug: String,
    pub previous_version: f64,
    pub new_version: f64,
    pub new_skill: String,
}

pub struct EvolutionEngine {
    provider: Arc<dyn Provider>,
    tracker: Arc<ExperienceTracker>,
    flags: Arc<SessionFlags>,
    retry: RetryPolicy,
    in_flight: Mutex<HashSet<String>>,
}

/// Marks a slug busy for the lifetime of one evolution.
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<String>>,
    slug: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.slug);
    }
}

impl EvolutionEngine {
    pub fn new(
        provider: Arc<dyn Provider>,
        tracker: Arc<ExperienceTracker>,
        flags: Arc<SessionFlags>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            provider,
            tracker,
            flags,
            retry,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn tracker(&self) -> &Arc<ExperienceTracker> {
        &self.tracker
    }

    fn begin(&self, slug: &str) -> Option<InFlightGuard<'_>> {
        let mut set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !set.insert(slug.to_string()) {
            return None;
        }
        Some(InFlightGuard {
            set: &self.in_flight,
            slug: slug.to_string(),
        })
    }

    /// Evolve `partner` in place.
    ///
    /// Fails with [`Error::Precondition`] without contacting the provider when
    /// the partner is evolution-disabled, already evolving, or short of XP.
    /// On any failure the partner and its XP are left as they were.
    pub async fn evolve(&self, partner: &mut Partner) -> Result<EvolutionOutcome> {
        let slug = partner.slug.clone();

        if partner.evolution_disabled {
            return Err(Error::Precondition(format!(
                "Partner '{}' cannot evolve",
                partner.name
            )));
        }
        let Some(_guard) = self.begin(&slug) else {
            return Err(Error::Precondition(format!(
                "Partner '{}' is already evolving",
                partner.name
            )));
        };
        let xp = self.tracker.xp(&slug);
        if xp < self.tracker.xp_to_evolve() {
            return Err(Error::Precondition(format!(
                "Partner '{}' needs {} XP to evolve, has {}",
                partner.name,
                self.tracker.xp_to_evolve(),
                xp
            )));
        }

        let request = EvolveRequest {
            partner_name: partner.name.clone(),
            current_skill: partner.skill.clone(),
            current_version: partner.version,
        };
        info!(slug = %slug, version = request.current_version, "Evolving partner");

        let messages = ContextBuilder::evolution_messages(
            &request.partner_name,
            &request.current_skill,
            request.current_version,
        );
        let reply: EvolveReply = generate_json(self.provider.as_ref(), &self.retry, &messages)
            .await
            .map_err(|e| {
                warn!(slug = %slug, error = %e, "Evolution failed");
                e
            })?;

        let new_skill = reply.new_skill_description.trim().to_string();
        if new_skill.is_empty() {
            warn!(slug = %slug, "Evolution returned an empty skill description");
            return Err(ProviderError::other("evolution returned an empty skill description").into());
        }
        let expected = next_version(request.current_version);
        if let Some(reported) = reply.new_version {
            if (reported - expected).abs() > f64::EPSILON {
                warn!(slug = %slug, reported, expected, "Ignoring provider-reported version");
            }
        }

        let previous_version = partner.version;
        partner.apply_evolution(new_skill.clone());
        self.tracker.reset(&slug);
        self.flags.set(EVOLVED_SLUG_KEY, &slug);

        info!(
            slug = %slug,
            from = previous_version,
            to = partner.version,
            "Partner evolved"
        );

        Ok(EvolutionOutcome {
            slug,
            previous_version,
            new_version: partner.version,
            new_skill,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedProvider;
    use skillai_core::types::{LLMResponse, ResponseFormat};
    use skillai_core::ProviderErrorKind;
    use skillai_storage::{xp_key, KvStore, MemoryKvStore};

    const EVOLVED: &str =
        r#"{"newSkillDescription":"Long-form storytelling with brand voice","newVersion":7.5}"#;

    fn partner() -> Partner {
        Partner {
            slug: "writer".to_string(),
            name: "Writer".to_string(),
            skill: "copywriting".to_string(),
            version: 1.0,
            ..Partner::default()
        }
    }

    struct Fixture {
        provider: Arc<ScriptedProvider>,
        store: Arc<MemoryKvStore>,
        flags: Arc<SessionFlags>,
        engine: EvolutionEngine,
    }

    fn fixture(provider: ScriptedProvider, xp: u32) -> Fixture {
        let provider = Arc::new(provider);
        let store = Arc::new(MemoryKvStore::new());
        store.set(&xp_key("writer"), &xp.to_string()).unwrap();
        let tracker = Arc::new(ExperienceTracker::with_rules(store.clone(), 20, 100));
        let flags = Arc::new(SessionFlags::new());
        let engine = EvolutionEngine::new(
            provider.clone(),
            tracker,
            flags.clone(),
            RetryPolicy::default(),
        );
        Fixture {
            provider,
            store,
            flags,
            engine,
        }
    }

    #[tokio::test]
    async fn test_evolve_commits_skill_version_xp_and_flag() {
        let f = fixture(ScriptedProvider::replying(&[EVOLVED]), 100);
        let mut p = partner();

        let outcome = f.engine.evolve(&mut p).await.unwrap();

        assert_eq!(p.skill, "Long-form storytelling with brand voice");
        assert_eq!(p.version, 1.1);
        assert_eq!(outcome.previous_version, 1.0);
        assert_eq!(outcome.new_version, 1.1);
        assert_eq!(f.engine.tracker().xp("writer"), 0);
        assert_eq!(f.store.get(&xp_key("writer")), None);
        assert_eq!(f.flags.take(EVOLVED_SLUG_KEY).as_deref(), Some("writer"));

        let (messages, format) = f.provider.last_call().unwrap();
        assert_eq!(format, ResponseFormat::Json);
        assert!(messages.iter().any(|m| m.content.contains("copywriting")));
    }

    #[tokio::test]
    async fn test_version_is_recomputed_locally() {
        let f = fixture(ScriptedProvider::replying(&[EVOLVED]), 100);
        let mut p = partner();
        p.version = 1.9;
        f.engine.evolve(&mut p).await.unwrap();
        assert_eq!(p.version, 2.0);
    }

    #[tokio::test]
    async fn test_not_eligible_makes_no_call() {
        let f = fixture(ScriptedProvider::replying(&[EVOLVED]), 80);
        let mut p = partner();
        let before = p.clone();

        let err = f.engine.evolve(&mut p).await.unwrap_err();

        assert!(matches!(err, Error::Precondition(_)));
        assert_eq!(f.provider.call_count(), 0);
        assert_eq!(p, before);
        assert_eq!(f.engine.tracker().xp("writer"), 80);
        assert_eq!(f.flags.peek(EVOLVED_SLUG_KEY), None);
    }

    #[tokio::test]
    async fn test_disabled_partner_never_evolves() {
        let f = fixture(ScriptedProvider::replying(&[EVOLVED]), 100);
        let mut p = partner();
        p.evolution_disabled = true;
        let before = p.clone();

        let err = f.engine.evolve(&mut p).await.unwrap_err();

        assert!(matches!(err, Error::Precondition(_)));
        assert_eq!(f.provider.call_count(), 0);
        assert_eq!(p, before);
    }

    #[tokio::test]
    async fn test_rate_limit_leaves_state_untouched() {
        let f = fixture(
            ScriptedProvider::new(vec![Err(ProviderError::rate_limited("429 quota"))]),
            100,
        );
        let mut p = partner();
        let before = p.clone();

        let err = f.engine.evolve(&mut p).await.unwrap_err();

        assert_eq!(err.provider_kind(), Some(ProviderErrorKind::RateLimited));
        assert_eq!(f.provider.call_count(), 1);
        assert_eq!(p, before);
        assert_eq!(f.engine.tracker().xp("writer"), 100);
        assert_eq!(f.flags.peek(EVOLVED_SLUG_KEY), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_is_retried_then_exhausted() {
        let f = fixture(
            ScriptedProvider::new(vec![
                Err(ProviderError::unavailable("503")),
                Err(ProviderError::unavailable("503")),
                Err(ProviderError::unavailable("503")),
            ]),
            100,
        );
        let mut p = partner();

        let err = f.engine.evolve(&mut p).await.unwrap_err();

        assert!(matches!(err, Error::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(f.provider.call_count(), 3);
        assert_eq!(p.version, 1.0);
        assert_eq!(f.engine.tracker().xp("writer"), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_then_success() {
        let f = fixture(
            ScriptedProvider::new(vec![
                Err(ProviderError::unavailable("503")),
                Ok(LLMResponse::text(EVOLVED)),
            ]),
            100,
        );
        let mut p = partner();
        f.engine.evolve(&mut p).await.unwrap();
        assert_eq!(f.provider.call_count(), 2);
        assert_eq!(p.version, 1.1);
    }

    #[tokio::test]
    async fn test_malformed_reply_is_not_retried() {
        let f = fixture(ScriptedProvider::replying(&["sorry, I can't"]), 100);
        let mut p = partner();

        let err = f.engine.evolve(&mut p).await.unwrap_err();

        assert_eq!(err.provider_kind(), Some(ProviderErrorKind::Other));
        assert_eq!(f.provider.call_count(), 1);
        assert_eq!(p.version, 1.0);
    }

    #[tokio::test]
    async fn test_empty_skill_is_rejected() {
        let f = fixture(
            ScriptedProvider::replying(&[r#"{"newSkillDescription":"  "}"#]),
            100,
        );
        let mut p = partner();
        let err = f.engine.evolve(&mut p).await.unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
        assert_eq!(p.skill, "copywriting");
        assert_eq!(f.engine.tracker().xp("writer"), 100);
    }

    #[tokio::test]
    async fn test_concurrent_evolution_is_rejected() {
        let f = fixture(ScriptedProvider::replying(&[EVOLVED]), 100);
        let _busy = f.engine.begin("writer").unwrap();
        let mut p = partner();

        let err = f.engine.evolve(&mut p).await.unwrap_err();

        assert!(matches!(err, Error::Precondition(ref m) if m.contains("already evolving")));
        assert_eq!(f.provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_busy_marker_released_after_failure() {
        let f = fixture(
            ScriptedProvider::new(vec![
                Err(ProviderError::other("boom")),
                Ok(LLMResponse::text(EVOLVED)),
            ]),
            100,
        );
        let mut p = partner();
        assert!(f.engine.evolve(&mut p).await.is_err());
        f.engine.evolve(&mut p).await.unwrap();
        assert_eq!(p.version, 1.1);
    }

    #[tokio::test]
    async fn test_second_evolution_needs_fresh_xp() {
        let f = fixture(ScriptedProvider::replying(&[EVOLVED, EVOLVED]), 100);
        let mut p = partner();
        f.engine.evolve(&mut p).await.unwrap();
        let err = f.engine.evolve(&mut p).await.unwrap_err();
        assert!(matches!(err, Error::Precondition(_)));
        assert_eq!(f.provider.call_count(), 1);
    }
}
