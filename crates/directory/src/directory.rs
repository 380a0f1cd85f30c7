use crate::notion::PartnerSource;
use chrono::{DateTime, Utc};
use skillai_core::{Error, Partner, Result};
use skillai_storage::{KvStore, PARTNERS_KEY};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const VERSION_EPSILON: f64 = 1e-9;

/// Where the current partner list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListOrigin {
    Empty,
    Cache,
    Remote,
}

/// The partner list shown to the user.
///
/// Notion is the catalogue of published partners; the local cache keeps the
/// last known list plus anything created on this device.
pub struct PartnerDirectory {
    source: Arc<dyn PartnerSource>,
    store: Arc<dyn KvStore>,
    partners: Vec<Partner>,
    origin: ListOrigin,
    synced_at: Option<DateTime<Utc>>,
}

impl PartnerDirectory {
    pub fn new(source: Arc<dyn PartnerSource>, store: Arc<dyn KvStore>) -> Self {
        Self {
            source,
            store,
            partners: Vec::new(),
            origin: ListOrigin::Empty,
            synced_at: None,
        }
    }

    pub fn list(&self) -> &[Partner] {
        &self.partners
    }

    pub fn get(&self, slug: &str) -> Option<&Partner> {
        self.partners.iter().find(|p| p.slug == slug)
    }

    pub fn origin(&self) -> ListOrigin {
        self.origin
    }

    pub fn synced_at(&self) -> Option<DateTime<Utc>> {
        self.synced_at
    }

    fn read_cache(&self) -> Vec<Partner> {
        let Some(raw) = self.store.get(PARTNERS_KEY) else {
            return Vec::new();
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(error = %e, "Cached partner list is unreadable, ignoring");
            Vec::new()
        })
    }

    fn write_cache(&self) {
        let result = serde_json::to_string(&self.partners)
            .map_err(Error::from)
            .and_then(|json| self.store.set(PARTNERS_KEY, &json));
        if let Err(e) = result {
            warn!(error = %e, "Failed to cache partner list");
        }
    }

    /// Notion order wins, but a local copy with a higher version (an evolution
    /// not yet published) is kept whole, and local-only partners survive.
    fn merge_remote(&self, remote: Vec<Partner>) -> Vec<Partner> {
        let mut local = if self.partners.is_empty() {
            self.read_cache()
        } else {
            self.partners.clone()
        };
        let mut merged = Vec::with_capacity(remote.len() + local.len());
        for incoming in remote {
            match local.iter().position(|p| p.slug == incoming.slug) {
                Some(idx) => {
                    let kept = local.remove(idx);
                    if kept.version > incoming.version + VERSION_EPSILON {
                        debug!(slug = %kept.slug, local = kept.version, remote = incoming.version, "Keeping newer local partner");
                        merged.push(kept);
                    } else {
                        merged.push(incoming);
                    }
                }
                None => merged.push(incoming),
            }
        }
        merged.extend(local);
        merged
    }

    fn replace_from_remote(&mut self, partners: Vec<Partner>) {
        self.partners = self.merge_remote(partners);
        self.origin = ListOrigin::Remote;
        self.synced_at = Some(Utc::now());
        self.write_cache();
    }

    fn fall_back_to_cache(&mut self) {
        self.partners = self.read_cache();
        self.origin = if self.partners.is_empty() {
            ListOrigin::Empty
        } else {
            ListOrigin::Cache
        };
    }

    /// Populate the list: published partners from Notion when there are any,
    /// otherwise the local cache. Never fails.
    pub async fn load(&mut self) -> &[Partner] {
        match self.source.fetch_published().await {
            Ok(partners) if !partners.is_empty() => {
                info!(count = partners.len(), "Loaded partners from Notion");
                self.replace_from_remote(partners);
            }
            Ok(_) => {
                debug!("Notion returned no partners, using local cache");
                self.fall_back_to_cache();
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch partners from Notion, using local cache");
                self.fall_back_to_cache();
            }
        }
        &self.partners
    }

    /// Re-fetch from Notion, surfacing failures. Returns the partner count.
    ///
    /// Merges like `load`: unpublished evolutions and local partners are kept.
    pub async fn sync(&mut self) -> Result<usize> {
        let partners = self.source.fetch_published().await?;
        if partners.is_empty() {
            info!("Notion returned no partners, keeping current list");
            return Ok(self.partners.len());
        }
        self.replace_from_remote(partners);
        Ok(self.partners.len())
    }

    /// Append a new partner and log the request to Notion in the background.
    ///
    /// The returned handle finishes when the log attempt does; it never fails.
    pub fn add(&mut self, partner: Partner) -> Result<JoinHandle<()>> {
        if self.get(&partner.slug).is_some() {
            return Err(Error::Validation(format!(
                "A partner named '{}' already exists",
                partner.name
            )));
        }
        info!(slug = %partner.slug, "Adding partner");
        self.partners.push(partner.clone());
        self.write_cache();

        let source = self.source.clone();
        Ok(tokio::spawn(async move {
            if let Err(e) = source.log_creation(&partner).await {
                warn!(slug = %partner.slug, error = %e, "Failed to log partner creation");
            }
        }))
    }

    pub fn update(&mut self, partner: Partner) -> Result<()> {
        let Some(slot) = self.partners.iter_mut().find(|p| p.slug == partner.slug) else {
            return Err(Error::NotFound(format!("Partner '{}' not found", partner.slug)));
        };
        *slot = partner;
        self.write_cache();
        Ok(())
    }

    pub fn delete(&mut self, slug: &str) -> Result<Partner> {
        let Some(idx) = self.partners.iter().position(|p| p.slug == slug) else {
            return Err(Error::NotFound(format!("Partner '{}' not found", slug)));
        };
        let removed = self.partners.remove(idx);
        info!(slug = %slug, "Deleted partner");
        self.write_cache();
        Ok(removed)
    }

    /// Forward user feedback to Notion. Failures are only logged.
    pub async fn log_feedback(&self, feedback: &str) {
        if let Err(e) = self.source.log_feedback(feedback).await {
            warn!(error = %e, "Failed to log feedback");
        }
    }
}
