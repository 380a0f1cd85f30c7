//! Notion as the published partner catalogue and request inbox.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use skillai_core::config::NotionConfig;
use skillai_core::partner::{slugify, DEFAULT_ICON, INITIAL_VERSION};
use skillai_core::{Capability, Error, Partner, Result, Tier};
use std::time::Duration;
use tracing::{debug, info, warn};

const NOTION_VERSION: &str = "2022-06-28";
const FEEDBACK_TITLE_CHARS: usize = 100;

/// Remote side of the partner directory.
#[async_trait]
pub trait PartnerSource: Send + Sync {
    /// Published partners, in display order. Unconfigured sources return an empty list.
    async fn fetch_published(&self) -> Result<Vec<Partner>>;

    /// Record a user's new partner request.
    async fn log_creation(&self, partner: &Partner) -> Result<()>;

    async fn log_feedback(&self, feedback: &str) -> Result<()>;
}

pub struct NotionClient {
    client: Client,
    config: NotionConfig,
}

impl NotionClient {
    pub fn new(config: NotionConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base.trim_end_matches('/'), path)
    }

    /// Database id when both key and id are usable.
    fn database<'a>(&'a self, id: Option<&'a str>, what: &str) -> Option<&'a str> {
        if !self.config.is_enabled() {
            debug!(what, "Notion API key not configured, skipping");
            return None;
        }
        if id.is_none() {
            debug!(what, "Notion database not configured, skipping");
        }
        id
    }

    async fn post(&self, path: &str, body: &Value, context: &str) -> Result<Value> {
        let resp = self
            .client
            .post(self.url(path))
            .bearer_auth(self.config.api_key.trim())
            .header("Notion-Version", NOTION_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Directory(format!("{}: Notion request failed: {}", context, e)))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| Error::Directory(format!("{}: failed to read response: {}", context, e)))?;

        if !status.is_success() {
            warn!(context, status = status.as_u16(), "Notion returned error status");
            let snippet: String = text.chars().take(300).collect();
            return Err(Error::Directory(format!(
                "{}: Notion returned {}: {}",
                context, status, snippet
            )));
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl PartnerSource for NotionClient {
    async fn fetch_published(&self) -> Result<Vec<Partner>> {
        let Some(db) = self.database(self.config.partners_database(), "partners") else {
            return Ok(Vec::new());
        };
        info!(database = %db, "Fetching partners from Notion");
        let body = published_query();
        let resp = self
            .post(&format!("databases/{}/query", db), &body, "partners query")
            .await?;
        let partners = pages_to_partners(&resp);
        info!(count = partners.len(), "Fetched partners from Notion");
        Ok(partners)
    }

    async fn log_creation(&self, partner: &Partner) -> Result<()> {
        let Some(db) = self.database(self.config.creation_database(), "creation log") else {
            return Ok(());
        };
        self.post("pages", &creation_page(db, partner), "partner creation log")
            .await?;
        info!(slug = %partner.slug, "Logged partner creation to Notion");
        Ok(())
    }

    async fn log_feedback(&self, feedback: &str) -> Result<()> {
        let Some(db) = self.database(self.config.feedback_database(), "feedback") else {
            return Ok(());
        };
        self.post("pages", &feedback_page(db, feedback), "feedback log")
            .await?;
        info!("Logged feedback to Notion");
        Ok(())
    }
}

fn published_query() -> Value {
    json!({
        "filter": {"property": "Status", "select": {"equals": "Published"}},
        "sorts": [{"property": "Order", "direction": "ascending"}],
        "page_size": 100
    })
}

fn rich_text(content: &str) -> Value {
    json!({"rich_text": [{"text": {"content": content}}]})
}

fn title(content: &str) -> Value {
    json!({"title": [{"text": {"content": content}}]})
}

fn creation_page(database_id: &str, partner: &Partner) -> Value {
    json!({
        "parent": {"database_id": database_id},
        "properties": {
            "Name": title(&partner.name),
            "Skill": rich_text(&partner.skill),
            "Description": rich_text(partner.description.as_deref().unwrap_or("")),
            "Capability": rich_text(partner.primary_capability().as_str()),
            "Status": {"select": {"name": "New Request"}}
        }
    })
}

fn feedback_page(database_id: &str, feedback: &str) -> Value {
    let heading: String = feedback.chars().take(FEEDBACK_TITLE_CHARS).collect();
    json!({
        "parent": {"database_id": database_id},
        "properties": {
            "Feedback": title(&heading),
            "Full Feedback": rich_text(feedback),
            "Status": {"select": {"name": "New"}}
        }
    })
}

fn plain_text(prop: Option<&Value>, kind: &str) -> Option<String> {
    prop?
        .get(kind)?
        .as_array()?
        .first()?
        .get("plain_text")?
        .as_str()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn number(prop: Option<&Value>) -> Option<f64> {
    prop?.get("number")?.as_f64()
}

/// Map a database query response. Pages without a name are skipped.
pub fn pages_to_partners(resp: &Value) -> Vec<Partner> {
    let Some(results) = resp.get("results").and_then(|r| r.as_array()) else {
        return Vec::new();
    };
    results
        .iter()
        .filter_map(|page| {
            let partner = page_to_partner(page);
            if partner.is_none() {
                let id = page.get("id").and_then(|v| v.as_str()).unwrap_or("?");
                warn!(page = %id, "Skipping Notion page without a name");
            }
            partner
        })
        .collect()
}

pub fn page_to_partner(page: &Value) -> Option<Partner> {
    let props = page.get("properties")?;
    let name = plain_text(props.get("Name"), "title")?;
    let text = |key: &str| plain_text(props.get(key), "rich_text");

    let tier = props
        .get("Tier")
        .and_then(|p| p.get("select"))
        .and_then(|s| s.get("name"))
        .and_then(|n| n.as_str())
        .and_then(Tier::parse)
        .unwrap_or_default();

    let mut capabilities: Vec<Capability> = props
        .get("Capabilities")
        .and_then(|p| p.get("multi_select"))
        .and_then(|m| m.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|i| i.get("name").and_then(|n| n.as_str()))
                .filter_map(Capability::parse)
                .collect()
        })
        .unwrap_or_default();
    if capabilities.is_empty() {
        capabilities.push(Capability::Text);
    }

    let evolution_disabled = props
        .get("Evolution Disabled")
        .and_then(|p| p.get("checkbox"))
        .and_then(|c| c.as_bool())
        .unwrap_or(false);

    Some(Partner {
        slug: text("Slug").unwrap_or_else(|| slugify(&name)),
        skill: text("Skill").unwrap_or_default(),
        description: text("Description"),
        icon: text("Icon").unwrap_or_else(|| DEFAULT_ICON.to_string()),
        price: number(props.get("Price")).unwrap_or(0.0),
        tier,
        version: number(props.get("Version")).unwrap_or(INITIAL_VERSION),
        capabilities,
        evolution_disabled,
        config: serde_json::Map::new(),
        name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Value {
        json!({
            "id": "page-1",
            "properties": {
                "Name": {"title": [{"plain_text": "Finance Whiz"}]},
                "Skill": {"rich_text": [{"plain_text": "equity research"}]},
                "Description": {"rich_text": [{"plain_text": "Numbers, explained."}]},
                "Icon": {"rich_text": [{"plain_text": "TrendingUp"}]},
                "Price": {"number": 39},
                "Tier": {"select": {"name": "Pro"}},
                "Version": {"number": 2.3},
                "Capabilities": {"multi_select": [{"name": "text"}, {"name": "image"}]}
            }
        })
    }

    #[test]
    fn test_page_to_partner() {
        let p = page_to_partner(&page()).unwrap();
        assert_eq!(p.slug, "finance-whiz");
        assert_eq!(p.name, "Finance Whiz");
        assert_eq!(p.skill, "equity research");
        assert_eq!(p.description.as_deref(), Some("Numbers, explained."));
        assert_eq!(p.icon, "TrendingUp");
        assert_eq!(p.price, 39.0);
        assert_eq!(p.tier, Tier::Pro);
        assert_eq!(p.version, 2.3);
        assert_eq!(p.capabilities, vec![Capability::Text, Capability::Image]);
        assert!(!p.evolution_disabled);
    }

    #[test]
    fn test_page_defaults_and_explicit_slug() {
        let page = json!({
            "properties": {
                "Name": {"title": [{"plain_text": "Language Architect"}]},
                "Slug": {"rich_text": [{"plain_text": "language-architect"}]},
                "Capabilities": {"multi_select": [{"name": "hologram"}]},
                "Evolution Disabled": {"checkbox": true}
            }
        });
        let p = page_to_partner(&page).unwrap();
        assert_eq!(p.slug, "language-architect");
        assert_eq!(p.version, 1.0);
        assert_eq!(p.tier, Tier::Basic);
        assert_eq!(p.icon, DEFAULT_ICON);
        assert_eq!(p.capabilities, vec![Capability::Text]);
        assert!(p.evolution_disabled);
    }

    #[test]
    fn test_nameless_pages_are_skipped() {
        let resp = json!({
            "results": [
                page(),
                {"id": "blank", "properties": {"Name": {"title": []}}}
            ]
        });
        let partners = pages_to_partners(&resp);
        assert_eq!(partners.len(), 1);
        assert_eq!(partners[0].slug, "finance-whiz");
    }

    #[test]
    fn test_feedback_title_is_truncated() {
        let text = "é".repeat(150);
        let body = feedback_page("db", &text);
        let heading = body["properties"]["Feedback"]["title"][0]["text"]["content"]
            .as_str()
            .unwrap();
        assert_eq!(heading.chars().count(), 100);
        assert_eq!(
            body["properties"]["Full Feedback"]["rich_text"][0]["text"]["content"],
            json!(text)
        );
        assert_eq!(body["properties"]["Status"]["select"]["name"], "New");
    }

    #[test]
    fn test_creation_page() {
        let partner = Partner {
            name: "Copy Pro".to_string(),
            skill: "landing pages".to_string(),
            description: Some("Converts.".to_string()),
            ..Partner::default()
        };
        let body = creation_page("db-1", &partner);
        assert_eq!(body["parent"]["database_id"], "db-1");
        assert_eq!(body["properties"]["Capability"]["rich_text"][0]["text"]["content"], "text");
        assert_eq!(body["properties"]["Status"]["select"]["name"], "New Request");
    }

    #[test]
    fn test_published_query() {
        let q = published_query();
        assert_eq!(q["filter"]["select"]["equals"], "Published");
        assert_eq!(q["sorts"][0]["property"], "Order");
    }

    #[tokio::test]
    async fn test_unconfigured_client_makes_no_requests() {
        let config = NotionConfig {
            api_key: "secret".to_string(),
            api_base: "http://127.0.0.1:1".to_string(),
            partners_database_id: Some("GANTI_DENGAN_ID_DATABASE".to_string()),
            creation_database_id: None,
            feedback_database_id: Some(String::new()),
        };
        let client = NotionClient::new(config);
        assert!(client.fetch_published().await.unwrap().is_empty());
        client.log_creation(&Partner::default()).await.unwrap();
        client.log_feedback("great app").await.unwrap();

        let keyless = NotionClient::new(NotionConfig {
            partners_database_id: Some("abc".to_string()),
            ..NotionConfig::default()
        });
        assert!(keyless.fetch_published().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_notion_is_directory_error() {
        let client = NotionClient::new(NotionConfig {
            api_key: "secret".to_string(),
            api_base: "http://127.0.0.1:1".to_string(),
            partners_database_id: Some("abc".to_string()),
            ..NotionConfig::default()
        });
        let err = client.fetch_published().await.unwrap_err();
        assert!(matches!(err, Error::Directory(_)));
    }
}
