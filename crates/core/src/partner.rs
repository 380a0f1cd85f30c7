//! Partner records and the rules for creating them.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static NON_SLUG_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9-]").unwrap());

pub const NAME_LEN: std::ops::RangeInclusive<usize> = 3..=30;
pub const SKILL_LEN: std::ops::RangeInclusive<usize> = 10..=100;
pub const INITIAL_VERSION: f64 = 1.0;
pub const DEFAULT_ICON: &str = "Bot";

const ICONS: &[&str] = &[
    "Activity", "Atom", "Award", "BadgeCheck", "Beaker", "Book", "BrainCircuit", "Briefcase",
    "Brush", "Calculator", "Calendar", "Camera", "CircuitBoard", "Cloud", "Compass", "Crown",
    "Database", "Diamond", "Feather", "Film", "FlaskConical", "Gem", "GraduationCap", "Heart",
    "Key", "Landmark", "Languages", "Layers", "Library", "Lightbulb", "Map", "Medal",
    "Megaphone", "MessageSquare", "Mic", "Music", "Newspaper", "Palette", "PieChart", "Puzzle",
    "Rocket", "Scale", "Shield", "Sparkles", "Star", "Target", "Terminal", "TrendingUp",
    "Trophy", "Users", "Wallet", "Wrench", "Zap", "Code", "Bug", "BarChart3",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Text,
    Image,
    Audio,
    Video,
}

impl Capability {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "text" => Some(Capability::Text),
            "image" => Some(Capability::Image),
            "audio" => Some(Capability::Audio),
            "video" => Some(Capability::Video),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Text => "text",
            Capability::Image => "image",
            Capability::Audio => "audio",
            Capability::Video => "video",
        }
    }

    /// Monthly price and tier a new partner gets for this primary capability.
    pub fn pricing(&self) -> (f64, Tier) {
        match self {
            Capability::Text => (19.0, Tier::Basic),
            Capability::Image | Capability::Audio => (39.0, Tier::Pro),
            Capability::Video => (59.0, Tier::Pro),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Tier {
    #[default]
    Basic,
    Pro,
    Enterprise,
}

impl Tier {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "Basic" => Some(Tier::Basic),
            "Pro" => Some(Tier::Pro),
            "Enterprise" => Some(Tier::Enterprise),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Partner {
    pub slug: String,
    pub name: String,
    pub skill: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_icon")]
    pub icon: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub tier: Tier,
    #[serde(default = "default_version")]
    pub version: f64,
    #[serde(default = "default_capabilities")]
    pub capabilities: Vec<Capability>,
    /// Fixed at creation; a disabled partner never gains XP or evolves.
    #[serde(default)]
    pub evolution_disabled: bool,
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,
}

fn default_icon() -> String {
    DEFAULT_ICON.to_string()
}

fn default_version() -> f64 {
    INITIAL_VERSION
}

fn default_capabilities() -> Vec<Capability> {
    vec![Capability::Text]
}

impl Partner {
    pub fn primary_capability(&self) -> Capability {
        self.capabilities.first().copied().unwrap_or(Capability::Text)
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Replace skill and version in one step.
    pub fn apply_evolution(&mut self, new_skill: String) {
        let next = next_version(self.version);
        *self = Partner {
            skill: new_skill,
            version: next,
            ..std::mem::take(self)
        };
    }
}

impl Default for Partner {
    fn default() -> Self {
        Self {
            slug: String::new(),
            name: String::new(),
            skill: String::new(),
            description: None,
            icon: default_icon(),
            price: 0.0,
            tier: Tier::Basic,
            version: INITIAL_VERSION,
            capabilities: default_capabilities(),
            evolution_disabled: false,
            config: serde_json::Map::new(),
        }
    }
}

/// `round(version + 0.1, 1)`.
pub fn next_version(version: f64) -> f64 {
    ((version + 0.1) * 10.0).round() / 10.0
}

/// Lowercase, whitespace runs to `-`, drop anything outside `[a-z0-9-]`.
pub fn slugify(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    let dashed = WHITESPACE_RUN.replace_all(&lower, "-");
    NON_SLUG_CHARS.replace_all(&dashed, "").into_owned()
}

pub fn random_icon() -> &'static str {
    let idx = (uuid::Uuid::new_v4().as_u128() % ICONS.len() as u128) as usize;
    ICONS[idx]
}

/// User input for a new partner, before the description is generated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerDraft {
    pub name: String,
    pub skill: String,
    pub capability: Capability,
    #[serde(default)]
    pub evolution_disabled: bool,
}

impl PartnerDraft {
    pub fn validate(&self) -> Result<()> {
        let name_len = self.name.trim().chars().count();
        if !NAME_LEN.contains(&name_len) {
            return Err(Error::Validation(format!(
                "Partner name must be between {} and {} characters",
                NAME_LEN.start(),
                NAME_LEN.end()
            )));
        }
        let skill_len = self.skill.trim().chars().count();
        if !SKILL_LEN.contains(&skill_len) {
            return Err(Error::Validation(format!(
                "Skill description must be between {} and {} characters",
                SKILL_LEN.start(),
                SKILL_LEN.end()
            )));
        }
        if slugify(&self.name).is_empty() {
            return Err(Error::Validation(
                "Partner name must contain at least one letter or digit".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the partner record. Call `validate` first.
    pub fn into_partner(self, description: String) -> Partner {
        let (price, tier) = self.capability.pricing();
        let name = self.name.trim().to_string();
        Partner {
            slug: slugify(&name),
            name,
            skill: self.skill.trim().to_string(),
            description: Some(description),
            icon: random_icon().to_string(),
            price,
            tier,
            version: INITIAL_VERSION,
            capabilities: vec![self.capability],
            evolution_disabled: self.evolution_disabled,
            config: serde_json::Map::new(),
        }
    }
}
