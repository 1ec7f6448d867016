//! Content monetization policies and access decisions
//!
//! A policy row marks a piece of content as FREE, SUBSCRIPTION, or
//! PREMIUM. Content without a row is FREE.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Kinds of gated content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// A course module
    Module,
    /// A whole course program (gates its bundle purchases)
    Program,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Module => "module",
            ContentType::Program => "program",
        }
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "module" => Ok(ContentType::Module),
            "program" => Ok(ContentType::Program),
            other => Err(format!("unknown content type: {}", other)),
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a piece of content is monetized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MonetizationType {
    Free,
    Subscription,
    Premium,
}

impl MonetizationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonetizationType::Free => "FREE",
            MonetizationType::Subscription => "SUBSCRIPTION",
            MonetizationType::Premium => "PREMIUM",
        }
    }
}

impl FromStr for MonetizationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FREE" => Ok(MonetizationType::Free),
            "SUBSCRIPTION" => Ok(MonetizationType::Subscription),
            "PREMIUM" => Ok(MonetizationType::Premium),
            other => Err(format!("unknown monetization type: {}", other)),
        }
    }
}

impl std::fmt::Display for MonetizationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored monetization policy for one piece of content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentPolicy {
    pub content_type: ContentType,
    pub content_id: String,
    pub monetization_type: MonetizationType,
    /// Required for PREMIUM
    pub price_minor: Option<i64>,
    pub currency: String,
    /// When set, SUBSCRIPTION access requires this tier
    pub subscription_tier: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Result of an access check for one user and one piece of content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessDecision {
    pub allowed: bool,
    pub monetization_type: MonetizationType,
    /// Set when access is denied
    pub reason: Option<String>,
}

impl AccessDecision {
    pub fn allowed(monetization_type: MonetizationType) -> Self {
        AccessDecision {
            allowed: true,
            monetization_type,
            reason: None,
        }
    }

    pub fn denied(monetization_type: MonetizationType, reason: &str) -> Self {
        AccessDecision {
            allowed: false,
            monetization_type,
            reason: Some(reason.to_string()),
        }
    }
}

/// What a client must present to unlock a piece of content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessRequirements {
    pub monetization_type: MonetizationType,
    pub price_minor: Option<i64>,
    pub currency: Option<String>,
    pub subscription_tier: Option<String>,
}

impl AccessRequirements {
    /// Content without a policy row is free
    pub fn free() -> Self {
        AccessRequirements {
            monetization_type: MonetizationType::Free,
            price_minor: None,
            currency: None,
            subscription_tier: None,
        }
    }
}
