// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Resource Models
//!
//! Payloads of the backend resource endpoints. The backend is document
//! based, so identifiers arrive as `_id` and every model keeps the fields it
//! does not interpret in `extra`.
//!
//! ## Model Categories
//!
//! - **Events**: food-rescue events volunteers sign up for
//! - **Rewards**: point history entries
//! - **NFTs**: reward NFTs owned by the user
//! - **Activities**: the user's activity feed

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// Events
// =============================================================================

/// A food-rescue event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward_points: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Admin request to create an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward_points: Option<u64>,
}

impl NewEvent {
    /// Locally known record shown until the server copy arrives.
    pub fn to_optimistic(&self, id: String) -> Event {
        let mut extra = Map::new();
        extra.insert("pending".to_string(), Value::Bool(true));
        Event {
            id,
            title: self.title.clone(),
            description: self.description.clone(),
            location: self.location.clone(),
            date: self.date.clone(),
            reward_points: self.reward_points,
            extra,
        }
    }
}

// =============================================================================
// Rewards
// =============================================================================

/// One entry of the user's reward history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardEntry {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub points: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// =============================================================================
// NFTs
// =============================================================================

/// A reward NFT held by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nft {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// =============================================================================
// Activities
// =============================================================================

/// An entry of the user's activity feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
