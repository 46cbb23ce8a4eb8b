// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Portal resources and event creation.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

use super::{Resource, RevalidationPolicy};
use crate::auth::AuthSnapshot;
use crate::cache::{Fetcher, ResourceCache};
use crate::error::{PortalError, PortalResult};
use crate::models::{Activity, Event, NewEvent, Nft, RewardEntry};

pub type EventsResource<F> = Resource<Vec<Event>, F>;
pub type EventResource<F> = Resource<Option<Event>, F>;
pub type RewardsResource<F> = Resource<Vec<RewardEntry>, F>;
pub type NftsResource<F> = Resource<Vec<Nft>, F>;
pub type ActivitiesResource<F> = Resource<Vec<Activity>, F>;

/// Hands out resource handles that share one cache, fetcher and session.
pub struct ResourceHub<F> {
    cache: Arc<ResourceCache>,
    fetcher: Arc<F>,
    auth: watch::Receiver<AuthSnapshot>,
    events_refresh: Duration,
}

impl<F> Clone for ResourceHub<F> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            fetcher: self.fetcher.clone(),
            auth: self.auth.clone(),
            events_refresh: self.events_refresh,
        }
    }
}

impl<F: Fetcher> ResourceHub<F> {
    pub fn new(
        cache: Arc<ResourceCache>,
        fetcher: Arc<F>,
        auth: watch::Receiver<AuthSnapshot>,
        events_refresh: Duration,
    ) -> Self {
        Self {
            cache,
            fetcher,
            auth,
            events_refresh,
        }
    }

    /// `GET /event`, polled.
    pub fn events(&self) -> EventsResource<F> {
        self.resource("event", RevalidationPolicy::polling(self.events_refresh))
    }

    /// `GET /event/:id`
    pub fn event(&self, id: &str) -> EventResource<F> {
        self.resource(format!("event/{id}"), RevalidationPolicy::on_demand())
    }

    /// `GET /rewards/history`
    pub fn rewards_history(&self) -> RewardsResource<F> {
        self.resource("rewards/history", RevalidationPolicy::on_demand())
    }

    /// `GET /nft/user`
    pub fn user_nfts(&self) -> NftsResource<F> {
        self.resource("nft/user", RevalidationPolicy::on_demand())
    }

    /// `GET /activity`
    pub fn activities(&self) -> ActivitiesResource<F> {
        self.resource("activity", RevalidationPolicy::on_demand())
    }

    /// Create an event with an optimistic append.
    ///
    /// The draft appears in the cached event list immediately, flagged
    /// `pending`. On success the list is re-fetched; on failure the draft is
    /// removed again.
    pub async fn create_event(&self, draft: &NewEvent) -> PortalResult<Event> {
        let events = self.events();
        let token = self
            .auth
            .borrow()
            .credentials()
            .map(|(token, _)| token.to_string())
            .ok_or(PortalError::NotAuthenticated)?;
        let body = serde_json::to_value(draft)
            .map_err(|e| PortalError::MalformedResponse(e.to_string()))?;

        let local_id = format!("pending-{}", Uuid::new_v4());
        let optimistic = draft.to_optimistic(local_id.clone());
        events.update_local(|mut list| {
            list.push(optimistic);
            list
        })?;

        let url = self.fetcher.url_for(events.path());
        match self.fetcher.submit(&url, &token, &body).await {
            Ok(created) => {
                events.mutate().await;
                let created: Event = serde_json::from_value(created)
                    .map_err(|e| PortalError::MalformedResponse(format!("created event: {e}")))?;
                info!(event_id = %created.id, title = %created.title, "Event created");
                Ok(created)
            }
            Err(e) => {
                warn!(title = %draft.title, error = %e, code = e.error_code(), "Event creation failed; rolling back");
                let rollback = events.update_local(|mut list| {
                    list.retain(|event| event.id != local_id);
                    list
                });
                if let Err(rollback) = rollback {
                    warn!(error = %rollback, "Could not remove optimistic event");
                }
                Err(e)
            }
        }
    }

    fn resource<T>(&self, path: impl Into<String>, policy: RevalidationPolicy) -> Resource<T, F>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        Resource::new(
            self.cache.clone(),
            self.fetcher.clone(),
            self.auth.clone(),
            path,
            policy,
        )
    }
}
