// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::draft::{Draft, draft_key};
use crate::model::{ClientMetadata, SubmissionOutcome, TrackingInfo};
use crate::ports::{AnalyticsSink, Clock, DraftStorage, LeadTransport};
use crate::state::{FormCommand, FormEffect, FormState};
use crate::steps::FormDefinition;
use crate::tracking::TRACKING_KEY;

/// Page-level inputs available when the form mounts.
#[derive(Debug, Clone, Default)]
pub struct MountContext {
    pub client: ClientMetadata,
    pub referrer: Option<String>,
    pub landing_url: Option<String>,
}

/// Drives a [`FormState`] against its collaborators.
///
/// Storage and analytics effects are performed here and never reach the
/// caller; everything a renderer must act on is returned from
/// [`FormSession::dispatch`]. A `Send` effect is returned too, so the caller
/// decides where the network round-trip runs.
pub struct FormSession<S, A, C> {
    state: FormState,
    storage: S,
    analytics: A,
    clock: C,
    draft_key: String,
}

impl<S, A, C> FormSession<S, A, C>
where
    S: DraftStorage,
    A: AnalyticsSink,
    C: Clock,
{
    pub fn mount(
        definition: FormDefinition,
        context: MountContext,
        storage: S,
        analytics: A,
        clock: C,
    ) -> (Self, Vec<FormEffect>) {
        let now = clock.now();
        let draft_key = draft_key(&definition);

        let stored_tracking = load_json::<TrackingInfo, _>(&storage, TRACKING_KEY);
        let stored_session = stored_tracking
            .as_ref()
            .map(|tracking| tracking.session_id.clone());
        let tracking = TrackingInfo::capture(
            stored_tracking,
            now,
            context.referrer.as_deref(),
            context.landing_url.as_deref(),
        );
        let is_new_session = stored_session.as_ref() != Some(&tracking.session_id);
        if is_new_session {
            match serde_json::to_string(&tracking) {
                Ok(raw) => {
                    if let Err(error) = storage.save(TRACKING_KEY, &raw) {
                        tracing::warn!(error = %format!("{error:#}"), "tracking info not persisted");
                    }
                }
                Err(error) => tracing::warn!(%error, "tracking info not encodable"),
            }
        }

        let draft = load_draft(&storage, &draft_key);
        let mut client = context.client;
        if client.referrer.is_none() {
            client.referrer = tracking.referrer.clone();
        }
        let (mut state, effects) = FormState::mount(definition, client, draft, now);
        state.set_tracking(Some(tracking));

        let mut session = Self {
            state,
            storage,
            analytics,
            clock,
            draft_key,
        };
        let effects = session.perform(effects);
        (session, effects)
    }

    pub fn state(&self) -> &FormState {
        &self.state
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn dispatch(&mut self, command: FormCommand) -> Vec<FormEffect> {
        let now = self.clock.now();
        let effects = self.state.dispatch(command, now);
        self.perform(effects)
    }

    pub fn resolve(&mut self, outcome: SubmissionOutcome) -> Vec<FormEffect> {
        self.dispatch(FormCommand::SubmissionResolved(outcome))
    }

    /// Submits and waits for `transport` inline. The returned effects cover
    /// both halves of the round-trip and never include `Send`.
    pub fn submit_with<T: LeadTransport>(&mut self, transport: &T) -> Vec<FormEffect> {
        let mut effects = Vec::new();
        let mut payload = None;
        for effect in self.dispatch(FormCommand::Submit) {
            match effect {
                FormEffect::Send(body) => payload = Some(body),
                other => effects.push(other),
            }
        }
        if let Some(payload) = payload {
            let outcome = transport.submit(&payload);
            effects.extend(self.resolve(outcome));
        }
        effects
    }

    fn perform(&mut self, effects: Vec<FormEffect>) -> Vec<FormEffect> {
        let mut remaining = Vec::with_capacity(effects.len());
        for effect in effects {
            match effect {
                FormEffect::SaveDraft(draft) => self.save_draft(&draft),
                FormEffect::ClearDraft => {
                    if let Err(error) = self.storage.remove(&self.draft_key) {
                        tracing::warn!(
                            error = %format!("{error:#}"),
                            key = %self.draft_key,
                            "draft not cleared"
                        );
                    }
                }
                FormEffect::Track(event) => {
                    if let Err(error) = self.analytics.track(&event) {
                        tracing::debug!(
                            error = %format!("{error:#}"),
                            event = event.name.as_str(),
                            "analytics event dropped"
                        );
                    }
                }
                other => remaining.push(other),
            }
        }
        remaining
    }

    fn save_draft(&self, draft: &Draft) {
        let result = draft
            .to_json()
            .and_then(|raw| self.storage.save(&self.draft_key, &raw));
        match result {
            Ok(()) => tracing::debug!(key = %self.draft_key, step = draft.step, "draft saved"),
            Err(error) => tracing::warn!(
                error = %format!("{error:#}"),
                key = %self.draft_key,
                "draft not saved; progress kept in memory"
            ),
        }
    }
}

fn load_draft<S: DraftStorage>(storage: &S, key: &str) -> Option<Draft> {
    let raw = match storage.load(key) {
        Ok(raw) => raw?,
        Err(error) => {
            tracing::warn!(error = %format!("{error:#}"), key, "draft storage unavailable");
            return None;
        }
    };
    match Draft::from_json(&raw) {
        Ok(draft) => Some(draft),
        Err(error) => {
            tracing::warn!(error = %format!("{error:#}"), key, "discarding unreadable draft");
            if let Err(error) = storage.remove(key) {
                tracing::warn!(error = %format!("{error:#}"), key, "unreadable draft not removed");
            }
            None
        }
    }
}

fn load_json<T, S>(storage: &S, key: &str) -> Option<T>
where
    T: serde::de::DeserializeOwned,
    S: DraftStorage,
{
    let raw = match storage.load(key) {
        Ok(raw) => raw?,
        Err(error) => {
            tracing::warn!(error = %format!("{error:#}"), key, "storage unavailable");
            return None;
        }
    };
    serde_json::from_str(&raw)
        .inspect_err(|error| tracing::warn!(%error, key, "ignoring unreadable stored value"))
        .ok()
}
