// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use std::sync::Arc;
use time::{OffsetDateTime, UtcOffset};

use crate::model::{LeadPayload, SubmissionOutcome};

pub trait Clock {
    fn now(&self) -> OffsetDateTime;

    fn today(&self) -> time::Date {
        self.now().date()
    }
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now(&self) -> OffsetDateTime {
        (**self).now()
    }
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now(&self) -> OffsetDateTime {
        (**self).now()
    }
}

/// Wall clock expressed in a fixed offset; that offset decides "today".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemClock {
    offset: UtcOffset,
}

impl SystemClock {
    pub const fn fixed(offset: UtcOffset) -> Self {
        Self { offset }
    }

    pub fn local() -> Self {
        let offset = UtcOffset::current_local_offset().unwrap_or_else(|error| {
            tracing::debug!(%error, "local offset unavailable; evaluating dates in UTC");
            UtcOffset::UTC
        });
        Self { offset }
    }

    pub const fn offset(&self) -> UtcOffset {
        self.offset
    }
}

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc().to_offset(self.offset)
    }
}

/// Browser-style key-value storage. Values are whole documents; a save
/// replaces any previous value for the key.
pub trait DraftStorage {
    fn load(&self, key: &str) -> Result<Option<String>>;
    fn save(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

impl<T: DraftStorage + ?Sized> DraftStorage for &T {
    fn load(&self, key: &str) -> Result<Option<String>> {
        (**self).load(key)
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        (**self).save(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

impl<T: DraftStorage + ?Sized> DraftStorage for Arc<T> {
    fn load(&self, key: &str) -> Result<Option<String>> {
        (**self).load(key)
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        (**self).save(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

pub trait LeadTransport {
    fn submit(&self, payload: &LeadPayload) -> SubmissionOutcome;
}

impl<T: LeadTransport + ?Sized> LeadTransport for &T {
    fn submit(&self, payload: &LeadPayload) -> SubmissionOutcome {
        (**self).submit(payload)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventName {
    StepStarted,
    StepCompleted,
    FormSubmitted,
}

impl EventName {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StepStarted => "step_started",
            Self::StepCompleted => "step_completed",
            Self::FormSubmitted => "form_submitted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsEvent {
    pub name: EventName,
    pub form_id: &'static str,
    /// 1-based, as shown to the user.
    pub step_number: Option<usize>,
    pub step_name: Option<&'static str>,
}

/// Fire-and-forget telemetry; errors are logged by the caller and dropped.
pub trait AnalyticsSink {
    fn track(&self, event: &AnalyticsEvent) -> Result<()>;
}

impl<T: AnalyticsSink + ?Sized> AnalyticsSink for &T {
    fn track(&self, event: &AnalyticsEvent) -> Result<()> {
        (**self).track(event)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAnalytics;

impl AnalyticsSink for NoopAnalytics {
    fn track(&self, _event: &AnalyticsEvent) -> Result<()> {
        Ok(())
    }
}

/// Emits analytics as structured log lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAnalytics;

impl AnalyticsSink for LogAnalytics {
    fn track(&self, event: &AnalyticsEvent) -> Result<()> {
        tracing::info!(
            target: "movefinder::analytics",
            event = event.name.as_str(),
            form_id = event.form_id,
            step_number = event.step_number,
            step_name = event.step_name,
            "analytics event"
        );
        Ok(())
    }
}
