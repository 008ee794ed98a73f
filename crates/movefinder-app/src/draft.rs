// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::{Duration, OffsetDateTime};

use crate::model::{FieldValue, FormRecord};
use crate::steps::FormDefinition;

pub const DRAFT_RETENTION: Duration = Duration::hours(24);
pub const AUTOSAVE_DELAY: Duration = Duration::seconds(5);

pub fn draft_key(definition: &FormDefinition) -> String {
    format!("movefinder.{}_draft", definition.id)
}

/// Auto-save snapshot: `{ data, timestamp, step }`.
///
/// Only the field map is captured; the honeypot never reaches storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub data: BTreeMap<String, FieldValue>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub step: usize,
}

impl Draft {
    pub fn capture(record: &FormRecord, step: usize, now: OffsetDateTime) -> Self {
        Self {
            data: record.values().clone(),
            timestamp: now,
            step,
        }
    }

    pub fn is_fresh(&self, now: OffsetDateTime) -> bool {
        now - self.timestamp < DRAFT_RETENTION
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("encode draft")
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("decode draft")
    }
}

#[cfg(test)]
mod tests {
    use super::{DRAFT_RETENTION, Draft, draft_key};
    use crate::model::{FieldValue, FormRecord};
    use crate::steps::{FormDefinition, fields};
    use anyhow::Result;
    use time::{Duration, OffsetDateTime};

    fn sample_record() -> FormRecord {
        let mut record = FormRecord::new();
        record.set(fields::NAME, FieldValue::Text("Jane Doe".to_owned()));
        record.set(
            fields::SPECIAL_ITEMS,
            FieldValue::Many(vec!["piano".to_owned(), "safe".to_owned()]),
        );
        record.set(
            fields::HOME_SIZE,
            FieldValue::Choice(Some("two_bedroom".to_owned())),
        );
        record.set(fields::MOVE_DATE, FieldValue::Text("2026-06-01".to_owned()));
        record.set(fields::FLEXIBLE_DATE, FieldValue::Flag(true));
        record.set_honeypot("http://spam.example");
        record
    }

    #[test]
    fn serialized_draft_omits_honeypot() -> Result<()> {
        let draft = Draft::capture(&sample_record(), 1, OffsetDateTime::UNIX_EPOCH);
        let json = draft.to_json()?;
        assert!(!json.contains("spam.example"));
        assert!(json.contains("\"step\":1"));
        assert!(json.contains("\"timestamp\":\"1970-01-01T00:00:00Z\""));
        Ok(())
    }

    #[test]
    fn json_restores_every_field_shape() -> Result<()> {
        let record = sample_record();
        let draft = Draft::capture(&record, 2, OffsetDateTime::UNIX_EPOCH);
        let restored = Draft::from_json(&draft.to_json()?)?;
        assert_eq!(restored, draft);
        assert_eq!(&restored.data, record.values());
        Ok(())
    }

    #[test]
    fn freshness_ends_at_retention_window() {
        let saved = OffsetDateTime::UNIX_EPOCH;
        let draft = Draft::capture(&FormRecord::new(), 0, saved);
        assert!(draft.is_fresh(saved + Duration::hours(23)));
        assert!(!draft.is_fresh(saved + DRAFT_RETENTION));
    }

    #[test]
    fn draft_key_is_scoped_by_form() {
        assert_eq!(draft_key(&FormDefinition::QUOTE), "movefinder.quote_draft");
        assert_eq!(draft_key(&FormDefinition::LEAD), "movefinder.lead_draft");
    }
}
