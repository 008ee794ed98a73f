// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;

use crate::ids::{LeadReference, SessionId};
use crate::steps::{FieldKind, FormDefinition, fields};
use crate::validation::normalize_phone;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Choice(Option<String>),
    Many(Vec<String>),
    Flag(bool),
}

impl FieldValue {
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Text(value) => value.trim().is_empty(),
            Self::Choice(value) => value.as_deref().is_none_or(|value| value.trim().is_empty()),
            Self::Many(values) => values.is_empty(),
            Self::Flag(value) => !value,
        }
    }

    pub fn as_text(&self) -> &str {
        match self {
            Self::Text(value) => value,
            Self::Choice(value) => value.as_deref().unwrap_or(""),
            Self::Many(_) | Self::Flag(_) => "",
        }
    }

    pub fn as_many(&self) -> &[String] {
        match self {
            Self::Many(values) => values,
            _ => &[],
        }
    }

    pub fn as_flag(&self) -> bool {
        matches!(self, Self::Flag(true))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingInfo {
    pub session_id: SessionId,
    #[serde(with = "time::serde::rfc3339")]
    pub first_page_seen_at: OffsetDateTime,
    pub referrer: Option<String>,
    pub landing_page: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
}

/// In-memory prospect submission, keyed by field name.
///
/// The honeypot value and captured consent text live beside the field map so
/// drafts can serialize the map alone.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FormRecord {
    values: BTreeMap<String, FieldValue>,
    honeypot: String,
    consent_text: Option<String>,
    tracking: Option<TrackingInfo>,
}

impl FormRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    pub fn text(&self, name: &str) -> &str {
        self.values.get(name).map_or("", FieldValue::as_text)
    }

    pub fn is_blank(&self, name: &str) -> bool {
        self.values.get(name).is_none_or(FieldValue::is_blank)
    }

    pub fn set(&mut self, name: &str, value: FieldValue) {
        self.values.insert(name.to_owned(), value);
    }

    pub fn values(&self) -> &BTreeMap<String, FieldValue> {
        &self.values
    }

    /// Replaces every field value; fields unknown to `definition` are dropped.
    pub fn replace_values(
        &mut self,
        definition: &FormDefinition,
        values: BTreeMap<String, FieldValue>,
    ) {
        self.values = values
            .into_iter()
            .filter(|(name, _)| definition.field(name).is_some())
            .collect();
        self.consent_text = definition
            .fields()
            .find(|field| field.kind == FieldKind::Consent && !self.is_blank(field.name))
            .and_then(|field| field.consent_text)
            .map(str::to_owned);
    }

    pub fn set_honeypot(&mut self, value: impl Into<String>) {
        self.honeypot = value.into();
    }

    pub fn is_spam(&self) -> bool {
        !self.honeypot.trim().is_empty()
    }

    pub fn consent_text(&self) -> Option<&str> {
        self.consent_text.as_deref()
    }

    pub fn set_consent_text(&mut self, text: Option<String>) {
        self.consent_text = text;
    }

    pub fn tracking(&self) -> Option<&TrackingInfo> {
        self.tracking.as_ref()
    }

    pub fn set_tracking(&mut self, tracking: Option<TrackingInfo>) {
        self.tracking = tracking;
    }

    /// Drops entered data; session tracking survives.
    pub fn clear(&mut self) {
        self.values.clear();
        self.honeypot.clear();
        self.consent_text = None;
    }

    pub fn prospect(&self) -> Prospect {
        Prospect {
            name: self.text(fields::NAME).trim().to_owned(),
            email: non_blank(self.text(fields::EMAIL)),
            phone: normalize_phone(self.text(fields::PHONE)),
        }
    }

    pub fn move_details(&self) -> MoveDetails {
        MoveDetails {
            from_zip: non_blank(self.text(fields::FROM_ZIP)),
            to_zip: non_blank(self.text(fields::TO_ZIP)),
            move_date: non_blank(self.text(fields::MOVE_DATE)),
            flexible_date: self
                .get(fields::FLEXIBLE_DATE)
                .is_some_and(FieldValue::as_flag),
            home_size: non_blank(self.text(fields::HOME_SIZE)),
            special_items: self
                .get(fields::SPECIAL_ITEMS)
                .map(|value| value.as_many().to_vec())
                .unwrap_or_default(),
            budget: non_blank(self.text(fields::BUDGET)),
            notes: self.text(fields::NOTES).trim().to_owned(),
        }
    }

    pub fn consent(&self) -> Consent {
        Consent {
            agreed: self.get(fields::CONSENT).is_some_and(FieldValue::as_flag),
            text: self.consent_text.clone(),
        }
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prospect {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveDetails {
    pub from_zip: Option<String>,
    pub to_zip: Option<String>,
    pub move_date: Option<String>,
    pub flexible_date: bool,
    pub home_size: Option<String>,
    pub special_items: Vec<String>,
    pub budget: Option<String>,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consent {
    pub agreed: bool,
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClientMetadata {
    pub user_agent: String,
    pub referrer: Option<String>,
}

/// JSON body POSTed to the submission endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadPayload {
    pub form_id: String,
    pub prospect: Prospect,
    #[serde(rename = "move")]
    pub move_details: MoveDetails,
    pub tracking: Option<TrackingInfo>,
    pub consent: Consent,
    #[serde(with = "time::serde::rfc3339")]
    pub submitted_at: OffsetDateTime,
    pub client: ClientMetadata,
}

impl LeadPayload {
    pub fn build(
        definition: &FormDefinition,
        record: &FormRecord,
        client: &ClientMetadata,
        submitted_at: OffsetDateTime,
    ) -> Self {
        Self {
            form_id: definition.id.to_owned(),
            prospect: record.prospect(),
            move_details: record.move_details(),
            tracking: record.tracking().cloned(),
            consent: record.consent(),
            submitted_at,
            client: client.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Accepted { reference: Option<LeadReference> },
    Rejected { reason: String },
    Unavailable { attempts: u32, detail: String },
}

#[cfg(test)]
mod tests {
    use super::{ClientMetadata, FieldValue, FormRecord, LeadPayload};
    use crate::steps::{CONSENT_TEXT, FormDefinition, fields};
    use std::collections::BTreeMap;
    use time::OffsetDateTime;

    #[test]
    fn blank_detection_covers_every_value_shape() {
        assert!(FieldValue::Text("  ".to_owned()).is_blank());
        assert!(FieldValue::Choice(None).is_blank());
        assert!(FieldValue::Many(Vec::new()).is_blank());
        assert!(FieldValue::Flag(false).is_blank());
        assert!(!FieldValue::Choice(Some("studio".to_owned())).is_blank());
        assert!(!FieldValue::Flag(true).is_blank());
    }

    #[test]
    fn replace_values_drops_unknown_fields_and_restores_consent_text() {
        let mut record = FormRecord::new();
        let mut values = BTreeMap::new();
        values.insert(fields::NAME.to_owned(), FieldValue::Text("Jane".to_owned()));
        values.insert("website".to_owned(), FieldValue::Text("spam".to_owned()));
        values.insert(fields::CONSENT.to_owned(), FieldValue::Flag(true));

        record.replace_values(&FormDefinition::QUOTE, values);

        assert_eq!(record.text(fields::NAME), "Jane");
        assert!(record.get("website").is_none());
        assert_eq!(record.consent_text(), Some(CONSENT_TEXT));
    }

    #[test]
    fn clear_keeps_tracking_but_drops_entries() {
        let mut record = FormRecord::new();
        record.set(fields::NAME, FieldValue::Text("Jane".to_owned()));
        record.set_honeypot("bot");
        record.clear();
        assert!(record.values().is_empty());
        assert!(!record.is_spam());
    }

    #[test]
    fn payload_projects_typed_sections() -> anyhow::Result<()> {
        let mut record = FormRecord::new();
        record.set(fields::NAME, FieldValue::Text(" Jane Doe ".to_owned()));
        record.set(fields::PHONE, FieldValue::Text("(512) 555-1234".to_owned()));
        record.set(
            fields::SPECIAL_ITEMS,
            FieldValue::Many(vec!["piano".to_owned()]),
        );
        record.set(fields::CONSENT, FieldValue::Flag(true));
        record.set_consent_text(Some(CONSENT_TEXT.to_owned()));

        let payload = LeadPayload::build(
            &FormDefinition::QUOTE,
            &record,
            &ClientMetadata::default(),
            OffsetDateTime::UNIX_EPOCH,
        );
        assert_eq!(payload.prospect.name, "Jane Doe");
        assert_eq!(payload.prospect.email, None);
        assert_eq!(payload.prospect.phone.as_deref(), Some("5125551234"));
        assert_eq!(payload.move_details.special_items, vec!["piano".to_owned()]);
        assert!(payload.consent.agreed);

        let json = serde_json::to_value(&payload)?;
        assert_eq!(json["move"]["special_items"][0], "piano");
        assert_eq!(json["consent"]["text"], CONSENT_TEXT);
        assert_eq!(json["submitted_at"], "1970-01-01T00:00:00Z");
        Ok(())
    }
}
