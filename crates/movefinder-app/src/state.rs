// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeMap;
use time::OffsetDateTime;

use crate::draft::{AUTOSAVE_DELAY, Draft};
use crate::estimate::MoveEstimate;
use crate::ids::LeadReference;
use crate::model::{ClientMetadata, FieldValue, FormRecord, LeadPayload, SubmissionOutcome};
use crate::ports::{AnalyticsEvent, EventName};
use crate::steps::{FieldKind, FormDefinition};
use crate::validation::{FieldError, ValidationError, mask_phone, toggle_option, validate_through};

pub const FALLBACK_CONTACT_HINT: &str =
    "Please try again in a moment, or call us at (512) 555-0142 for a quote by phone.";
pub const REJECTION_HINT: &str =
    "Review your details and submit again, or call us at (512) 555-0142.";
const GENERIC_FAILURE: &str = "We couldn't send your request right now.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionFailure {
    /// Honeypot populated. Reported to the user exactly like `Unavailable`.
    Suspected,
    Rejected { reason: String },
    Unavailable,
}

impl SubmissionFailure {
    pub fn message(&self) -> String {
        match self {
            Self::Rejected { reason } => reason.clone(),
            Self::Suspected | Self::Unavailable => GENERIC_FAILURE.to_owned(),
        }
    }

    pub const fn hint(&self) -> &'static str {
        match self {
            Self::Rejected { .. } => REJECTION_HINT,
            Self::Suspected | Self::Unavailable => FALLBACK_CONTACT_HINT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Editing {
        step: usize,
    },
    Submitting {
        step: usize,
    },
    Succeeded {
        reference: Option<LeadReference>,
        estimate: Option<MoveEstimate>,
    },
    Failed {
        step: usize,
        failure: SubmissionFailure,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormCommand {
    SetField { name: String, value: FieldValue },
    ToggleOption { name: String, option: String },
    SetHoneypot(String),
    Blur { name: String },
    Next,
    Back,
    Submit,
    SubmissionResolved(SubmissionOutcome),
    RestoreDraft,
    DiscardDraft,
    Reset,
    Tick,
    Unload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEffect {
    Render,
    Focus(&'static str),
    Announce(String),
    FieldInvalid {
        field: &'static str,
        error: ValidationError,
    },
    SaveDraft(Draft),
    ClearDraft,
    OfferDraft {
        saved_at: OffsetDateTime,
        step: usize,
    },
    Send(LeadPayload),
    Track(AnalyticsEvent),
    ShowConfirmation {
        reference: Option<LeadReference>,
    },
    ShowFailure {
        message: String,
        hint: &'static str,
    },
}

/// Pure controller core: `(state, command) -> (state', effects)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormState {
    definition: FormDefinition,
    phase: Phase,
    record: FormRecord,
    errors: BTreeMap<&'static str, ValidationError>,
    focus: Option<&'static str>,
    pending_draft: Option<Draft>,
    client: ClientMetadata,
    dirty_since: Option<OffsetDateTime>,
}

impl FormState {
    pub fn new(definition: FormDefinition, client: ClientMetadata) -> Self {
        Self {
            definition,
            phase: Phase::Editing { step: 0 },
            record: FormRecord::new(),
            errors: BTreeMap::new(),
            focus: definition.first_field(0),
            pending_draft: None,
            client,
            dirty_since: None,
        }
    }

    /// Starts at step 1. A fresh stored draft is offered, never applied
    /// silently; an expired one is dropped.
    pub fn mount(
        definition: FormDefinition,
        client: ClientMetadata,
        draft: Option<Draft>,
        now: OffsetDateTime,
    ) -> (Self, Vec<FormEffect>) {
        let mut state = Self::new(definition, client);
        let mut effects = vec![FormEffect::Render];
        match draft {
            Some(draft) if draft.is_fresh(now) => {
                effects.push(FormEffect::OfferDraft {
                    saved_at: draft.timestamp,
                    step: draft.step.min(definition.last_step()),
                });
                state.pending_draft = Some(draft);
            }
            Some(_) => effects.push(FormEffect::ClearDraft),
            None => {}
        }
        effects.push(state.track(EventName::StepStarted, Some(0)));
        if let Some(focus) = state.focus {
            effects.push(FormEffect::Focus(focus));
        }
        (state, effects)
    }

    pub fn definition(&self) -> &FormDefinition {
        &self.definition
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn record(&self) -> &FormRecord {
        &self.record
    }

    pub fn set_tracking(&mut self, tracking: Option<crate::model::TrackingInfo>) {
        self.record.set_tracking(tracking);
    }

    pub fn error_for(&self, field: &str) -> Option<ValidationError> {
        self.errors.get(field).copied()
    }

    pub fn errors(&self) -> &BTreeMap<&'static str, ValidationError> {
        &self.errors
    }

    pub fn focus(&self) -> Option<&'static str> {
        self.focus
    }

    pub fn has_pending_draft(&self) -> bool {
        self.pending_draft.is_some()
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self.phase, Phase::Submitting { .. })
    }

    pub fn current_step(&self) -> usize {
        match &self.phase {
            Phase::Editing { step } | Phase::Submitting { step } | Phase::Failed { step, .. } => {
                *step
            }
            Phase::Succeeded { .. } => self.definition.last_step(),
        }
    }

    pub fn dispatch(&mut self, command: FormCommand, now: OffsetDateTime) -> Vec<FormEffect> {
        match command {
            FormCommand::SetField { name, value } => self.set_field(&name, value, now),
            FormCommand::ToggleOption { name, option } => self.toggle(&name, &option, now),
            FormCommand::SetHoneypot(value) => {
                self.record.set_honeypot(value);
                Vec::new()
            }
            FormCommand::Blur { name } => self.blur(&name, now),
            FormCommand::Next => self.next(now),
            FormCommand::Back => self.back(),
            FormCommand::Submit => self.submit(now),
            FormCommand::SubmissionResolved(outcome) => self.resolve(outcome),
            FormCommand::RestoreDraft => self.restore_draft(),
            FormCommand::DiscardDraft => self.discard_draft(),
            FormCommand::Reset => self.reset(),
            FormCommand::Tick => self.autosave(now, false),
            FormCommand::Unload => self.autosave(now, true),
        }
    }

    fn accepts_edits(&self) -> bool {
        !matches!(self.phase, Phase::Succeeded { .. })
    }

    fn set_field(&mut self, name: &str, value: FieldValue, now: OffsetDateTime) -> Vec<FormEffect> {
        if !self.accepts_edits() {
            return Vec::new();
        }
        let Some(spec) = self.definition.field(name) else {
            return Vec::new();
        };

        let value = match (spec.kind, value) {
            (FieldKind::Phone, FieldValue::Text(raw)) => FieldValue::Text(mask_phone(&raw)),
            (_, value) => value,
        };
        if spec.kind == FieldKind::Consent {
            let text = value
                .as_flag()
                .then_some(spec.consent_text)
                .flatten()
                .map(str::to_owned);
            self.record.set_consent_text(text);
        }

        self.record.set(spec.name, value);
        self.mark_dirty(now);
        self.focus = Some(spec.name);

        if self.errors.contains_key(spec.name) {
            self.revalidate(spec.name, now);
        }
        vec![FormEffect::Render]
    }

    fn toggle(&mut self, name: &str, option: &str, now: OffsetDateTime) -> Vec<FormEffect> {
        let Some(spec) = self.definition.field(name) else {
            return Vec::new();
        };
        if spec.kind != FieldKind::Checkboxes {
            return Vec::new();
        }
        let selected = self
            .record
            .get(spec.name)
            .map(|value| value.as_many().to_vec())
            .unwrap_or_default();
        let next = toggle_option(spec, &selected, option);
        self.set_field(spec.name, FieldValue::Many(next), now)
    }

    fn blur(&mut self, name: &str, now: OffsetDateTime) -> Vec<FormEffect> {
        if !self.accepts_edits() || self.definition.field(name).is_none() {
            return Vec::new();
        }
        self.revalidate(name, now);
        let mut effects = vec![FormEffect::Render];
        if let Some((&field, &error)) = self.errors.get_key_value(name) {
            effects.push(FormEffect::FieldInvalid { field, error });
        }
        effects
    }

    /// Re-checks one field; contact fields are re-checked as a pair.
    fn revalidate(&mut self, name: &str, now: OffsetDateTime) {
        let Some(step) = self.definition.step_of(name) else {
            return;
        };
        let errors = crate::validation::validate_step(
            &self.definition,
            step,
            &self.record,
            now.date(),
        );
        let is_contact = self
            .definition
            .field(name)
            .is_some_and(|spec| spec.is_contact());
        let targets: Vec<&'static str> = if is_contact {
            self.definition.contact_fields()
        } else {
            self.definition
                .field(name)
                .map(|spec| vec![spec.name])
                .unwrap_or_default()
        };

        for target in targets {
            match errors.iter().find(|error| error.field == target) {
                Some(error) => {
                    self.errors.insert(target, error.error);
                }
                None => {
                    self.errors.remove(target);
                }
            }
        }
    }

    fn apply_errors(&mut self, steps: std::ops::RangeInclusive<usize>, errors: &[FieldError]) {
        for step in steps {
            if let Some(spec) = self.definition.step(step) {
                for field in spec.fields {
                    self.errors.remove(field.name);
                }
            }
        }
        for error in errors {
            self.errors.insert(error.field, error.error);
        }
    }

    /// Focuses the first invalid field and announces the failure.
    fn reject(&mut self, errors: &[FieldError]) -> Vec<FormEffect> {
        let Some(first) = errors.first() else {
            return Vec::new();
        };
        self.focus = Some(first.field);
        let label = self
            .definition
            .field(first.field)
            .map_or(first.field, |spec| spec.label);
        let count = errors.len();
        let noun = if count == 1 { "field needs" } else { "fields need" };
        let mut effects = vec![FormEffect::Render];
        effects.extend(errors.iter().map(|error| FormEffect::FieldInvalid {
            field: error.field,
            error: error.error,
        }));
        effects.push(FormEffect::Focus(first.field));
        effects.push(FormEffect::Announce(format!(
            "{count} {noun} attention. {label}: {}",
            first.message()
        )));
        effects
    }

    fn next(&mut self, now: OffsetDateTime) -> Vec<FormEffect> {
        let Phase::Editing { step } = self.phase else {
            return Vec::new();
        };
        if step >= self.definition.last_step() {
            return Vec::new();
        }

        let errors = crate::validation::validate_step(
            &self.definition,
            step,
            &self.record,
            now.date(),
        );
        self.apply_errors(step..=step, &errors);
        if !errors.is_empty() {
            return self.reject(&errors);
        }

        let next = step + 1;
        self.phase = Phase::Editing { step: next };
        self.focus = self.definition.first_field(next);

        let mut effects = vec![
            self.track(EventName::StepCompleted, Some(step)),
            FormEffect::Render,
            self.track(EventName::StepStarted, Some(next)),
        ];
        if let Some(focus) = self.focus {
            effects.push(FormEffect::Focus(focus));
        }
        effects
    }

    fn back(&mut self) -> Vec<FormEffect> {
        let step = match self.phase {
            Phase::Editing { step } | Phase::Failed { step, .. } => step,
            Phase::Submitting { .. } | Phase::Succeeded { .. } => return Vec::new(),
        };
        if step == 0 {
            return Vec::new();
        }

        let previous = step - 1;
        self.phase = Phase::Editing { step: previous };
        self.focus = self.definition.first_field(previous);
        let mut effects = vec![FormEffect::Render];
        if let Some(focus) = self.focus {
            effects.push(FormEffect::Focus(focus));
        }
        effects
    }

    fn submit(&mut self, now: OffsetDateTime) -> Vec<FormEffect> {
        let last = self.definition.last_step();
        match self.phase {
            Phase::Editing { step } if step == last => {}
            Phase::Failed { .. } => {}
            _ => return Vec::new(),
        }

        let errors = validate_through(&self.definition, last, &self.record, now.date());
        self.apply_errors(0..=last, &errors);
        if let Some(first) = errors.first() {
            let step = self.definition.step_of(first.field).unwrap_or(last);
            self.phase = Phase::Editing { step };
            return self.reject(&errors);
        }

        if self.record.is_spam() {
            let failure = SubmissionFailure::Suspected;
            let effects = vec![
                FormEffect::Render,
                FormEffect::ShowFailure {
                    message: failure.message(),
                    hint: failure.hint(),
                },
            ];
            self.phase = Phase::Failed {
                step: last,
                failure,
            };
            return effects;
        }

        let payload = LeadPayload::build(&self.definition, &self.record, &self.client, now);
        self.phase = Phase::Submitting { step: last };
        vec![
            FormEffect::Render,
            FormEffect::Announce("Sending your request".to_owned()),
            FormEffect::Send(payload),
        ]
    }

    fn resolve(&mut self, outcome: SubmissionOutcome) -> Vec<FormEffect> {
        let Phase::Submitting { step } = self.phase else {
            return Vec::new();
        };

        match outcome {
            SubmissionOutcome::Accepted { reference } => {
                let estimate = MoveEstimate::from_details(&self.record.move_details());
                self.phase = Phase::Succeeded {
                    reference: reference.clone(),
                    estimate,
                };
                self.record.clear();
                self.errors.clear();
                self.focus = None;
                self.dirty_since = None;
                let announcement = match &reference {
                    Some(reference) => {
                        format!("Thanks! Your request was received. Reference {reference}.")
                    }
                    None => "Thanks! Your request was received.".to_owned(),
                };
                vec![
                    FormEffect::ClearDraft,
                    self.track(EventName::FormSubmitted, None),
                    FormEffect::Render,
                    FormEffect::ShowConfirmation { reference },
                    FormEffect::Announce(announcement),
                ]
            }
            SubmissionOutcome::Rejected { reason } => {
                self.fail(step, SubmissionFailure::Rejected { reason })
            }
            SubmissionOutcome::Unavailable { .. } => {
                self.fail(step, SubmissionFailure::Unavailable)
            }
        }
    }

    fn fail(&mut self, step: usize, failure: SubmissionFailure) -> Vec<FormEffect> {
        let message = failure.message();
        let hint = failure.hint();
        self.phase = Phase::Failed { step, failure };
        vec![
            FormEffect::Render,
            FormEffect::ShowFailure {
                message: message.clone(),
                hint,
            },
            FormEffect::Announce(format!("{message} {hint}")),
        ]
    }

    fn restore_draft(&mut self) -> Vec<FormEffect> {
        let Some(draft) = self.pending_draft.take() else {
            return Vec::new();
        };
        let step = draft.step.min(self.definition.last_step());
        self.record.replace_values(&self.definition, draft.data);
        self.errors.clear();
        self.phase = Phase::Editing { step };
        self.focus = self.definition.first_field(step);
        self.dirty_since = None;

        let mut effects = vec![
            FormEffect::Render,
            FormEffect::Announce("Restored your saved progress".to_owned()),
        ];
        if let Some(focus) = self.focus {
            effects.push(FormEffect::Focus(focus));
        }
        effects
    }

    fn discard_draft(&mut self) -> Vec<FormEffect> {
        if self.pending_draft.take().is_none() {
            return Vec::new();
        }
        vec![FormEffect::ClearDraft, FormEffect::Render]
    }

    fn reset(&mut self) -> Vec<FormEffect> {
        if self.is_submitting() {
            return Vec::new();
        }
        self.record.clear();
        self.errors.clear();
        self.phase = Phase::Editing { step: 0 };
        self.pending_draft = None;
        self.dirty_since = None;
        self.focus = self.definition.first_field(0);

        let mut effects = vec![FormEffect::ClearDraft, FormEffect::Render];
        if let Some(focus) = self.focus {
            effects.push(FormEffect::Focus(focus));
        }
        effects
    }

    /// Debounced save: fires once the record has been quiet for
    /// [`AUTOSAVE_DELAY`], or immediately when `force` (page unload).
    /// Suspended while a stored draft awaits the restore/discard answer.
    fn autosave(&mut self, now: OffsetDateTime, force: bool) -> Vec<FormEffect> {
        let Some(dirty_since) = self.dirty_since else {
            return Vec::new();
        };
        if self.pending_draft.is_some() || !self.accepts_edits() {
            return Vec::new();
        }
        if !force && now - dirty_since < AUTOSAVE_DELAY {
            return Vec::new();
        }
        self.dirty_since = None;
        vec![FormEffect::SaveDraft(Draft::capture(
            &self.record,
            self.current_step(),
            now,
        ))]
    }

    fn mark_dirty(&mut self, now: OffsetDateTime) {
        self.dirty_since = Some(now);
    }

    fn track(&self, name: EventName, step: Option<usize>) -> FormEffect {
        FormEffect::Track(AnalyticsEvent {
            name,
            form_id: self.definition.id,
            step_number: step.map(|step| step + 1),
            step_name: step
                .and_then(|step| self.definition.step(step))
                .map(|spec| spec.name),
        })
    }
}
