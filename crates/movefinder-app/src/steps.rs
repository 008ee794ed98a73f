// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};

pub mod fields {
    pub const NAME: &str = "name";
    pub const EMAIL: &str = "email";
    pub const PHONE: &str = "phone";
    pub const FROM_ZIP: &str = "from_zip";
    pub const TO_ZIP: &str = "to_zip";
    pub const MOVE_DATE: &str = "move_date";
    pub const FLEXIBLE_DATE: &str = "flexible_date";
    pub const HOME_SIZE: &str = "home_size";
    pub const SPECIAL_ITEMS: &str = "special_items";
    pub const BUDGET: &str = "budget";
    pub const NOTES: &str = "notes";
    pub const CONSENT: &str = "consent";
}

pub const CONSENT_TEXT: &str = "I agree to be contacted by Austin Move Finder and up to three partner movers by phone, text, or email about my move. Consent is not a condition of purchase.";

pub const HOME_SIZES: &[&str] = &[
    "studio",
    "one_bedroom",
    "two_bedroom",
    "three_bedroom",
    "four_plus",
    "office",
];

pub const SPECIAL_ITEMS: &[&str] = &[
    "piano",
    "pool_table",
    "safe",
    "hot_tub",
    "artwork",
    "antiques",
    "none",
];

pub const BUDGETS: &[&str] = &[
    "under_1000",
    "1000_2500",
    "2500_5000",
    "over_5000",
    "not_sure",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    Text,
    Email,
    Phone,
    PostalCode,
    Date,
    LongText,
    Choice,
    Checkboxes,
    Flag,
    Consent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub options: &'static [&'static str],
    pub none_option: Option<&'static str>,
    pub consent_text: Option<&'static str>,
}

impl FieldSpec {
    pub const fn new(name: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            label,
            kind,
            required: false,
            options: &[],
            none_option: None,
            consent_text: None,
        }
    }

    pub const fn required(self) -> Self {
        Self {
            required: true,
            ..self
        }
    }

    pub const fn with_options(self, options: &'static [&'static str]) -> Self {
        Self { options, ..self }
    }

    pub const fn with_none_option(self, none_option: &'static str) -> Self {
        Self {
            none_option: Some(none_option),
            ..self
        }
    }

    pub const fn with_consent_text(self, text: &'static str) -> Self {
        Self {
            consent_text: Some(text),
            ..self
        }
    }

    pub const fn is_contact(&self) -> bool {
        matches!(self.kind, FieldKind::Email | FieldKind::Phone)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepSpec {
    pub name: &'static str,
    pub title: &'static str,
    pub fields: &'static [FieldSpec],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormKind {
    Quote,
    Lead,
}

impl FormKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::Lead => "lead",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "quote" => Some(Self::Quote),
            "lead" => Some(Self::Lead),
            _ => None,
        }
    }

    pub const fn definition(self) -> FormDefinition {
        match self {
            Self::Quote => FormDefinition::QUOTE,
            Self::Lead => FormDefinition::LEAD,
        }
    }
}

/// Ordered step list that parameterizes the controller.
///
/// Field order across steps is the document order used for focus and error
/// reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormDefinition {
    pub id: &'static str,
    pub steps: &'static [StepSpec],
}

const NAME_FIELD: FieldSpec = FieldSpec::new(fields::NAME, "Full name", FieldKind::Text).required();
const EMAIL_FIELD: FieldSpec = FieldSpec::new(fields::EMAIL, "Email", FieldKind::Email);
const PHONE_FIELD: FieldSpec = FieldSpec::new(fields::PHONE, "Phone", FieldKind::Phone);
const FROM_ZIP_FIELD: FieldSpec =
    FieldSpec::new(fields::FROM_ZIP, "Moving from (ZIP)", FieldKind::PostalCode).required();
const TO_ZIP_FIELD: FieldSpec =
    FieldSpec::new(fields::TO_ZIP, "Moving to (ZIP)", FieldKind::PostalCode).required();
const MOVE_DATE_FIELD: FieldSpec =
    FieldSpec::new(fields::MOVE_DATE, "Move date", FieldKind::Date).required();
const FLEXIBLE_FIELD: FieldSpec =
    FieldSpec::new(fields::FLEXIBLE_DATE, "My date is flexible", FieldKind::Flag);
const HOME_SIZE_FIELD: FieldSpec = FieldSpec::new(fields::HOME_SIZE, "Home size", FieldKind::Choice)
    .required()
    .with_options(HOME_SIZES);
const SPECIAL_ITEMS_FIELD: FieldSpec =
    FieldSpec::new(fields::SPECIAL_ITEMS, "Special items", FieldKind::Checkboxes)
        .with_options(SPECIAL_ITEMS)
        .with_none_option("none");
const BUDGET_FIELD: FieldSpec =
    FieldSpec::new(fields::BUDGET, "Budget", FieldKind::Choice).with_options(BUDGETS);
const NOTES_FIELD: FieldSpec = FieldSpec::new(fields::NOTES, "Notes", FieldKind::LongText);
const CONSENT_FIELD: FieldSpec = FieldSpec::new(fields::CONSENT, "Consent", FieldKind::Consent)
    .required()
    .with_consent_text(CONSENT_TEXT);

const QUOTE_STEPS: &[StepSpec] = &[
    StepSpec {
        name: "contact",
        title: "Your contact info",
        fields: &[NAME_FIELD, EMAIL_FIELD, PHONE_FIELD],
    },
    StepSpec {
        name: "move",
        title: "Your move",
        fields: &[
            FROM_ZIP_FIELD,
            TO_ZIP_FIELD,
            MOVE_DATE_FIELD,
            FLEXIBLE_FIELD,
            HOME_SIZE_FIELD,
        ],
    },
    StepSpec {
        name: "details",
        title: "Details",
        fields: &[SPECIAL_ITEMS_FIELD, BUDGET_FIELD, NOTES_FIELD, CONSENT_FIELD],
    },
];

const LEAD_STEPS: &[StepSpec] = &[
    StepSpec {
        name: "contact",
        title: "Get matched with a mover",
        fields: &[NAME_FIELD, EMAIL_FIELD, PHONE_FIELD, FROM_ZIP_FIELD],
    },
    StepSpec {
        name: "move",
        title: "About your move",
        fields: &[MOVE_DATE_FIELD, HOME_SIZE_FIELD, NOTES_FIELD, CONSENT_FIELD],
    },
];

impl FormDefinition {
    pub const QUOTE: Self = Self {
        id: "quote",
        steps: QUOTE_STEPS,
    };

    pub const LEAD: Self = Self {
        id: "lead",
        steps: LEAD_STEPS,
    };

    pub const fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub const fn last_step(&self) -> usize {
        self.steps.len().saturating_sub(1)
    }

    pub fn step(&self, index: usize) -> Option<&'static StepSpec> {
        self.steps.get(index)
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static FieldSpec> {
        self.steps.iter().flat_map(|step| step.fields.iter())
    }

    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields().find(|field| field.name == name)
    }

    pub fn step_of(&self, name: &str) -> Option<usize> {
        self.steps
            .iter()
            .position(|step| step.fields.iter().any(|field| field.name == name))
    }

    pub fn first_field(&self, step: usize) -> Option<&'static str> {
        self.step(step)
            .and_then(|step| step.fields.first())
            .map(|field| field.name)
    }

    /// The email-or-phone rule applies when the form collects both.
    pub fn has_contact_rule(&self) -> bool {
        self.fields().any(|field| field.kind == FieldKind::Email)
            && self.fields().any(|field| field.kind == FieldKind::Phone)
    }

    pub fn contact_fields(&self) -> Vec<&'static str> {
        self.fields()
            .filter(|field| field.is_contact())
            .map(|field| field.name)
            .collect()
    }
}
