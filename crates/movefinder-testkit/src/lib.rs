// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use movefinder_app::{
    AnalyticsEvent, AnalyticsSink, Clock, DraftStorage, FieldValue, FormCommand, FormDefinition,
    LeadPayload, LeadTransport, SubmissionOutcome, fields, format_date,
};
use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;
use std::sync::Mutex;
use time::{Date, Duration, Month, OffsetDateTime, Time};

const FIRST_NAMES: [&str; 12] = [
    "Avery", "Jordan", "Taylor", "Riley", "Morgan", "Casey", "Alex", "Quinn", "Parker", "Drew",
    "Rowan", "Hayden",
];
const LAST_NAMES: [&str; 12] = [
    "Walker", "Martin", "Lopez", "Gray", "Reed", "Diaz", "Turner", "Flores", "Bennett", "Price",
    "Foster", "Brooks",
];
const EMAIL_DOMAINS: [&str; 4] = [
    "example.com",
    "mail.example.org",
    "inbox.example.net",
    "austin.example.com",
];
const AUSTIN_ZIPS: [&str; 10] = [
    "78701", "78702", "78703", "78704", "78705", "78721", "78723", "78731", "78745", "78758",
];
const HOME_SIZES: [&str; 5] = [
    "studio",
    "one_bedroom",
    "two_bedroom",
    "three_bedroom",
    "four_plus",
];

/// Fixed reference instant used across tests: 2026-02-19 12:34:56 UTC.
pub fn reference_now() -> OffsetDateTime {
    let date = Date::from_calendar_date(2026, Month::February, 19).expect("valid calendar date");
    let time = Time::from_hms(12, 34, 56).expect("valid time");
    date.with_time(time).assume_utc()
}

pub fn temp_db_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let db_path = dir.path().join("movefinder.db");
    Ok((dir, db_path))
}

/// Clock the test advances by hand.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<OffsetDateTime>,
}

impl ManualClock {
    pub fn new(now: OffsetDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn at_reference() -> Self {
        Self::new(reference_now())
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("clock lock");
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().expect("clock lock")
    }
}

/// In-memory key-value storage that counts writes.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<BTreeMap<String, String>>,
    saves: Mutex<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.lock().expect("storage lock").get(key).cloned()
    }

    pub fn insert(&self, key: &str, value: &str) {
        self.values
            .lock()
            .expect("storage lock")
            .insert(key.to_owned(), value.to_owned());
    }

    pub fn save_count(&self) -> usize {
        *self.saves.lock().expect("storage lock")
    }
}

impl DraftStorage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.get(key))
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        self.insert(key, value);
        *self.saves.lock().expect("storage lock") += 1;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.values.lock().expect("storage lock").remove(key);
        Ok(())
    }
}

/// Storage whose every operation fails, as with a full or disabled store.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingStorage;

impl DraftStorage for FailingStorage {
    fn load(&self, _key: &str) -> Result<Option<String>> {
        Err(anyhow!("storage disabled"))
    }

    fn save(&self, _key: &str, _value: &str) -> Result<()> {
        Err(anyhow!("storage quota exceeded"))
    }

    fn remove(&self, _key: &str) -> Result<()> {
        Err(anyhow!("storage disabled"))
    }
}

/// Transport that replays queued outcomes and records every payload.
/// Once the script runs dry it accepts without a reference.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    outcomes: Mutex<VecDeque<SubmissionOutcome>>,
    payloads: Mutex<Vec<LeadPayload>>,
}

impl ScriptedTransport {
    pub fn new(outcomes: impl IntoIterator<Item = SubmissionOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            payloads: Mutex::new(Vec::new()),
        }
    }

    pub fn payloads(&self) -> Vec<LeadPayload> {
        self.payloads.lock().expect("transport lock").clone()
    }

    pub fn request_count(&self) -> usize {
        self.payloads.lock().expect("transport lock").len()
    }
}

impl LeadTransport for ScriptedTransport {
    fn submit(&self, payload: &LeadPayload) -> SubmissionOutcome {
        self.payloads
            .lock()
            .expect("transport lock")
            .push(payload.clone());
        self.outcomes
            .lock()
            .expect("transport lock")
            .pop_front()
            .unwrap_or(SubmissionOutcome::Accepted { reference: None })
    }
}

#[derive(Debug, Default)]
pub struct RecordingAnalytics {
    events: Mutex<Vec<AnalyticsEvent>>,
}

impl RecordingAnalytics {
    pub fn events(&self) -> Vec<AnalyticsEvent> {
        self.events.lock().expect("analytics lock").clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events()
            .iter()
            .map(|event| event.name.as_str())
            .collect()
    }
}

impl AnalyticsSink for RecordingAnalytics {
    fn track(&self, event: &AnalyticsEvent) -> Result<()> {
        self.events
            .lock()
            .expect("analytics lock")
            .push(event.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FailingAnalytics;

impl AnalyticsSink for FailingAnalytics {
    fn track(&self, _event: &AnalyticsEvent) -> Result<()> {
        Err(anyhow!("analytics endpoint unreachable"))
    }
}

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }
}

/// Valid quote-form answers for one prospect, grouped by step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteAnswers {
    pub name: String,
    pub email: String,
    pub from_zip: String,
    pub to_zip: String,
    pub move_date: String,
    pub home_size: String,
}

impl QuoteAnswers {
    pub fn step_commands(&self, step: usize) -> Vec<FormCommand> {
        let text = |name: &str, value: &str| FormCommand::SetField {
            name: name.to_owned(),
            value: FieldValue::Text(value.to_owned()),
        };
        match step {
            0 => vec![
                text(fields::NAME, &self.name),
                text(fields::EMAIL, &self.email),
            ],
            1 => vec![
                text(fields::FROM_ZIP, &self.from_zip),
                text(fields::TO_ZIP, &self.to_zip),
                text(fields::MOVE_DATE, &self.move_date),
                FormCommand::SetField {
                    name: fields::HOME_SIZE.to_owned(),
                    value: FieldValue::Choice(Some(self.home_size.clone())),
                },
            ],
            2 => vec![FormCommand::SetField {
                name: fields::CONSENT.to_owned(),
                value: FieldValue::Flag(true),
            }],
            _ => Vec::new(),
        }
    }

    /// Every field command followed by the `Next` that leaves each earlier
    /// step, ending on the last step ready to submit.
    pub fn full_walkthrough(&self) -> Vec<FormCommand> {
        let last = FormDefinition::QUOTE.last_step();
        let mut commands = Vec::new();
        for step in 0..=last {
            commands.extend(self.step_commands(step));
            if step < last {
                commands.push(FormCommand::Next);
            }
        }
        commands
    }
}

#[derive(Debug, Clone)]
pub struct ProspectFaker {
    rng: DeterministicRng,
}

impl ProspectFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
        }
    }

    /// Answers whose move date falls 7 to 90 days after `today`.
    pub fn quote_answers(&mut self, today: Date) -> QuoteAnswers {
        let first = self.pick(&FIRST_NAMES);
        let last = self.pick(&LAST_NAMES);
        let domain = self.pick(&EMAIL_DOMAINS);
        let days_out = 7 + self.rng.int_n(84) as i64;
        QuoteAnswers {
            name: format!("{first} {last}"),
            email: format!(
                "{}.{}@{domain}",
                first.to_ascii_lowercase(),
                last.to_ascii_lowercase()
            ),
            from_zip: self.pick(&AUSTIN_ZIPS).to_owned(),
            to_zip: self.pick(&AUSTIN_ZIPS).to_owned(),
            move_date: format_date(today + Duration::days(days_out)),
            home_size: self.pick(&HOME_SIZES).to_owned(),
        }
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::{ManualClock, ProspectFaker, ScriptedTransport, reference_now};
    use movefinder_app::{
        ClientMetadata, Clock, FormDefinition, FormRecord, FormState, LeadTransport,
        SubmissionOutcome, validate_through,
    };
    use time::Duration;

    #[test]
    fn faker_is_deterministic_by_seed() {
        let today = reference_now().date();
        let first = ProspectFaker::new(7).quote_answers(today);
        let second = ProspectFaker::new(7).quote_answers(today);
        assert_eq!(first, second);
    }

    #[test]
    fn faker_answers_pass_full_validation() {
        let now = reference_now();
        let mut faker = ProspectFaker::new(42);
        for _ in 0..20 {
            let answers = faker.quote_answers(now.date());
            let mut state = FormState::new(FormDefinition::QUOTE, ClientMetadata::default());
            for command in answers.full_walkthrough() {
                state.dispatch(command, now);
            }
            let record: &FormRecord = state.record();
            assert!(
                validate_through(&FormDefinition::QUOTE, 2, record, now.date()).is_empty(),
                "answers should validate: {answers:?}"
            );
        }
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::at_reference();
        clock.advance(Duration::seconds(5));
        assert_eq!(clock.now(), reference_now() + Duration::seconds(5));
    }

    #[test]
    fn scripted_transport_falls_back_to_accept() {
        let transport = ScriptedTransport::new([SubmissionOutcome::Rejected {
            reason: "nope".to_owned(),
        }]);
        let state = FormState::new(FormDefinition::QUOTE, ClientMetadata::default());
        let payload = movefinder_app::LeadPayload::build(
            state.definition(),
            state.record(),
            &ClientMetadata::default(),
            reference_now(),
        );
        assert!(matches!(
            transport.submit(&payload),
            SubmissionOutcome::Rejected { .. }
        ));
        assert_eq!(
            transport.submit(&payload),
            SubmissionOutcome::Accepted { reference: None }
        );
        assert_eq!(transport.request_count(), 2);
    }
}
