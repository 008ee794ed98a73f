// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use movefinder_app::{
    FieldKind, FieldSpec, FieldValue, FormCommand, FormDefinition, FormEffect, FormState,
    LeadPayload, Phase, Season, SubmissionOutcome,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use time::OffsetDateTime;
use time::macros::format_description;

const TITLE: &str = "Austin Move Finder";
const STATUS_CLEAR_AFTER: Duration = Duration::from_secs(4);
const STEP_DONE: &str = "●";
const STEP_TODO: &str = "○";
const FOCUS_MARK: &str = ">";

/// What the terminal loop needs from the form controller.
pub trait FormRuntime {
    fn state(&self) -> &FormState;
    fn dispatch(&mut self, command: FormCommand) -> Vec<FormEffect>;
    fn submit(&mut self, payload: &LeadPayload) -> Result<SubmissionOutcome>;
    fn spawn_submission(&mut self, payload: LeadPayload, tx: Sender<InternalEvent>) -> Result<()> {
        let outcome = self.submit(&payload)?;
        tx.send(InternalEvent::SubmissionResolved(outcome))
            .map_err(|_| anyhow!("submission event channel closed"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalEvent {
    ClearStatus { token: u64 },
    SubmissionResolved(SubmissionOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DraftOffer {
    saved_at: OffsetDateTime,
    step: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FailureNotice {
    message: String,
    hint: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct ViewData {
    focus: Option<&'static str>,
    option_cursor: usize,
    draft_offer: Option<DraftOffer>,
    failure: Option<FailureNotice>,
    status: Option<String>,
    status_token: u64,
}

/// Runs the form until the user quits. `initial_effects` are the effects
/// returned when the session mounted (draft offer, first focus).
pub fn run_app<R: FormRuntime>(runtime: &mut R, initial_effects: Vec<FormEffect>) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::default();
    let (internal_tx, internal_rx) = mpsc::channel();
    apply_effects(runtime, &mut view_data, &internal_tx, initial_effects);

    let mut result = Ok(());
    loop {
        process_internal_events(runtime, &mut view_data, &internal_tx, &internal_rx);
        let effects = runtime.dispatch(FormCommand::Tick);
        apply_effects(runtime, &mut view_data, &internal_tx, effects);

        if let Err(error) = terminal.draw(|frame| render(frame, runtime.state(), &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = match event::poll(Duration::from_millis(120)).context("poll event") {
            Ok(has_event) => has_event,
            Err(error) => {
                result = Err(error);
                break;
            }
        };
        if has_event {
            match event::read().context("read event") {
                Ok(Event::Key(key)) => {
                    if handle_key_event(runtime, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                Ok(_) => {}
                Err(error) => {
                    result = Err(error);
                    break;
                }
            }
        }
    }

    if result.is_err() {
        let effects = runtime.dispatch(FormCommand::Unload);
        apply_effects(runtime, &mut view_data, &internal_tx, effects);
    }
    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn process_internal_events<R: FormRuntime>(
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                view_data.status = None;
            }
            InternalEvent::ClearStatus { .. } => {}
            InternalEvent::SubmissionResolved(outcome) => {
                let effects = runtime.dispatch(FormCommand::SubmissionResolved(outcome));
                apply_effects(runtime, view_data, tx, effects);
            }
        }
    }
}

fn apply_effects<R: FormRuntime>(
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    effects: Vec<FormEffect>,
) {
    for effect in effects {
        match effect {
            FormEffect::Focus(field) => {
                if view_data.focus != Some(field) {
                    view_data.option_cursor = 0;
                }
                view_data.focus = Some(field);
            }
            FormEffect::Announce(text) => emit_status(view_data, tx, text),
            FormEffect::OfferDraft { saved_at, step } => {
                view_data.draft_offer = Some(DraftOffer { saved_at, step });
            }
            FormEffect::Send(payload) => {
                view_data.failure = None;
                if let Err(error) = runtime.spawn_submission(payload, tx.clone()) {
                    tracing::warn!(error = %format!("{error:#}"), "submission worker failed to start");
                    let outcome = SubmissionOutcome::Unavailable {
                        attempts: 0,
                        detail: error.to_string(),
                    };
                    let effects = runtime.dispatch(FormCommand::SubmissionResolved(outcome));
                    apply_effects(runtime, view_data, tx, effects);
                }
            }
            FormEffect::ShowConfirmation { .. } => {
                view_data.failure = None;
                view_data.focus = None;
            }
            FormEffect::ShowFailure { message, hint } => {
                view_data.failure = Some(FailureNotice { message, hint });
            }
            FormEffect::Render
            | FormEffect::FieldInvalid { .. }
            | FormEffect::SaveDraft(_)
            | FormEffect::ClearDraft
            | FormEffect::Track(_) => {}
        }
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(STATUS_CLEAR_AFTER);
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    view_data.status = Some(message.into());
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

fn dispatch_and_apply<R: FormRuntime>(
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    command: FormCommand,
) {
    let effects = runtime.dispatch(command);
    apply_effects(runtime, view_data, tx, effects);
}

fn handle_key_event<R: FormRuntime>(
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    if ctrl && key.code == KeyCode::Char('q') {
        dispatch_and_apply(runtime, view_data, internal_tx, FormCommand::Unload);
        return true;
    }

    if ctrl && key.code == KeyCode::Char('r') {
        if runtime.state().is_submitting() {
            emit_status(view_data, internal_tx, "still sending; reset after it finishes");
            return false;
        }
        view_data.draft_offer = None;
        view_data.failure = None;
        dispatch_and_apply(runtime, view_data, internal_tx, FormCommand::Reset);
        emit_status(view_data, internal_tx, "form reset");
        return false;
    }

    if view_data.draft_offer.is_some() {
        let command = match key.code {
            KeyCode::Char('r') => FormCommand::RestoreDraft,
            KeyCode::Char('d') => FormCommand::DiscardDraft,
            _ => return false,
        };
        view_data.draft_offer = None;
        dispatch_and_apply(runtime, view_data, internal_tx, command);
        if matches!(key.code, KeyCode::Char('d')) {
            emit_status(view_data, internal_tx, "saved progress discarded");
        }
        return false;
    }

    if matches!(runtime.state().phase(), Phase::Succeeded { .. }) {
        if key.code == KeyCode::Enter {
            dispatch_and_apply(runtime, view_data, internal_tx, FormCommand::Reset);
        }
        return false;
    }

    match key.code {
        KeyCode::Tab | KeyCode::Down => move_focus(runtime, view_data, internal_tx, 1),
        KeyCode::BackTab | KeyCode::Up => move_focus(runtime, view_data, internal_tx, -1),
        KeyCode::Esc => {
            view_data.failure = None;
            dispatch_and_apply(runtime, view_data, internal_tx, FormCommand::Back);
        }
        KeyCode::Enter => {
            let state = runtime.state();
            if state.is_submitting() {
                emit_status(view_data, internal_tx, "still sending your request");
                return false;
            }
            let on_last = state.current_step() == state.definition().last_step();
            let command = if on_last {
                FormCommand::Submit
            } else {
                FormCommand::Next
            };
            dispatch_and_apply(runtime, view_data, internal_tx, command);
        }
        _ if !ctrl => edit_focused(runtime, view_data, internal_tx, key.code),
        _ => {}
    }
    false
}

fn step_fields(state: &FormState) -> &'static [FieldSpec] {
    state
        .definition()
        .step(state.current_step())
        .map(|step| step.fields)
        .unwrap_or_default()
}

fn focused_spec(state: &FormState, view_data: &ViewData) -> Option<&'static FieldSpec> {
    let fields = step_fields(state);
    view_data
        .focus
        .and_then(|name| fields.iter().find(|field| field.name == name))
        .or_else(|| fields.first())
}

fn move_focus<R: FormRuntime>(
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    delta: isize,
) {
    let fields = step_fields(runtime.state());
    if fields.is_empty() {
        return;
    }
    let current = focused_spec(runtime.state(), view_data)
        .and_then(|spec| fields.iter().position(|field| field.name == spec.name))
        .unwrap_or(0);
    let next = (current as isize + delta).rem_euclid(fields.len() as isize) as usize;

    let leaving = fields[current].name;
    dispatch_and_apply(
        runtime,
        view_data,
        internal_tx,
        FormCommand::Blur {
            name: leaving.to_owned(),
        },
    );
    view_data.focus = Some(fields[next].name);
    view_data.option_cursor = 0;
}

fn edit_focused<R: FormRuntime>(
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    code: KeyCode,
) {
    let Some(spec) = focused_spec(runtime.state(), view_data) else {
        return;
    };
    let current = runtime.state().record().get(spec.name).cloned();

    let command = match spec.kind {
        FieldKind::Text
        | FieldKind::Email
        | FieldKind::Phone
        | FieldKind::PostalCode
        | FieldKind::Date
        | FieldKind::LongText => {
            let mut text = current
                .as_ref()
                .map(|value| value.as_text().to_owned())
                .unwrap_or_default();
            match code {
                KeyCode::Char(ch) => text.push(ch),
                KeyCode::Backspace => {
                    text.pop();
                }
                _ => return,
            }
            FormCommand::SetField {
                name: spec.name.to_owned(),
                value: FieldValue::Text(text),
            }
        }
        FieldKind::Choice => {
            let selected = current.as_ref().map(FieldValue::as_text).unwrap_or("");
            let position = spec.options.iter().position(|option| *option == selected);
            let len = spec.options.len();
            if len == 0 {
                return;
            }
            let next = match (code, position) {
                (KeyCode::Right | KeyCode::Char(' '), None) => 0,
                (KeyCode::Right | KeyCode::Char(' '), Some(index)) => (index + 1) % len,
                (KeyCode::Left, None) => len - 1,
                (KeyCode::Left, Some(index)) => (index + len - 1) % len,
                _ => return,
            };
            FormCommand::SetField {
                name: spec.name.to_owned(),
                value: FieldValue::Choice(Some(spec.options[next].to_owned())),
            }
        }
        FieldKind::Checkboxes => {
            let len = spec.options.len();
            if len == 0 {
                return;
            }
            match code {
                KeyCode::Right => {
                    view_data.option_cursor = (view_data.option_cursor + 1) % len;
                    return;
                }
                KeyCode::Left => {
                    view_data.option_cursor = (view_data.option_cursor + len - 1) % len;
                    return;
                }
                KeyCode::Char(' ') => FormCommand::ToggleOption {
                    name: spec.name.to_owned(),
                    option: spec.options[view_data.option_cursor.min(len - 1)].to_owned(),
                },
                _ => return,
            }
        }
        FieldKind::Flag | FieldKind::Consent => {
            if code != KeyCode::Char(' ') {
                return;
            }
            let checked = current.as_ref().is_some_and(FieldValue::as_flag);
            FormCommand::SetField {
                name: spec.name.to_owned(),
                value: FieldValue::Flag(!checked),
            }
        }
    };
    dispatch_and_apply(runtime, view_data, internal_tx, command);
}

fn render(frame: &mut ratatui::Frame<'_>, state: &FormState, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let header = Paragraph::new(progress_text(state))
        .block(Block::default().title(TITLE).borders(Borders::ALL))
        .style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_widget(header, layout[0]);

    let body_text = match state.phase() {
        Phase::Succeeded { .. } => confirmation_text(state),
        _ => step_text(state, view_data),
    };
    let body = Paragraph::new(body_text)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(body, layout[1]);

    let status = Paragraph::new(status_text(state, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status, layout[2]);

    if let Some(offer) = view_data.draft_offer {
        let area = centered_rect(60, 30, frame.area());
        frame.render_widget(Clear, area);
        let prompt = Paragraph::new(draft_prompt_text(offer, state.definition()))
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .title("saved progress")
                    .borders(Borders::ALL)
                    .style(Style::default().fg(Color::White)),
            );
        frame.render_widget(prompt, area);
    }
}

fn progress_text(state: &FormState) -> String {
    let definition = state.definition();
    if matches!(state.phase(), Phase::Succeeded { .. }) {
        return "Request received".to_owned();
    }
    let current = state.current_step();
    let dots = (0..definition.step_count())
        .map(|index| if index <= current { STEP_DONE } else { STEP_TODO })
        .collect::<Vec<_>>()
        .join(" ");
    let title = definition.step(current).map_or("", |step| step.title);
    format!(
        "{dots}  Step {} of {}: {title}",
        current + 1,
        definition.step_count()
    )
}

fn step_text(state: &FormState, view_data: &ViewData) -> String {
    let focused = focused_spec(state, view_data).map(|spec| spec.name);
    let mut lines = Vec::new();

    for spec in step_fields(state) {
        let marker = if focused == Some(spec.name) {
            FOCUS_MARK
        } else {
            " "
        };
        let required = if spec.required { " *" } else { "" };
        let value = state.record().get(spec.name);
        let cursor = (focused == Some(spec.name)).then_some(view_data.option_cursor);
        lines.push(format!(
            "{marker} {}{required}: {}",
            spec.label,
            display_value(spec, value, cursor)
        ));
        if let Some(text) = spec.consent_text {
            lines.push(format!("    {text}"));
        }
        if let Some(error) = state.error_for(spec.name) {
            lines.push(format!("    ! {error}"));
        }
    }

    match state.phase() {
        Phase::Submitting { .. } => {
            lines.push(String::new());
            lines.push("Sending your request...".to_owned());
        }
        Phase::Failed { .. } => {
            if let Some(failure) = &view_data.failure {
                lines.push(String::new());
                lines.push(format!("! {}", failure.message));
                lines.push(format!("  {}", failure.hint));
            }
        }
        Phase::Editing { .. } | Phase::Succeeded { .. } => {}
    }
    lines.join("\n")
}

fn display_value(spec: &FieldSpec, value: Option<&FieldValue>, cursor: Option<usize>) -> String {
    match spec.kind {
        FieldKind::Choice => {
            let selected = value.map(FieldValue::as_text).unwrap_or("");
            if selected.is_empty() {
                "< choose >".to_owned()
            } else {
                format!("< {} >", option_label(selected))
            }
        }
        FieldKind::Checkboxes => {
            let selected = value.map(FieldValue::as_many).unwrap_or(&[]);
            spec.options
                .iter()
                .enumerate()
                .map(|(index, option)| {
                    let mark = if selected.iter().any(|value| value == option) {
                        "[x]"
                    } else {
                        "[ ]"
                    };
                    let pointer = if cursor == Some(index) { FOCUS_MARK } else { "" };
                    format!("{pointer}{mark} {}", option_label(option))
                })
                .collect::<Vec<_>>()
                .join("  ")
        }
        FieldKind::Flag | FieldKind::Consent => {
            if value.is_some_and(FieldValue::as_flag) {
                "[x]".to_owned()
            } else {
                "[ ]".to_owned()
            }
        }
        FieldKind::Date => {
            let text = value.map(FieldValue::as_text).unwrap_or("");
            if text.is_empty() {
                movefinder_app::DATE_LAYOUT.to_owned()
            } else {
                text.to_owned()
            }
        }
        FieldKind::Text
        | FieldKind::Email
        | FieldKind::Phone
        | FieldKind::PostalCode
        | FieldKind::LongText => value.map(FieldValue::as_text).unwrap_or("").to_owned(),
    }
}

fn option_label(option: &str) -> String {
    let label = match option {
        "studio" => "Studio",
        "one_bedroom" => "1 bedroom",
        "two_bedroom" => "2 bedrooms",
        "three_bedroom" => "3 bedrooms",
        "four_plus" => "4+ bedrooms",
        "office" => "Office",
        "piano" => "Piano",
        "pool_table" => "Pool table",
        "safe" => "Safe",
        "hot_tub" => "Hot tub",
        "artwork" => "Artwork",
        "antiques" => "Antiques",
        "none" => "None",
        "under_1000" => "Under $1,000",
        "1000_2500" => "$1,000 - $2,500",
        "2500_5000" => "$2,500 - $5,000",
        "over_5000" => "Over $5,000",
        "not_sure" => "Not sure",
        other => return other.replace('_', " "),
    };
    label.to_owned()
}

fn confirmation_text(state: &FormState) -> String {
    let Phase::Succeeded {
        reference,
        estimate,
    } = state.phase()
    else {
        return String::new();
    };

    let mut lines = vec!["Thanks! Your request was received.".to_owned()];
    if let Some(reference) = reference {
        lines.push(format!("Reference: {reference}"));
    }
    if let Some(estimate) = estimate {
        let season = match estimate.season {
            Season::Peak => "peak season",
            Season::Standard => "standard season",
        };
        lines.push(format!(
            "Estimated cost: {} ({} move, {season})",
            estimate.display_range(),
            estimate.distance.as_str()
        ));
    }
    lines.push(String::new());
    lines.push("A mover will follow up shortly. Press enter to start a new quote.".to_owned());
    lines.join("\n")
}

fn draft_prompt_text(offer: DraftOffer, definition: &FormDefinition) -> String {
    let saved = offer
        .saved_at
        .format(format_description!("[month]/[day] [hour]:[minute]"))
        .unwrap_or_default();
    format!(
        "You have saved progress from {saved} (step {} of {}).\n\nr restore | d discard",
        offer.step + 1,
        definition.step_count()
    )
}

fn status_text(state: &FormState, view_data: &ViewData) -> String {
    let keys = match state.phase() {
        Phase::Succeeded { .. } => "enter new quote | ctrl+q quit",
        Phase::Submitting { .. } => "sending... | ctrl+q quit",
        Phase::Editing { step } | Phase::Failed { step, .. }
            if *step == state.definition().last_step() =>
        {
            "tab/shift+tab move | space toggle | ←/→ choose | enter submit | esc back | ctrl+r reset | ctrl+q quit"
        }
        Phase::Editing { .. } | Phase::Failed { .. } => {
            "tab/shift+tab move | space toggle | ←/→ choose | enter next | esc back | ctrl+r reset | ctrl+q quit"
        }
    };
    match &view_data.status {
        Some(status) => format!("{status} | {keys}"),
        None => keys.to_owned(),
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::{
        DraftOffer, FormRuntime, InternalEvent, ViewData, apply_effects, confirmation_text,
        draft_prompt_text, handle_key_event, process_internal_events, progress_text, status_text,
        step_text,
    };
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use movefinder_app::{
        Clock, FormCommand, FormDefinition, FormEffect, FormSession, FormState, HOME_SIZES,
        LeadPayload, LeadReference, MountContext, NoopAnalytics, Phase, SubmissionOutcome, fields,
    };
    use movefinder_testkit::{ManualClock, MemoryStorage, ProspectFaker, reference_now};
    use std::collections::VecDeque;
    use std::sync::mpsc::{self, Receiver, Sender};
    use std::sync::Arc;
    use time::Duration;

    struct TestRuntime {
        session: FormSession<Arc<MemoryStorage>, NoopAnalytics, Arc<ManualClock>>,
        storage: Arc<MemoryStorage>,
        clock: Arc<ManualClock>,
        outcomes: VecDeque<SubmissionOutcome>,
        hold_submissions: bool,
        submit_count: usize,
    }

    impl TestRuntime {
        fn mount(storage: Arc<MemoryStorage>) -> (Self, Vec<FormEffect>) {
            let clock = Arc::new(ManualClock::at_reference());
            let (session, effects) = FormSession::mount(
                FormDefinition::QUOTE,
                MountContext::default(),
                Arc::clone(&storage),
                NoopAnalytics,
                Arc::clone(&clock),
            );
            let runtime = Self {
                session,
                storage,
                clock,
                outcomes: VecDeque::new(),
                hold_submissions: false,
                submit_count: 0,
            };
            (runtime, effects)
        }

        fn fill_through_last_step(&mut self) {
            let answers = ProspectFaker::new(21).quote_answers(self.clock.today());
            for command in answers.full_walkthrough() {
                self.session.dispatch(command);
            }
        }
    }

    impl FormRuntime for TestRuntime {
        fn state(&self) -> &FormState {
            self.session.state()
        }

        fn dispatch(&mut self, command: FormCommand) -> Vec<FormEffect> {
            self.session.dispatch(command)
        }

        fn submit(&mut self, _payload: &LeadPayload) -> anyhow::Result<SubmissionOutcome> {
            self.submit_count += 1;
            Ok(self
                .outcomes
                .pop_front()
                .unwrap_or(SubmissionOutcome::Accepted { reference: None }))
        }

        fn spawn_submission(
            &mut self,
            payload: LeadPayload,
            tx: Sender<InternalEvent>,
        ) -> anyhow::Result<()> {
            if self.hold_submissions {
                self.submit_count += 1;
                return Ok(());
            }
            let outcome = self.submit(&payload)?;
            tx.send(InternalEvent::SubmissionResolved(outcome))
                .map_err(|_| anyhow::anyhow!("channel closed"))
        }
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(ch: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL)
    }

    fn setup() -> (
        TestRuntime,
        ViewData,
        Sender<InternalEvent>,
        Receiver<InternalEvent>,
    ) {
        let (mut runtime, effects) = TestRuntime::mount(Arc::new(MemoryStorage::new()));
        let mut view_data = ViewData::default();
        let (tx, rx) = mpsc::channel();
        apply_effects(&mut runtime, &mut view_data, &tx, effects);
        (runtime, view_data, tx, rx)
    }

    fn type_text(
        runtime: &mut TestRuntime,
        view_data: &mut ViewData,
        tx: &Sender<InternalEvent>,
        text: &str,
    ) {
        for ch in text.chars() {
            handle_key_event(runtime, view_data, tx, press(KeyCode::Char(ch)));
        }
    }

    #[test]
    fn phone_is_masked_while_typing() {
        let (mut runtime, mut view_data, tx, _rx) = setup();
        handle_key_event(&mut runtime, &mut view_data, &tx, press(KeyCode::Tab));
        handle_key_event(&mut runtime, &mut view_data, &tx, press(KeyCode::Tab));
        assert_eq!(view_data.focus, Some(fields::PHONE));

        type_text(&mut runtime, &mut view_data, &tx, "5125551234");
        assert_eq!(runtime.state().record().text(fields::PHONE), "(512) 555-1234");

        handle_key_event(&mut runtime, &mut view_data, &tx, press(KeyCode::Backspace));
        assert_eq!(runtime.state().record().text(fields::PHONE), "(512) 555-123");
    }

    #[test]
    fn enter_on_invalid_step_shows_errors_and_announces() {
        let (mut runtime, mut view_data, tx, _rx) = setup();
        type_text(&mut runtime, &mut view_data, &tx, "Jane Doe");
        handle_key_event(&mut runtime, &mut view_data, &tx, press(KeyCode::Enter));

        assert_eq!(runtime.state().phase(), &Phase::Editing { step: 0 });
        assert_eq!(view_data.focus, Some(fields::EMAIL));
        let body = step_text(runtime.state(), &view_data);
        assert!(body.contains("! Please provide an email address or phone number"));
        assert!(
            status_text(runtime.state(), &view_data).contains("2 fields need attention"),
            "status: {}",
            status_text(runtime.state(), &view_data)
        );
    }

    #[test]
    fn step_text_marks_required_fields_and_focus() {
        let (runtime, view_data, _tx, _rx) = setup();
        let body = step_text(runtime.state(), &view_data);
        assert!(body.contains("> Full name *: "));
        assert!(body.contains("  Email: "));
        assert!(progress_text(runtime.state()).contains("Step 1 of 3: Your contact info"));
    }

    #[test]
    fn choices_cycle_and_checkboxes_toggle() {
        let (mut runtime, mut view_data, tx, _rx) = setup();
        runtime.fill_through_last_step();
        // back to the move step and onto home size
        handle_key_event(&mut runtime, &mut view_data, &tx, press(KeyCode::Esc));
        view_data.focus = Some(fields::HOME_SIZE);
        let before = runtime.state().record().text(fields::HOME_SIZE).to_owned();
        let index = HOME_SIZES
            .iter()
            .position(|size| *size == before)
            .expect("faker picks a listed size");
        handle_key_event(&mut runtime, &mut view_data, &tx, press(KeyCode::Left));
        assert_eq!(
            runtime.state().record().text(fields::HOME_SIZE),
            HOME_SIZES[(index + HOME_SIZES.len() - 1) % HOME_SIZES.len()]
        );

        handle_key_event(&mut runtime, &mut view_data, &tx, press(KeyCode::Enter));
        assert_eq!(view_data.focus, Some(fields::SPECIAL_ITEMS));
        handle_key_event(&mut runtime, &mut view_data, &tx, press(KeyCode::Char(' ')));
        handle_key_event(&mut runtime, &mut view_data, &tx, press(KeyCode::Right));
        handle_key_event(&mut runtime, &mut view_data, &tx, press(KeyCode::Right));
        handle_key_event(&mut runtime, &mut view_data, &tx, press(KeyCode::Char(' ')));
        let selected = runtime
            .state()
            .record()
            .get(fields::SPECIAL_ITEMS)
            .map(|value| value.as_many().to_vec());
        assert_eq!(selected, Some(vec!["piano".to_owned(), "safe".to_owned()]));
        assert!(step_text(runtime.state(), &view_data).contains(">[x] Safe"));
    }

    #[test]
    fn submission_resolves_through_channel() {
        let (mut runtime, mut view_data, tx, rx) = setup();
        runtime.outcomes.push_back(SubmissionOutcome::Accepted {
            reference: Some(LeadReference::from("42")),
        });
        runtime.fill_through_last_step();

        handle_key_event(&mut runtime, &mut view_data, &tx, press(KeyCode::Enter));
        assert!(runtime.state().is_submitting());
        process_internal_events(&mut runtime, &mut view_data, &tx, &rx);

        let text = confirmation_text(runtime.state());
        assert!(text.contains("Reference: 42"), "confirmation: {text}");
        assert!(text.contains("Estimated cost: $"));
        assert_eq!(runtime.submit_count, 1);
    }

    #[test]
    fn enter_is_inert_while_submitting() {
        let (mut runtime, mut view_data, tx, _rx) = setup();
        runtime.hold_submissions = true;
        runtime.fill_through_last_step();

        handle_key_event(&mut runtime, &mut view_data, &tx, press(KeyCode::Enter));
        handle_key_event(&mut runtime, &mut view_data, &tx, press(KeyCode::Enter));
        assert_eq!(runtime.submit_count, 1);
        assert!(step_text(runtime.state(), &view_data).contains("Sending your request"));

        // typing stays responsive while the request is in flight
        view_data.focus = Some(fields::NOTES);
        type_text(&mut runtime, &mut view_data, &tx, "hi");
        assert_eq!(runtime.state().record().text(fields::NOTES), "hi");
    }

    #[test]
    fn rejection_is_shown_with_hint() {
        let (mut runtime, mut view_data, tx, rx) = setup();
        runtime.outcomes.push_back(SubmissionOutcome::Rejected {
            reason: "Duplicate submission".to_owned(),
        });
        runtime.fill_through_last_step();
        handle_key_event(&mut runtime, &mut view_data, &tx, press(KeyCode::Enter));
        process_internal_events(&mut runtime, &mut view_data, &tx, &rx);

        let body = step_text(runtime.state(), &view_data);
        assert!(body.contains("! Duplicate submission"));
        assert!(body.contains("(512) 555-0142"));
    }

    #[test]
    fn draft_prompt_restores_previous_progress() {
        let storage = Arc::new(MemoryStorage::new());
        {
            let (mut runtime, _) = TestRuntime::mount(Arc::clone(&storage));
            let mut view_data = ViewData::default();
            let (tx, _rx) = mpsc::channel();
            type_text(&mut runtime, &mut view_data, &tx, "Jane");
            assert!(handle_key_event(&mut runtime, &mut view_data, &tx, ctrl('q')));
        }

        let (mut runtime, effects) = TestRuntime::mount(storage);
        let mut view_data = ViewData::default();
        let (tx, _rx) = mpsc::channel();
        apply_effects(&mut runtime, &mut view_data, &tx, effects);
        let offer = view_data.draft_offer.expect("draft offered");
        assert!(draft_prompt_text(offer, runtime.state().definition()).contains("r restore"));

        // other keys are ignored while the prompt is open
        type_text(&mut runtime, &mut view_data, &tx, "x");
        assert!(runtime.state().record().values().is_empty());

        handle_key_event(&mut runtime, &mut view_data, &tx, press(KeyCode::Char('r')));
        assert!(view_data.draft_offer.is_none());
        assert_eq!(runtime.state().record().text(fields::NAME), "Jane");
    }

    #[test]
    fn ticks_autosave_after_quiet_period() {
        let (mut runtime, mut view_data, tx, _rx) = setup();
        type_text(&mut runtime, &mut view_data, &tx, "Jane");
        runtime.clock.advance(Duration::seconds(5));
        let effects = runtime.dispatch(FormCommand::Tick);
        apply_effects(&mut runtime, &mut view_data, &tx, effects);
        assert!(runtime.storage.get("movefinder.quote_draft").is_some());
    }

    #[test]
    fn draft_prompt_shows_saved_time_and_step() {
        let text = draft_prompt_text(
            DraftOffer {
                saved_at: reference_now(),
                step: 1,
            },
            &FormDefinition::QUOTE,
        );
        assert!(text.contains("02/19 12:34"));
        assert!(text.contains("step 2 of 3"));
    }

    #[test]
    fn ctrl_r_resets_to_first_step() {
        let (mut runtime, mut view_data, tx, _rx) = setup();
        runtime.fill_through_last_step();
        handle_key_event(&mut runtime, &mut view_data, &tx, ctrl('r'));
        assert_eq!(runtime.state().phase(), &Phase::Editing { step: 0 });
        assert!(runtime.state().record().values().is_empty());
        assert_eq!(view_data.status.as_deref(), Some("form reset"));
    }
}
