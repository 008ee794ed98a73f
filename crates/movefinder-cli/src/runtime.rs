// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use movefinder_app::{
    AnalyticsSink, Clock, DraftStorage, FormCommand, FormEffect, FormSession, FormState,
    LeadPayload, LeadReference, LeadTransport, SubmissionOutcome,
};
use movefinder_tui::InternalEvent;
use std::sync::mpsc::Sender;
use std::thread;

/// Where submissions go. `Demo` answers locally so the form can be tried
/// without a lead endpoint.
#[derive(Debug, Clone)]
pub enum Submitter {
    Http(movefinder_client::Client),
    Demo,
}

impl LeadTransport for Submitter {
    fn submit(&self, payload: &LeadPayload) -> SubmissionOutcome {
        match self {
            Self::Http(client) => client.submit_lead(payload),
            Self::Demo => {
                tracing::info!(form_id = %payload.form_id, "demo submission accepted locally");
                SubmissionOutcome::Accepted {
                    reference: Some(LeadReference::new(format!(
                        "demo-{}",
                        payload.submitted_at.unix_timestamp()
                    ))),
                }
            }
        }
    }
}

pub struct SessionRuntime<S, A, C> {
    session: FormSession<S, A, C>,
    submitter: Submitter,
}

impl<S, A, C> SessionRuntime<S, A, C>
where
    S: DraftStorage,
    A: AnalyticsSink,
    C: Clock,
{
    pub fn new(session: FormSession<S, A, C>, submitter: Submitter) -> Self {
        Self { session, submitter }
    }
}

impl<S, A, C> movefinder_tui::FormRuntime for SessionRuntime<S, A, C>
where
    S: DraftStorage,
    A: AnalyticsSink,
    C: Clock,
{
    fn state(&self) -> &FormState {
        self.session.state()
    }

    fn dispatch(&mut self, command: FormCommand) -> Vec<FormEffect> {
        self.session.dispatch(command)
    }

    fn submit(&mut self, payload: &LeadPayload) -> Result<SubmissionOutcome> {
        Ok(self.submitter.submit(payload))
    }

    /// Runs the attempt loop off the UI thread; the outcome comes back
    /// through the event channel.
    fn spawn_submission(&mut self, payload: LeadPayload, tx: Sender<InternalEvent>) -> Result<()> {
        let submitter = self.submitter.clone();
        thread::Builder::new()
            .name("lead-submission".to_owned())
            .spawn(move || {
                let outcome = submitter.submit(&payload);
                if tx.send(InternalEvent::SubmissionResolved(outcome)).is_err() {
                    tracing::debug!("submission finished after the form closed");
                }
            })
            .context("spawn submission worker")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{SessionRuntime, Submitter};
    use anyhow::{Result, anyhow};
    use movefinder_app::{
        Clock, FormDefinition, FormEffect, FormSession, MountContext, NoopAnalytics, Phase,
    };
    use movefinder_client::{Client, RetryPolicy};
    use movefinder_db::Store;
    use movefinder_testkit::{ManualClock, ProspectFaker};
    use movefinder_tui::{FormRuntime, InternalEvent};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;
    use tiny_http::{Response, Server};

    fn filled_runtime<'a>(
        store: &'a Store,
        clock: &'a ManualClock,
        submitter: Submitter,
    ) -> SessionRuntime<&'a Store, NoopAnalytics, &'a ManualClock> {
        let (mut session, _) = FormSession::mount(
            FormDefinition::QUOTE,
            MountContext::default(),
            store,
            NoopAnalytics,
            clock,
        );
        let answers = ProspectFaker::new(11).quote_answers(clock.today());
        for command in answers.full_walkthrough() {
            session.dispatch(command);
        }
        SessionRuntime::new(session, submitter)
    }

    fn take_send(effects: Vec<FormEffect>) -> Result<movefinder_app::LeadPayload> {
        effects
            .into_iter()
            .find_map(|effect| match effect {
                FormEffect::Send(payload) => Some(payload),
                _ => None,
            })
            .ok_or_else(|| anyhow!("submit should send"))
    }

    #[test]
    fn worker_delivers_http_outcome_over_channel() -> Result<()> {
        let server =
            Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
        let endpoint = format!("http://{}/api/leads", server.server_addr());
        let handle = thread::spawn(move || {
            let request = server.recv().expect("request expected");
            request
                .respond(Response::from_string(r#"{"success":true,"lead_id":7}"#))
                .expect("response should succeed");
        });

        let store = Store::open_memory()?;
        store.bootstrap()?;
        let clock = ManualClock::at_reference();
        let client = Client::new(&endpoint, Duration::from_secs(2), RetryPolicy::default())?;
        let mut runtime = filled_runtime(&store, &clock, Submitter::Http(client));

        let payload = take_send(runtime.dispatch(movefinder_app::FormCommand::Submit))?;
        let (tx, rx) = mpsc::channel();
        runtime.spawn_submission(payload, tx)?;

        let InternalEvent::SubmissionResolved(outcome) = rx.recv_timeout(Duration::from_secs(5))?
        else {
            panic!("expected a submission event");
        };
        runtime.dispatch(movefinder_app::FormCommand::SubmissionResolved(outcome));
        assert!(matches!(
            runtime.state().phase(),
            Phase::Succeeded { reference: Some(reference), .. } if reference.as_str() == "7"
        ));
        assert_eq!(store.get("movefinder.quote_draft")?, None);
        handle.join().expect("server thread should join");
        Ok(())
    }

    #[test]
    fn demo_submitter_accepts_without_network() -> Result<()> {
        let store = Store::open_memory()?;
        store.bootstrap()?;
        let clock = ManualClock::at_reference();
        let mut runtime = filled_runtime(&store, &clock, Submitter::Demo);

        let payload = take_send(runtime.dispatch(movefinder_app::FormCommand::Submit))?;
        let outcome = runtime.submit(&payload)?;
        runtime.dispatch(movefinder_app::FormCommand::SubmissionResolved(outcome));
        assert!(matches!(
            runtime.state().phase(),
            Phase::Succeeded { reference: Some(reference), .. }
                if reference.as_str().starts_with("demo-")
        ));
        Ok(())
    }
}
