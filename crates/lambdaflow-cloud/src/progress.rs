//! Progress reporting
//!
//! Reconcilers report hierarchical steps ("Reading Lambda function", "Publishing
//! version", ...) and, during teardown, a single status line with per-step
//! outcomes. Reporting is purely observational: no reconciliation decision
//! reads reporter state.
//!
//! A [`Step`] must be finished explicitly with [`Step::done`]; dropping it on
//! any other path (an early `?` return included) aborts it.

use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Outcome of a status line step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Ok,
    Warning,
    Error,
}

/// Backend for a single step
pub trait StepHandle: Send {
    fn update(&mut self, msg: &str);
    fn done(&mut self);
    fn abort(&mut self);
}

/// Backend for a status line
pub trait StatusHandle: Send {
    fn update(&mut self, msg: &str);
    fn step(&mut self, outcome: StepOutcome, label: &str);
    fn close(&mut self);
}

/// Progress reporter
pub trait Reporter: Send + Sync {
    /// Start a new step in the step group
    fn add_step(&self, label: &str) -> Step;

    /// Open a status line
    fn status(&self) -> Status;
}

/// Scoped progress step, aborted on drop unless marked done
pub struct Step {
    handle: Box<dyn StepHandle>,
    finished: bool,
}

impl Step {
    pub fn new(handle: Box<dyn StepHandle>) -> Self {
        Self {
            handle,
            finished: false,
        }
    }

    pub fn update(&mut self, msg: impl AsRef<str>) {
        self.handle.update(msg.as_ref());
    }

    pub fn done(mut self) {
        self.handle.done();
        self.finished = true;
    }

    pub fn abort(mut self) {
        self.handle.abort();
        self.finished = true;
    }
}

impl Drop for Step {
    fn drop(&mut self) {
        if !self.finished {
            self.handle.abort();
        }
    }
}

/// Status line, closed on drop
pub struct Status {
    handle: Box<dyn StatusHandle>,
    closed: bool,
}

impl Status {
    pub fn new(handle: Box<dyn StatusHandle>) -> Self {
        Self {
            handle,
            closed: false,
        }
    }

    pub fn update(&mut self, msg: impl AsRef<str>) {
        self.handle.update(msg.as_ref());
    }

    pub fn step(&mut self, outcome: StepOutcome, label: impl AsRef<str>) {
        self.handle.step(outcome, label.as_ref());
    }

    pub fn close(mut self) {
        self.handle.close();
        self.closed = true;
    }
}

impl Drop for Status {
    fn drop(&mut self) {
        if !self.closed {
            self.handle.close();
        }
    }
}

// ============ Terminal ============

/// Spinner-based reporter for interactive terminals
#[derive(Clone, Default)]
pub struct TerminalReporter {
    multi: MultiProgress,
}

impl TerminalReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn spinner(&self, msg: &str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        pb.set_message(msg.to_string());
        pb
    }
}

impl Reporter for TerminalReporter {
    fn add_step(&self, label: &str) -> Step {
        Step::new(Box::new(TerminalStep {
            label: label.to_string(),
            bar: self.spinner(label),
        }))
    }

    fn status(&self) -> Status {
        Status::new(Box::new(TerminalStatus {
            bar: self.spinner(""),
        }))
    }
}

struct TerminalStep {
    label: String,
    bar: ProgressBar,
}

impl StepHandle for TerminalStep {
    fn update(&mut self, msg: &str) {
        self.bar.set_message(msg.to_string());
    }

    fn done(&mut self) {
        self.bar
            .finish_with_message(format!("{} {}", "✓".green(), self.label));
    }

    fn abort(&mut self) {
        self.bar
            .abandon_with_message(format!("{} {}", "✗".red(), self.label));
    }
}

struct TerminalStatus {
    bar: ProgressBar,
}

impl StatusHandle for TerminalStatus {
    fn update(&mut self, msg: &str) {
        self.bar.set_message(msg.to_string());
    }

    fn step(&mut self, outcome: StepOutcome, label: &str) {
        let mark = match outcome {
            StepOutcome::Ok => "✓".green(),
            StepOutcome::Warning => "⚠".yellow(),
            StepOutcome::Error => "✗".red(),
        };
        self.bar.println(format!("{} {}", mark, label));
    }

    fn close(&mut self) {
        self.bar.finish_and_clear();
    }
}

// ============ Noop ============

/// Reporter that discards everything (non-interactive runs)
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReporter;

struct NoopHandle;

impl StepHandle for NoopHandle {
    fn update(&mut self, _msg: &str) {}
    fn done(&mut self) {}
    fn abort(&mut self) {}
}

impl StatusHandle for NoopHandle {
    fn update(&mut self, _msg: &str) {}
    fn step(&mut self, _outcome: StepOutcome, _label: &str) {}
    fn close(&mut self) {}
}

impl Reporter for NoopReporter {
    fn add_step(&self, _label: &str) -> Step {
        Step::new(Box::new(NoopHandle))
    }

    fn status(&self) -> Status {
        Status::new(Box::new(NoopHandle))
    }
}

// ============ Recording ============

/// Event captured by [`RecordingReporter`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    StepStarted(String),
    StepUpdated(String, String),
    StepDone(String),
    StepAborted(String),
    StatusUpdated(String),
    StatusStep(StepOutcome, String),
    StatusClosed,
}

/// Reporter that keeps every event in memory, for assertions in tests
#[derive(Debug, Clone, Default)]
pub struct RecordingReporter {
    events: Arc<Mutex<Vec<ProgressEvent>>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Labels of steps that ended aborted
    pub fn aborted_steps(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::StepAborted(label) => Some(label),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

struct RecordingHandle {
    label: String,
    reporter: RecordingReporter,
}

impl StepHandle for RecordingHandle {
    fn update(&mut self, msg: &str) {
        self.reporter.push(ProgressEvent::StepUpdated(
            self.label.clone(),
            msg.to_string(),
        ));
    }

    fn done(&mut self) {
        self.reporter
            .push(ProgressEvent::StepDone(self.label.clone()));
    }

    fn abort(&mut self) {
        self.reporter
            .push(ProgressEvent::StepAborted(self.label.clone()));
    }
}

impl StatusHandle for RecordingHandle {
    fn update(&mut self, msg: &str) {
        self.reporter
            .push(ProgressEvent::StatusUpdated(msg.to_string()));
    }

    fn step(&mut self, outcome: StepOutcome, label: &str) {
        self.reporter
            .push(ProgressEvent::StatusStep(outcome, label.to_string()));
    }

    fn close(&mut self) {
        self.reporter.push(ProgressEvent::StatusClosed);
    }
}

impl Reporter for RecordingReporter {
    fn add_step(&self, label: &str) -> Step {
        self.push(ProgressEvent::StepStarted(label.to_string()));
        Step::new(Box::new(RecordingHandle {
            label: label.to_string(),
            reporter: self.clone(),
        }))
    }

    fn status(&self) -> Status {
        Status::new(Box::new(RecordingHandle {
            label: String::new(),
            reporter: self.clone(),
        }))
    }
}
