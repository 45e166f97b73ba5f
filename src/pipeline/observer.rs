//! Progress reporting at named pipeline checkpoints.
//!
//! Observers only display progress; a pipeline behaves identically with
//! [`NoopObserver`].

use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// A named checkpoint in a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStep {
    Extraction,
    FormQuery,
    TableQuery,
    Query,
    Retrieval { attempt: u32 },
    Refining { attempt: u32 },
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Extraction => write!(f, "Extracting document content..."),
            Self::FormQuery => write!(f, "Retrieving form fields..."),
            Self::TableQuery => write!(f, "Retrieving table fields..."),
            Self::Query => write!(f, "Retrieving answer..."),
            Self::Retrieval { attempt } => write!(f, "Retrieving answer (attempt {attempt})..."),
            Self::Refining { attempt } => write!(f, "Refining answer (attempt {attempt})..."),
        }
    }
}

pub trait PipelineObserver {
    fn step_started(&self, step: PipelineStep);
    fn step_finished(&self, step: PipelineStep);
}

/// Observer that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {
    fn step_started(&self, _step: PipelineStep) {}
    fn step_finished(&self, _step: PipelineStep) {}
}

/// Terminal spinner shown while a step is in flight.
pub struct SpinnerObserver {
    active: Mutex<Option<ProgressBar>>,
}

impl SpinnerObserver {
    pub fn new() -> Self {
        Self {
            active: Mutex::new(None),
        }
    }
}

impl Default for SpinnerObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineObserver for SpinnerObserver {
    fn step_started(&self, step: PipelineStep) {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed}]") {
            spinner.set_style(style);
        }
        spinner.set_message(step.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));

        if let Ok(mut active) = self.active.lock() {
            if let Some(previous) = active.replace(spinner) {
                previous.finish_and_clear();
            }
        }
    }

    fn step_finished(&self, step: PipelineStep) {
        if let Ok(mut active) = self.active.lock() {
            if let Some(spinner) = active.take() {
                spinner.finish_with_message(format!("{step} done"));
            }
        }
    }
}

/// Pick the observer for a run.
pub fn observer_for(show_progress: bool) -> Box<dyn PipelineObserver + Send + Sync> {
    if show_progress {
        Box::new(SpinnerObserver::new())
    } else {
        Box::new(NoopObserver)
    }
}

/// Observer that records every event, for tests.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingObserver {
    pub events: Mutex<Vec<(bool, PipelineStep)>>,
}

#[cfg(test)]
impl RecordingObserver {
    pub fn started(&self) -> Vec<PipelineStep> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(started, _)| *started)
            .map(|(_, step)| *step)
            .collect()
    }
}

#[cfg(test)]
impl PipelineObserver for RecordingObserver {
    fn step_started(&self, step: PipelineStep) {
        self.events.lock().unwrap().push((true, step));
    }

    fn step_finished(&self, step: PipelineStep) {
        self.events.lock().unwrap().push((false, step));
    }
}
