//! Progress reporting across the pipeline thread boundary.
//!
//! The pipeline reports through the [`Reporter`] trait. When it runs on its
//! own thread, [`ChannelReporter`] turns each callback into an
//! [`InstallEvent`] and sends it to the caller, which renders events on its
//! own thread.

use crate::pipeline::PipelineOutcome;
use serde::Serialize;
use std::sync::mpsc::Sender;

/// Receives progress, title, and error callbacks from the pipeline.
pub trait Reporter {
    /// Overall completion, 0 to 100.
    fn progress(&self, percent: u8);
    /// A short description of the current activity.
    fn title(&self, text: &str);
    /// A fatal error. Reported at most once per run.
    fn error(&self, message: &str);
}

/// One message from the pipeline thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum InstallEvent {
    /// Overall completion changed.
    Progress {
        /// Completion percentage.
        percent: u8,
    },
    /// The activity title changed.
    Title {
        /// New title.
        text: String,
    },
    /// The run failed.
    Error {
        /// What failed and why.
        message: String,
    },
    /// The run ended without a fatal error.
    Finished {
        /// How it ended.
        outcome: PipelineOutcome,
    },
}

/// Forwards callbacks over an mpsc channel.
///
/// Send failures mean the receiving side has gone away; they are ignored so
/// the pipeline can still run to completion.
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    sender: Sender<InstallEvent>,
}

impl ChannelReporter {
    /// Wraps the sending half of an event channel.
    #[must_use]
    pub const fn new(sender: Sender<InstallEvent>) -> Self {
        Self { sender }
    }

    /// Sends `event`, ignoring a disconnected receiver.
    pub fn send(&self, event: InstallEvent) {
        if self.sender.send(event).is_err() {
            log::debug!("event receiver dropped");
        }
    }
}

impl Reporter for ChannelReporter {
    fn progress(&self, percent: u8) {
        self.send(InstallEvent::Progress { percent });
    }

    fn title(&self, text: &str) {
        self.send(InstallEvent::Title {
            text: text.to_owned(),
        });
    }

    fn error(&self, message: &str) {
        self.send(InstallEvent::Error {
            message: message.to_owned(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn callbacks_arrive_in_order() {
        let (sender, receiver) = mpsc::channel();
        let reporter = ChannelReporter::new(sender);

        reporter.title("Fetching tags...");
        reporter.progress(40);
        reporter.error("git fetch failed");
        drop(reporter);

        let events: Vec<_> = receiver.iter().collect();
        assert_eq!(
            events,
            vec![
                InstallEvent::Title {
                    text: "Fetching tags...".to_owned()
                },
                InstallEvent::Progress { percent: 40 },
                InstallEvent::Error {
                    message: "git fetch failed".to_owned()
                },
            ]
        );
    }

    #[test]
    fn disconnected_receiver_is_tolerated() {
        let (sender, receiver) = mpsc::channel();
        drop(receiver);
        ChannelReporter::new(sender).progress(10);
    }

    #[test]
    fn events_serialise_with_a_tag() {
        let json = serde_json::to_string(&InstallEvent::Progress { percent: 70 })
            .expect("event should serialise");
        assert_eq!(json, r#"{"event":"progress","percent":70}"#);
    }
}
