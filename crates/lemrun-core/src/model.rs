use serde::{Deserialize, Serialize};

/// Scheduler mail notification triggers.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NotifyEvent {
    Begin,
    End,
    Fail,
}

impl NotifyEvent {
    pub fn as_directive(&self) -> &'static str {
        match self {
            NotifyEvent::Begin => "BEGIN",
            NotifyEvent::End => "END",
            NotifyEvent::Fail => "FAIL",
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VcsType {
    Git,
    Jj,
}

/// What to do when a tracked repository's revision cannot be resolved.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProvenancePolicy {
    /// Stop the run before anything is staged or launched.
    Abort,
    /// Log, note it in the run record, and carry on without that revision file.
    #[default]
    Warn,
}
