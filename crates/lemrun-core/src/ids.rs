use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LaunchError;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4().to_string())
            }
            pub fn from_str(s: impl Into<String>) -> Self {
                Self(s.into())
            }
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_newtype!(RunId);

impl RunId {
    /// Pick the run id for a submission.
    ///
    /// An explicit id wins, then the scheduler-assigned job id, then a fresh UUID.
    /// Blank values are treated as absent.
    pub fn resolve(explicit: Option<String>, scheduler_job_id: Option<String>) -> Result<Self, LaunchError> {
        let picked = explicit
            .filter(|s| !s.trim().is_empty())
            .or_else(|| scheduler_job_id.filter(|s| !s.trim().is_empty()));
        match picked {
            Some(s) => {
                let id = Self(s.trim().to_string());
                id.validate()?;
                Ok(id)
            }
            None => Ok(Self::new()),
        }
    }

    /// A run id becomes a directory name, so it must be one plain path component.
    pub fn validate(&self) -> Result<(), LaunchError> {
        let s = self.as_str();
        let bad = s.is_empty()
            || s == "."
            || s == ".."
            || s.contains('/')
            || s.contains('\\')
            || s.contains('\0');
        if bad {
            return Err(LaunchError::InvalidRunId(s.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_beats_scheduler() {
        let id = RunId::resolve(Some("manual".into()), Some("4242".into())).unwrap();
        assert_eq!(id.as_str(), "manual");
    }

    #[test]
    fn scheduler_id_used_when_no_explicit() {
        let id = RunId::resolve(None, Some(" 4242\n".into())).unwrap();
        assert_eq!(id.as_str(), "4242");
    }

    #[test]
    fn blank_values_fall_through_to_generated() {
        let a = RunId::resolve(Some("  ".into()), Some(String::new())).unwrap();
        let b = RunId::resolve(None, None).unwrap();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(a.as_str()).is_ok());
    }

    #[test]
    fn rejects_path_like_ids() {
        for bad in ["..", ".", "a/b", "a\\b"] {
            assert!(matches!(
                RunId::resolve(Some(bad.into()), None),
                Err(LaunchError::InvalidRunId(_))
            ));
        }
    }
}
