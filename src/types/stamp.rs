use chrono::{DateTime, Utc};
use std::fmt;

/// File-name-safe timestamp shared by every artifact of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStamp {
    started_at: DateTime<Utc>,
    label: String,
}

impl RunStamp {
    pub const FORMAT: &'static str = "%Y-%m-%dT%H-%M-%S-%3fZ";

    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    pub fn at(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            label: started_at.format(Self::FORMAT).to_string(),
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn as_str(&self) -> &str {
        &self.label
    }
}

impl fmt::Display for RunStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}
