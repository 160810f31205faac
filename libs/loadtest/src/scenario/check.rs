use std::fmt;

use reqwest::StatusCode;
use serde::de::IgnoredAny;

use crate::HttpResponse;

pub const STATUS_CHECK: &str = "response status";
pub const JSON_BODY_CHECK: &str = "valid json body";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckFailure {
    Transport(String),
    UnexpectedStatus { expected: u16, actual: u16 },
    InvalidJson(String),
}

impl fmt::Display for CheckFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckFailure::Transport(message) => {
                write!(f, "request failed: {}", message)
            }
            CheckFailure::UnexpectedStatus { expected, actual } => {
                write!(f, "expected status {}, got {}", expected, actual)
            }
            CheckFailure::InvalidJson(message) => {
                write!(f, "body is not valid json: {}", message)
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed(CheckFailure),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Check {
    pub name: &'static str,
    pub outcome: Outcome,
}

impl Check {
    pub fn passed(name: &'static str) -> Self {
        Self {
            name,
            outcome: Outcome::Passed,
        }
    }

    pub fn failed(name: &'static str, failure: CheckFailure) -> Self {
        Self {
            name,
            outcome: Outcome::Failed(failure),
        }
    }

    pub fn is_passed(&self) -> bool {
        self.outcome == Outcome::Passed
    }
}

pub fn check_status(response: &HttpResponse, expected: StatusCode) -> Check {
    if response.status == expected {
        return Check::passed(STATUS_CHECK);
    }

    Check::failed(
        STATUS_CHECK,
        CheckFailure::UnexpectedStatus {
            expected: expected.as_u16(),
            actual: response.status.as_u16(),
        },
    )
}

/// Only syntax is checked, the shape of the document is not.
pub fn check_json_body(response: &HttpResponse) -> Check {
    match serde_json::from_str::<IgnoredAny>(&response.body) {
        Ok(_) => Check::passed(JSON_BODY_CHECK),
        Err(e) => Check::failed(
            JSON_BODY_CHECK,
            CheckFailure::InvalidJson(e.to_string()),
        ),
    }
}
