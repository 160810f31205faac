use reqwest::StatusCode;
use tracing::{error, info, warn};

use self::{
    check::{check_json_body, check_status, Check, CheckFailure, Outcome},
    request::ChannelInput,
};
use crate::{code::make_code, State};

pub mod check;
pub mod request;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IterationReport {
    pub vu: usize,
    pub iteration: usize,
    pub code: String,
    pub checks: Vec<Check>,
}

impl IterationReport {
    pub fn is_passed(&self) -> bool {
        !self.checks.is_empty() && self.checks.iter().all(Check::is_passed)
    }
}

/// One upsert round trip: a single POST with a fresh code, then the status
/// and json body checks. Never retries and never returns an error; failures
/// end up in the report.
pub async fn run_iteration(
    state: &State,
    vu: usize,
    iteration: usize,
) -> IterationReport {
    let code = make_code(state.config.code_length);
    let payload = vec![ChannelInput { code: code.clone() }];

    let result = state.client.post(&state.config.path, &payload).await;

    let checks = match result {
        Ok(response) => {
            info!(
                task = "upsert",
                vu,
                iteration,
                code = code.as_str(),
                status = response.status.as_u16(),
                body = response.body.as_str(),
            );

            vec![
                check_status(&response, StatusCode::CREATED),
                check_json_body(&response),
            ]
        }
        Err(e) => {
            error!(
                task = "upsert",
                vu,
                iteration,
                code = code.as_str(),
                err = e.to_string(),
            );

            vec![Check::failed(
                check::STATUS_CHECK,
                CheckFailure::Transport(e.to_string()),
            )]
        }
    };

    for check in checks.iter() {
        if let Outcome::Failed(failure) = &check.outcome {
            warn!(
                task = "upsert",
                vu,
                iteration,
                check = check.name,
                failure = failure.to_string(),
            );
        }
    }

    IterationReport {
        vu,
        iteration,
        code,
        checks,
    }
}
