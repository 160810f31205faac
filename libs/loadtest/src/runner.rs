//! Shared-iterations executor.
//!
//! `vus` virtual callers pull iteration numbers from one counter until
//! `iterations` have been handed out, so the total number of requests does
//! not depend on how many callers there are.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use tokio::{
    sync::mpsc::{self, Receiver, Sender},
    task::JoinHandle,
};
use tracing::{error, info, info_span, Instrument};

use crate::{
    response::IntoResponse,
    scenario::{run_iteration, IterationReport},
    summary::Summary,
    LoadTestError, State,
};

pub async fn run(state: Arc<State>) -> Result<Summary, LoadTestError> {
    let config = state.config();
    if config.vus == 0 || config.iterations == 0 {
        return Err(LoadTestError::Config {
            message: "vus and iterations must be positive".to_string(),
        });
    }

    info!(
        task = "run scenario",
        vus = config.vus,
        iterations = config.iterations,
        url = state.url(),
    );

    let (tx, rx) = mpsc::channel(config.vus);
    let counter = Arc::new(AtomicUsize::new(0));

    let handles = (0..config.vus)
        .map(|vu| {
            virtual_caller(state.clone(), vu, counter.clone(), tx.clone())
        })
        .collect::<Vec<_>>();
    drop(tx);

    let summary = collect(rx).await;

    for result in futures::future::join_all(handles).await {
        result.into_response("virtual caller stopped abnormally")?;
    }

    info!(
        task = "finish scenario",
        iterations = summary.iterations,
        passed = summary.passed,
        failed = summary.failed,
    );

    Ok(summary)
}

fn virtual_caller(
    state: Arc<State>,
    vu: usize,
    counter: Arc<AtomicUsize>,
    tx: Sender<IterationReport>,
) -> JoinHandle<()> {
    let caller = async move {
        loop {
            let iteration = counter.fetch_add(1, Ordering::Relaxed);
            if iteration >= state.config().iterations {
                break;
            }

            let report = run_iteration(&state, vu, iteration).await;

            let result = tx.send(report).await;
            let Ok(_) = result else {
                error!(
                    task = "send report",
                    vu,
                    iteration,
                    err = result.unwrap_err().to_string(),
                );
                break;
            };
        }
    };

    tokio::spawn(caller.instrument(info_span!("virtual_caller", vu)))
}

async fn collect(mut rx: Receiver<IterationReport>) -> Summary {
    let mut summary = Summary::default();
    while let Some(report) = rx.recv().await {
        summary.record(report);
    }

    summary
}

#[cfg(test)]
mod test {
    use std::{collections::HashSet, sync::Mutex};

    use tracing::{Event, Subscriber};
    use tracing_subscriber::{
        layer::{Context, SubscriberExt},
        registry::LookupSpan,
        Layer,
    };

    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;
    use crate::{scenario::request::ChannelInput, Client, Config};

    /// Records the span names around every event emitted by the scenario.
    struct EventScopes(Arc<Mutex<Vec<Vec<&'static str>>>>);

    impl<S> Layer<S> for EventScopes
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
            if event.metadata().module_path() != Some("loadtest::scenario") {
                return;
            }

            let scope = ctx
                .event_scope(event)
                .map(|scope| scope.map(|span| span.name()).collect())
                .unwrap_or_default();
            self.0.lock().unwrap().push(scope);
        }
    }

    fn state(base_url: &str, vus: usize, iterations: usize) -> Arc<State> {
        let config = Config {
            vus,
            iterations,
            ..Config::default()
        };

        Arc::new(State::new(Client::new(base_url).unwrap(), config))
    }

    #[tokio::test]
    async fn test_default_scenario_passes() {
        // Arrange
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/channel/upsert-with-lock"))
            .respond_with(ResponseTemplate::new(201).set_body_string("{}"))
            .expect(2)
            .mount(&mock_server)
            .await;

        // Act
        let summary = run(state(&mock_server.uri(), 2, 2)).await.unwrap();

        // Assert
        assert!(summary.is_success(), "{}", summary);
        assert_eq!(summary.iterations, 2);
    }

    async fn run_callers(
        state: Arc<State>,
        vus: usize,
    ) -> Vec<IterationReport> {
        let (tx, mut rx) = mpsc::channel(vus);
        let counter = Arc::new(AtomicUsize::new(0));
        let handles = (0..vus)
            .map(|vu| {
                virtual_caller(state.clone(), vu, counter.clone(), tx.clone())
            })
            .collect::<Vec<_>>();
        drop(tx);

        let mut reports = Vec::new();
        while let Some(report) = rx.recv().await {
            reports.push(report);
        }
        for handle in handles {
            handle.await.unwrap();
        }

        reports
    }

    #[tokio::test]
    async fn test_each_iteration_sends_one_request_with_fresh_code() {
        // Arrange
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201).set_body_string("[]"))
            .expect(25)
            .mount(&mock_server)
            .await;

        // Act
        let reports = run_callers(state(&mock_server.uri(), 3, 25), 3).await;

        // Assert
        let requests = mock_server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 25);

        let mut sent_codes = Vec::new();
        for request in requests.iter() {
            let body =
                serde_json::from_slice::<Vec<ChannelInput>>(&request.body)
                    .unwrap();
            assert_eq!(body.len(), 1);
            assert_eq!(body[0].code.len(), 5);
            assert!(
                body[0].code.chars().all(|c| c.is_ascii_uppercase()),
                "{}",
                body[0].code
            );
            sent_codes.push(body[0].code.clone());
        }

        let mut reported_codes = reports
            .iter()
            .map(|report| report.code.clone())
            .collect::<Vec<_>>();
        sent_codes.sort();
        reported_codes.sort();
        assert_eq!(sent_codes, reported_codes);

        // 26^5 possible codes, one collision among 25 is already unlikely.
        let distinct = sent_codes.iter().collect::<HashSet<_>>();
        assert!(distinct.len() >= 24, "{:?}", sent_codes);

        let iterations = reports
            .iter()
            .map(|report| report.iteration)
            .collect::<HashSet<_>>();
        assert_eq!(iterations, (0..25).collect::<HashSet<_>>());
    }

    #[tokio::test]
    async fn test_iteration_events_are_inside_caller_span() {
        // Arrange
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201).set_body_string("{}"))
            .mount(&mock_server)
            .await;
        let scopes = Arc::new(Mutex::new(Vec::new()));
        let subscriber =
            tracing_subscriber::registry().with(EventScopes(scopes.clone()));
        let _guard = tracing::subscriber::set_default(subscriber);

        // Act
        run(state(&mock_server.uri(), 2, 4)).await.unwrap();

        // Assert
        let scopes = scopes.lock().unwrap();
        assert_eq!(scopes.len(), 4);
        for scope in scopes.iter() {
            assert_eq!(scope, &vec!["virtual_caller"]);
        }
    }

    #[tokio::test]
    async fn test_more_vus_than_iterations() {
        // Arrange
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201).set_body_string("{}"))
            .expect(3)
            .mount(&mock_server)
            .await;

        // Act
        let summary = run(state(&mock_server.uri(), 8, 3)).await.unwrap();

        // Assert
        assert_eq!(summary.iterations, 3);
        assert!(summary.is_success());
    }

    #[tokio::test]
    async fn test_failed_iteration_does_not_stop_others() {
        // Arrange
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201).set_body_string("{}"))
            .mount(&mock_server)
            .await;

        // Act
        let summary = run(state(&mock_server.uri(), 2, 4)).await.unwrap();

        // Assert
        assert_eq!(summary.iterations, 4);
        assert_eq!(summary.passed, 3);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failures.len(), 1);
        assert!(!summary.is_success());
    }

    #[tokio::test]
    async fn test_unreachable_host_fails_every_iteration() {
        // Arrange
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();
        drop(listener);

        // Act
        let summary = run(state(&format!("http://{}", address), 2, 2))
            .await
            .unwrap();

        // Assert
        assert_eq!(summary.iterations, 2);
        assert_eq!(summary.failed, 2);
    }

    #[tokio::test]
    async fn test_zero_iterations_is_config_error() {
        // Act
        let result = run(state("http://localhost", 2, 0)).await;

        // Assert
        assert!(matches!(result, Err(LoadTestError::Config { .. })));
    }
}
