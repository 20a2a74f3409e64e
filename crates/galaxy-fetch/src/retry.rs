//! Retry and timeout policy

use std::future::Future;
use std::time::Duration;

use reqwest::Method;
use tokio_util::sync::CancellationToken;

use crate::context::FetchContext;
use crate::error::TransportError;
use crate::options::Body;

/// Statuses retried when the caller gives no list of their own
pub const DEFAULT_RETRY_STATUS_CODES: [u16; 8] = [408, 409, 425, 429, 500, 502, 503, 504];

/// Retry setting of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retry {
    /// Never retry
    Disabled,
    /// Retry up to this many times
    Count(u32),
}

impl From<u32> for Retry {
    fn from(count: u32) -> Self {
        Retry::Count(count)
    }
}

impl From<bool> for Retry {
    fn from(enabled: bool) -> Self {
        if enabled {
            Retry::Count(1)
        } else {
            Retry::Disabled
        }
    }
}

impl Retry {
    /// Retries left
    pub fn remaining(self) -> u32 {
        match self {
            Retry::Disabled => 0,
            Retry::Count(count) => count,
        }
    }
}

/// Methods that carry a payload and are not assumed idempotent
pub fn is_payload_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// Retries for `method` when the caller set none
pub fn default_retries(method: &Method) -> Retry {
    if is_payload_method(method) {
        Retry::Count(0)
    } else {
        Retry::Count(1)
    }
}

/// Outcome of a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Run another attempt with `remaining` retries after `delay`
    Retry {
        /// Retries left for the next attempt
        remaining: u32,
        /// Wait before the next attempt
        delay: Option<Duration>,
    },
    /// Give up and report the failure
    GiveUp,
}

/// Decide whether the failed attempt in `context` is retried
///
/// Cancellation by the caller, requests that could not be built and stream
/// bodies that were already sent are never retried. When no response was received the status counts as 500.
pub fn decide(context: &FetchContext) -> RetryDecision {
    let options = &context.options;
    let method = options.method.clone().unwrap_or_default();
    let retries = options
        .retry
        .unwrap_or_else(|| default_retries(&method))
        .remaining();
    if retries == 0 {
        return RetryDecision::GiveUp;
    }

    if matches!(
        context.error,
        Some(TransportError::Aborted) | Some(TransportError::Build(_))
    ) {
        return RetryDecision::GiveUp;
    }

    if matches!(&options.body, Some(Body::Stream(stream)) if stream.is_consumed()) {
        return RetryDecision::GiveUp;
    }

    let status = context
        .response
        .as_ref()
        .map(|response| response.status().as_u16())
        .unwrap_or(500);
    let retryable = match &options.retry_status_codes {
        Some(codes) => codes.contains(&status),
        None => DEFAULT_RETRY_STATUS_CODES.contains(&status),
    };
    if !retryable {
        return RetryDecision::GiveUp;
    }

    RetryDecision::Retry {
        remaining: retries - 1,
        delay: options.retry_delay.filter(|delay| !delay.is_zero()),
    }
}

/// Wait `delay` before the next attempt
pub async fn backoff(delay: Option<Duration>) {
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
}

/// Run one attempt under the caller's signal or the attempt timeout
///
/// The timeout only applies without a signal. A cancelled signal yields
/// [`TransportError::Aborted`], an elapsed timeout [`TransportError::Timeout`].
pub async fn with_deadline<F, T>(
    attempt: F,
    signal: Option<&CancellationToken>,
    timeout: Option<Duration>,
) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    match (signal, timeout) {
        (Some(signal), _) => {
            tokio::select! {
                biased;
                _ = signal.cancelled() => Err(TransportError::Aborted),
                result = attempt => result,
            }
        }
        (None, Some(timeout)) => tokio::time::timeout(timeout, attempt)
            .await
            .map_err(|_| TransportError::Timeout(timeout))?,
        (None, None) => attempt.await,
    }
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderMap;
    use reqwest::StatusCode;

    use super::*;
    use futures::StreamExt;

    use crate::options::{FetchOptions, StreamBody};
    use crate::response::{FetchResponse, ResponseData};

    fn context_with_status(options: FetchOptions, status: u16) -> FetchContext {
        let mut context = FetchContext::new("/api".to_string(), options);
        context.response = Some(FetchResponse::new(
            StatusCode::from_u16(status).expect("valid status"),
            HeaderMap::new(),
            "/api".to_string(),
            ResponseData::None,
        ));
        context
    }

    fn context_with_error(options: FetchOptions, error: TransportError) -> FetchContext {
        let mut context = FetchContext::new("/api".to_string(), options);
        context.error = Some(error);
        context
    }

    #[test]
    fn test_default_retries_follow_method() {
        assert_eq!(default_retries(&Method::GET), Retry::Count(1));
        assert_eq!(default_retries(&Method::HEAD), Retry::Count(1));
        assert_eq!(default_retries(&Method::POST), Retry::Count(0));
        assert_eq!(default_retries(&Method::DELETE), Retry::Count(0));
    }

    #[test]
    fn test_get_503_is_retried_once_by_default() {
        let context = context_with_status(FetchOptions::new(), 503);
        assert_eq!(
            decide(&context),
            RetryDecision::Retry {
                remaining: 0,
                delay: None
            }
        );
    }

    #[test]
    fn test_post_is_not_retried_by_default() {
        let context = context_with_status(FetchOptions::new().method("POST"), 503);
        assert_eq!(decide(&context), RetryDecision::GiveUp);
    }

    #[test]
    fn test_explicit_retry_overrides_default() {
        let options = FetchOptions::new()
            .method("POST")
            .retry(2)
            .retry_delay(Duration::from_millis(100));
        let context = context_with_status(options, 502);
        assert_eq!(
            decide(&context),
            RetryDecision::Retry {
                remaining: 1,
                delay: Some(Duration::from_millis(100))
            }
        );

        let context = context_with_status(FetchOptions::new().retry(false), 503);
        assert_eq!(decide(&context), RetryDecision::GiveUp);
    }

    #[test]
    fn test_non_retryable_status() {
        let context = context_with_status(FetchOptions::new().retry(3), 404);
        assert_eq!(decide(&context), RetryDecision::GiveUp);
    }

    #[test]
    fn test_custom_status_list() {
        let options = FetchOptions::new().retry(1).retry_status_codes(vec![404]);
        assert!(matches!(
            decide(&context_with_status(options.clone(), 404)),
            RetryDecision::Retry { .. }
        ));
        assert_eq!(
            decide(&context_with_status(options, 503)),
            RetryDecision::GiveUp
        );
    }

    #[test]
    fn test_transport_errors_count_as_500() {
        let context = context_with_error(
            FetchOptions::new(),
            TransportError::Connection("refused".to_string()),
        );
        assert!(matches!(decide(&context), RetryDecision::Retry { .. }));

        let options = FetchOptions::new().retry(1).retry_status_codes(vec![503]);
        let context = context_with_error(options, TransportError::Timeout(Duration::ZERO));
        assert_eq!(decide(&context), RetryDecision::GiveUp);
    }

    #[test]
    fn test_abort_and_build_errors_are_final() {
        let options = FetchOptions::new().retry(5);
        let context = context_with_error(options.clone(), TransportError::Aborted);
        assert_eq!(decide(&context), RetryDecision::GiveUp);
        let context = context_with_error(options, TransportError::Build("bad".to_string()));
        assert_eq!(decide(&context), RetryDecision::GiveUp);
    }

    #[test]
    fn test_consumed_stream_body_is_final() {
        let stream = StreamBody::new(futures::stream::empty().boxed());
        let options = FetchOptions::new()
            .method("PUT")
            .retry(2)
            .body(Body::Stream(stream.clone()));

        let context = context_with_status(options.clone(), 503);
        assert_eq!(
            decide(&context),
            RetryDecision::Retry {
                remaining: 1,
                delay: None
            }
        );

        assert!(stream.take().is_some());
        let context = context_with_status(options, 503);
        assert_eq!(decide(&context), RetryDecision::GiveUp);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_times_out() {
        let result: Result<(), _> = with_deadline(
            futures::future::pending(),
            None,
            Some(Duration::from_millis(50)),
        )
        .await;
        assert!(matches!(result, Err(TransportError::Timeout(d)) if d == Duration::from_millis(50)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_signal_disables_timeout() {
        let signal = CancellationToken::new();
        let attempt = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, TransportError>(7)
        };
        let result = with_deadline(attempt, Some(&signal), Some(Duration::from_millis(50))).await;
        assert_eq!(result.expect("signal replaces the timeout"), 7);
    }

    #[tokio::test]
    async fn test_cancelled_signal_aborts() {
        let signal = CancellationToken::new();
        signal.cancel();
        let result: Result<(), _> =
            with_deadline(futures::future::pending(), Some(&signal), None).await;
        assert!(matches!(result, Err(TransportError::Aborted)));
    }
}
