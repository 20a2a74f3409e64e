//! Per-attempt fetch context and hooks

use std::fmt::Debug;

use crate::error::TransportError;
use crate::options::FetchOptions;
use crate::response::FetchResponse;

/// State of one fetch attempt, handed to every hook
///
/// A retry starts a new context from the previous attempt's target and
/// options.
#[derive(Debug)]
pub struct FetchContext {
    /// Request target; a path until the base URL and query are applied
    pub request: String,
    /// Options merged with the client defaults
    pub options: FetchOptions,
    /// Response, once received
    pub response: Option<FetchResponse>,
    /// Transport failure, if the network call failed
    pub error: Option<TransportError>,
}

impl FetchContext {
    pub(crate) fn new(request: String, options: FetchOptions) -> Self {
        Self {
            request,
            options,
            response: None,
            error: None,
        }
    }
}

/// Callback run at a fixed point of the fetch pipeline
///
/// Hooks may change the request target and options (`on_request`) or inspect
/// the response (`on_response`, `on_response_error`). The pipeline waits for
/// each hook before going on.
///
/// Wrap a `Fn(&mut FetchContext)` closure in [`FnHook`] to use it as a hook.
#[async_trait::async_trait]
pub trait Hook: Debug + Send + Sync {
    /// Run the hook
    async fn call(&self, context: &mut FetchContext);
}

/// Wraps a synchronous closure into a [`Hook`]
pub struct FnHook<F>(pub F);

impl<F> Debug for FnHook<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FnHook")
    }
}

#[async_trait::async_trait]
impl<F> Hook for FnHook<F>
where
    F: Fn(&mut FetchContext) + Send + Sync,
{
    async fn call(&self, context: &mut FetchContext) {
        (self.0)(context)
    }
}
