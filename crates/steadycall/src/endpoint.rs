//! Call descriptors.

use std::fmt;
use std::sync::Arc;
use steadycall_core::CorrelationId;

/// HTTP-style method of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One remote operation, described once where it is declared.
///
/// Whether an operation may be re-sent after the backend possibly saw it is
/// fixed here: `GET` endpoints are retryable, every other method only when
/// marked with [`retryable`](Endpoint::retryable).
///
/// ```rust
/// use steadycall::Endpoint;
///
/// let list = Endpoint::get("/orders");
/// let create = Endpoint::post("/orders");
/// let upsert = Endpoint::put("/orders/{id}").retryable();
///
/// assert!(list.is_retryable());
/// assert!(!create.is_retryable());
/// assert!(upsert.is_retryable());
/// assert_eq!(upsert.method_id(), "PUT /orders/{id}");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    method: Method,
    path: Arc<str>,
    marked_retryable: bool,
}

impl Endpoint {
    pub fn new(method: Method, path: impl AsRef<str>) -> Self {
        Self {
            method,
            path: Arc::from(path.as_ref()),
            marked_retryable: false,
        }
    }

    pub fn get(path: impl AsRef<str>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl AsRef<str>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn put(path: impl AsRef<str>) -> Self {
        Self::new(Method::Put, path)
    }

    pub fn patch(path: impl AsRef<str>) -> Self {
        Self::new(Method::Patch, path)
    }

    pub fn delete(path: impl AsRef<str>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Marks the endpoint safe to re-send after a response-phase failure.
    pub fn retryable(mut self) -> Self {
        self.marked_retryable = true;
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// True for `GET` and for endpoints marked retryable.
    pub fn is_retryable(&self) -> bool {
        self.marked_retryable || self.method == Method::Get
    }

    /// Identifier used to scope circuit breakers, e.g. `GET /orders`.
    pub fn method_id(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// A logical call against a service.
#[derive(Debug, Clone)]
pub struct OutboundRequest<B> {
    service: String,
    endpoint: Endpoint,
    body: B,
    correlation_id: Option<CorrelationId>,
    version: Option<String>,
}

impl<B> OutboundRequest<B> {
    pub fn new(service: impl Into<String>, endpoint: Endpoint, body: B) -> Self {
        Self {
            service: service.into(),
            endpoint,
            body,
            correlation_id: None,
            version: None,
        }
    }

    /// Ties the call to an existing correlation id.
    ///
    /// Calls sharing an id share selection state, so their attempts spread
    /// over the instances together. Without one, each call generates a
    /// fresh id.
    pub fn with_correlation_id(mut self, id: impl Into<CorrelationId>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Prefers instances whose `version` metadata equals `version`.
    ///
    /// When no instance carries it, every instance stays eligible. An empty
    /// version is the same as none.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        let version = version.into();
        self.version = (!version.is_empty()).then_some(version);
        self
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn body(&self) -> &B {
        &self.body
    }

    pub fn correlation_id(&self) -> Option<&CorrelationId> {
        self.correlation_id.as_ref()
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}

impl OutboundRequest<()> {
    /// A request without a body.
    pub fn empty(service: impl Into<String>, endpoint: Endpoint) -> Self {
        Self::new(service, endpoint, ())
    }
}
