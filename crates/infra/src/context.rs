//! Per-request context handed to every storage call.

use std::collections::BTreeMap;

use uuid::Uuid;

use acqorders_core::{DomainError, TenantId};

/// Header carrying the storage gateway base address.
pub const OKAPI_URL_HEADER: &str = "x-okapi-url";
/// Header carrying the tenant identity.
pub const OKAPI_TENANT_HEADER: &str = "x-okapi-tenant";
/// Header carrying the caller's token.
pub const OKAPI_TOKEN_HEADER: &str = "x-okapi-token";

/// Incoming headers outside the `x-okapi-*` family that are still forwarded.
pub const FORWARDED_HEADERS: &[&str] = &["authorization", "accept-language"];

fn is_forwarded(name: &str) -> bool {
    name.starts_with("x-okapi-") || FORWARDED_HEADERS.contains(&name)
}

/// Request context for one incoming request.
///
/// The orchestrator does not interpret these values; they are forwarded
/// unchanged to every storage call made on behalf of the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    request_id: Uuid,
    base_url: String,
    tenant_id: Option<TenantId>,
    lang: Option<String>,
    headers: BTreeMap<String, String>,
}

impl RequestContext {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::now_v7(),
            base_url: base_url.into(),
            tenant_id: None,
            lang: None,
            headers: BTreeMap::new(),
        }
    }

    /// Build a context from incoming request headers (names compared
    /// case-insensitively). Only `x-okapi-*` headers and [`FORWARDED_HEADERS`]
    /// are propagated; the base URL defaults to an empty string when absent.
    pub fn from_headers<'a, I>(headers: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut ctx = Self::new(String::new());
        for (name, value) in headers {
            let name = name.to_ascii_lowercase();
            match name.as_str() {
                OKAPI_URL_HEADER => ctx.base_url = value.to_string(),
                OKAPI_TENANT_HEADER => ctx.tenant_id = Some(TenantId::parse(value)?),
                _ => {}
            }
            if is_forwarded(&name) {
                ctx.headers.insert(name, value.to_string());
            }
        }
        Ok(ctx)
    }

    pub fn with_tenant(mut self, tenant_id: TenantId) -> Self {
        self.headers
            .insert(OKAPI_TENANT_HEADER.to_string(), tenant_id.to_string());
        self.tenant_id = Some(tenant_id);
        self
    }

    pub fn with_token(self, token: impl Into<String>) -> Self {
        self.with_header(OKAPI_TOKEN_HEADER, token)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn tenant_id(&self) -> Option<&TenantId> {
        self.tenant_id.as_ref()
    }

    pub fn lang(&self) -> Option<&str> {
        self.lang.as_deref()
    }

    /// Headers to propagate (lowercase names).
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}
