use common_http_errors::{Failure, GateResult};
use url::Url;

/// Origin list entry that admits every origin.
pub const ALLOW_ANY_ORIGIN: &str = "*";

/// Which browser origins may call the service.
///
/// Typically built once at startup and shared read-only afterwards; callers
/// that mutate it later must synchronize with request handling themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorsPolicy {
    origins: Vec<String>,
    root_domains: Vec<String>,
    methods: Option<Vec<String>>,
    headers: Option<Vec<String>>,
}

impl CorsPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_any_origin() -> Self {
        Self::new().with_origins([ALLOW_ANY_ORIGIN])
    }

    pub fn with_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.origins.extend(origins.into_iter().map(Into::into));
        self
    }

    /// Root domains accept every origin whose host ends with them, e.g.
    /// `example.com` admits `https://app.example.com`.
    pub fn with_root_domains<I, S>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.root_domains.extend(roots.into_iter().map(Into::into));
        self
    }

    pub fn with_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.methods
            .get_or_insert_with(Vec::new)
            .extend(methods.into_iter().map(Into::into));
        self
    }

    pub fn with_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.headers
            .get_or_insert_with(Vec::new)
            .extend(headers.into_iter().map(Into::into));
        self
    }

    pub fn add_origin(&mut self, origin: impl Into<String>) {
        self.origins.push(origin.into());
    }

    pub fn add_method(&mut self, method: impl Into<String>) {
        self.methods.get_or_insert_with(Vec::new).push(method.into());
    }

    pub fn add_header(&mut self, header: impl Into<String>) {
        self.headers.get_or_insert_with(Vec::new).push(header.into());
    }

    pub fn origins(&self) -> &[String] {
        &self.origins
    }

    pub fn root_domains(&self) -> &[String] {
        &self.root_domains
    }

    pub fn methods(&self) -> Option<&[String]> {
        self.methods.as_deref()
    }

    /// Accepted for configuration compatibility; request headers are echoed
    /// rather than filtered against this list.
    pub fn headers(&self) -> Option<&[String]> {
        self.headers.as_deref()
    }

    pub fn check_valid_origin(&self, origin: &str) -> GateResult<()> {
        let listed = self
            .origins
            .iter()
            .any(|allowed| allowed == ALLOW_ANY_ORIGIN || allowed == origin);
        if listed || self.is_from_root_domain(origin)? {
            return Ok(());
        }
        Err(Failure::invalid_origin(format!(
            "Origin {origin} is not authorized to use the service"
        )))
    }

    fn is_from_root_domain(&self, origin: &str) -> GateResult<bool> {
        let url = Url::parse(origin)
            .map_err(|err| Failure::bad_origin_syntax(format!("Bad HTTP Origin header: {err}")))?;
        let host = url
            .host_str()
            .ok_or_else(|| Failure::bad_origin_syntax("Bad HTTP Origin header: missing host"))?;
        Ok(self
            .root_domains
            .iter()
            .any(|root| host.ends_with(root.as_str())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common_http_errors::FailureKind;

    fn root_policy() -> CorsPolicy {
        CorsPolicy::new().with_root_domains(["kevinguanchedarias.com"])
    }

    #[test]
    fn root_domain_admits_subdomains() {
        let policy = root_policy();
        assert!(policy
            .check_valid_origin("https://app.kevinguanchedarias.com")
            .is_ok());
        assert!(policy
            .check_valid_origin("http://kevinguanchedarias.com:8080")
            .is_ok());
    }

    #[test]
    fn foreign_origin_is_rejected() {
        let err = root_policy()
            .check_valid_origin("https://evil.example")
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::InvalidOrigin);
        assert_eq!(
            err.message(),
            "Origin https://evil.example is not authorized to use the service"
        );
    }

    #[test]
    fn root_match_uses_host_not_full_origin() {
        // The root appears in the path, never in the host.
        let err = root_policy()
            .check_valid_origin("https://evil.example/kevinguanchedarias.com")
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::InvalidOrigin);
    }

    #[test]
    fn exact_origin_is_admitted() {
        let policy = CorsPolicy::new().with_origins(["http://localhost:3000"]);
        assert!(policy.check_valid_origin("http://localhost:3000").is_ok());
        assert!(policy.check_valid_origin("http://localhost:3001").is_err());
    }

    #[test]
    fn wildcard_admits_anything() {
        let policy = CorsPolicy::allow_any_origin();
        for origin in ["https://evil.example", "http://localhost:5173"] {
            assert!(policy.check_valid_origin(origin).is_ok(), "{origin}");
        }
    }

    #[test]
    fn unparseable_origin_is_bad_syntax() {
        let err = root_policy().check_valid_origin("not a url").unwrap_err();
        assert_eq!(err.kind(), FailureKind::BadOriginSyntax);
    }

    #[test]
    fn origin_without_host_is_bad_syntax() {
        let err = root_policy()
            .check_valid_origin("mailto:someone@kevinguanchedarias.com")
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::BadOriginSyntax);
    }

    #[test]
    fn add_operations_create_lists_on_demand() {
        let mut policy = CorsPolicy::new();
        assert!(policy.methods().is_none());
        assert!(policy.headers().is_none());

        policy.add_origin("https://a.example");
        policy.add_method("GET");
        policy.add_method("POST");
        policy.add_header("X-Custom");

        assert_eq!(policy.origins(), ["https://a.example".to_string()]);
        assert_eq!(policy.methods().unwrap(), ["GET".to_string(), "POST".to_string()]);
        assert_eq!(policy.headers().unwrap(), ["X-Custom".to_string()]);
    }
}
