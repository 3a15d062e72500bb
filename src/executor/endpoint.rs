use url::Url;

use crate::errors::GatewayError;

/// Validated REST origin: `http`/`https`, a host, optional port, nothing else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseOrigin(Url);

impl BaseOrigin {
    pub fn parse(raw: &str) -> Result<Self, GatewayError> {
        let url = Url::parse(raw.trim())
            .map_err(|err| GatewayError::Configuration(format!("base origin is not a valid URL: {err}")))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(GatewayError::Configuration(format!(
                "base origin scheme '{}' is not supported, expected http or https",
                url.scheme()
            )));
        }
        if !url.host_str().is_some_and(|host| !host.is_empty()) {
            return Err(GatewayError::Configuration("base origin has no host".to_owned()));
        }
        if !url.username().is_empty() || url.password().is_some() {
            return Err(GatewayError::Configuration("base origin must not carry user info".to_owned()));
        }
        if url.path() != "/" {
            return Err(GatewayError::Configuration("base origin must not have a path".to_owned()));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(GatewayError::Configuration(
                "base origin must not have a query or fragment".to_owned(),
            ));
        }
        Ok(Self(url))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Join a root-relative endpoint path onto the origin.
    ///
    /// Absolute URLs, scheme-relative `//host` paths and anything else that would
    /// leave the origin are configuration errors. Query values are re-encoded,
    /// so `/p?slug=a/b` becomes `/p?slug=a%2Fb`.
    pub fn resolve(&self, endpoint_path: &str) -> Result<Url, GatewayError> {
        if !endpoint_path.starts_with('/') {
            return Err(GatewayError::Configuration(
                "endpoint path must be root-relative and start with '/'".to_owned(),
            ));
        }
        // `\` counts as `/` for http(s) URLs
        if endpoint_path.starts_with("//") || endpoint_path.starts_with("/\\") {
            return Err(GatewayError::Configuration(
                "endpoint path must not start with '//'".to_owned(),
            ));
        }

        let mut url = self
            .0
            .join(endpoint_path)
            .map_err(|err| GatewayError::Configuration(format!("endpoint path is not valid: {err}")))?;

        if url.scheme() != self.0.scheme()
            || url.host_str() != self.0.host_str()
            || url.port_or_known_default() != self.0.port_or_known_default()
        {
            return Err(GatewayError::Configuration(
                "endpoint path resolves outside the base origin".to_owned(),
            ));
        }

        url.set_fragment(None);
        reencode_query(&mut url);
        Ok(url)
    }
}

fn reencode_query(url: &mut Url) {
    if url.query().is_none() {
        return;
    }
    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    if pairs.is_empty() {
        url.set_query(None);
        return;
    }
    url.query_pairs_mut().clear().extend_pairs(pairs);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> BaseOrigin {
        BaseOrigin::parse("https://api.example.test").unwrap()
    }

    #[test]
    fn resolves_and_encodes_query_values() {
        let url = origin().resolve("/v1/pages?slug=a/b").unwrap();
        assert_eq!(url.as_str(), "https://api.example.test/v1/pages?slug=a%2Fb");
    }

    #[test]
    fn keeps_path_and_query_order() {
        let url = origin().resolve("/v1/search?q=rust lang&limit=10&q=tokio").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.test/v1/search?q=rust+lang&limit=10&q=tokio"
        );
    }

    #[test]
    fn rejects_scheme_relative_path() {
        let err = origin().resolve("//evil.test/p").unwrap_err();
        assert!(matches!(err, GatewayError::Configuration(_)));
    }

    #[test]
    fn rejects_backslash_host_escape() {
        let err = origin().resolve("/\\evil.test/p").unwrap_err();
        assert!(matches!(err, GatewayError::Configuration(_)));
    }

    #[test]
    fn rejects_absolute_url() {
        let err = origin().resolve("https://evil.test/p").unwrap_err();
        assert!(matches!(err, GatewayError::Configuration(_)));
    }

    #[test]
    fn rejects_relative_path() {
        let err = origin().resolve("v1/pages").unwrap_err();
        assert!(matches!(err, GatewayError::Configuration(_)));
    }

    #[test]
    fn keeps_explicit_port() {
        let origin = BaseOrigin::parse("http://127.0.0.1:8080/").unwrap();
        let url = origin.resolve("/health").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/health");
    }

    #[test]
    fn origin_rejects_path_query_and_scheme() {
        for raw in [
            "https://api.example.test/v1",
            "https://api.example.test?x=1",
            "ftp://api.example.test",
            "https://user:pw@api.example.test",
            "not a url",
        ] {
            let err = BaseOrigin::parse(raw).unwrap_err();
            assert!(matches!(err, GatewayError::Configuration(_)), "{raw}");
        }
    }
}
