//! Conversions from external infrastructure errors into domain errors.

use reqwest::Error as HttpError;
use senserest_domain::RestError;
use url::ParseError as UrlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub RestError);

impl From<InfraError> for RestError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<RestError> for InfraError {
    fn from(value: RestError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoRestError {
    fn into_rest(self) -> RestError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → RestError */
/* -------------------------------------------------------------------------- */

impl IntoRestError for HttpError {
    fn into_rest(self) -> RestError {
        if self.is_timeout() {
            return RestError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return RestError::Network(format!("HTTP connection failure: {self}"));
        }

        if self.is_builder() {
            return RestError::InvalidArgument(format!("could not build HTTP request: {self}"));
        }

        if self.is_decode() {
            return RestError::Deserialization(self.to_string());
        }

        if let Some(status) = self.status() {
            return RestError::HttpFailure {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("unknown status").to_string(),
                body: String::new(),
            };
        }

        RestError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_rest())
    }
}

/* -------------------------------------------------------------------------- */
/* url::ParseError → RestError */
/* -------------------------------------------------------------------------- */

impl IntoRestError for UrlError {
    fn into_rest(self) -> RestError {
        RestError::InvalidArgument(format!("invalid URL: {self}"))
    }
}

impl From<UrlError> for InfraError {
    fn from(value: UrlError) -> Self {
        InfraError(value.into_rest())
    }
}

/* -------------------------------------------------------------------------- */
/* serde_json::Error → RestError */
/* -------------------------------------------------------------------------- */

impl IntoRestError for serde_json::Error {
    fn into_rest(self) -> RestError {
        RestError::Deserialization(self.to_string())
    }
}

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        InfraError(value.into_rest())
    }
}

/// Shorthand used by the transport for `map_err`
pub(crate) fn transport_error(err: HttpError) -> RestError {
    InfraError::from(err).into()
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use reqwest::{Client, StatusCode};
    use tokio::runtime::Runtime;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn http_status_maps_to_http_failure() {
        Runtime::new().unwrap().block_on(async {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(StatusCode::UNAUTHORIZED))
                .mount(&server)
                .await;

            let client = Client::builder().no_proxy().build().unwrap();
            let error =
                client.get(server.uri()).send().await.unwrap().error_for_status().unwrap_err();

            let mapped: RestError = InfraError::from(error).into();
            match mapped {
                RestError::HttpFailure { status, reason, .. } => {
                    assert_eq!(status, 401);
                    assert_eq!(reason, "Unauthorized");
                }
                other => panic!("expected http failure, got {other:?}"),
            }
        });
    }

    #[test]
    fn connection_refused_maps_to_network_error() {
        Runtime::new().unwrap().block_on(async {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            let addr = listener.local_addr().unwrap();
            drop(listener);

            let client = Client::builder().no_proxy().build().unwrap();
            let error = client.get(format!("http://{addr}/")).send().await.unwrap_err();

            let mapped: RestError = InfraError::from(error).into();
            assert!(matches!(mapped, RestError::Network(_)), "got {mapped:?}");
        });
    }

    #[test]
    fn url_parse_error_is_invalid_argument() {
        let err = url::Url::parse("not a url").unwrap_err();
        let mapped: RestError = InfraError::from(err).into();
        assert!(matches!(mapped, RestError::InvalidArgument(msg) if msg.contains("invalid URL")));
    }

    #[test]
    fn json_error_is_deserialization() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let mapped: RestError = InfraError::from(err).into();
        assert!(matches!(mapped, RestError::Deserialization(_)));
    }
}
