use test_case::test_case;
use testserver::mock;
use volley::{Client, ErrorKind, RequestSpec};

#[test_case("GET")]
#[test_case("HEAD")]
#[test_case("POST")]
#[test_case("PUT")]
#[test_case("DELETE")]
#[test_case("PATCH")]
#[test_case("OPTIONS")]
#[test_case("FOOBAR")]
fn request_with_method(method: &str) {
    let m = mock!();

    let result = Client::new().unwrap().send(RequestSpec::new(method, m.url()));

    assert!(result.is_ok(), "{:?}", result);
    assert_eq!(m.request().method(), method);
}

#[test]
fn head_response_has_no_body() {
    let m = mock! {
        body: "ignored",
    };

    let result = Client::new().unwrap().send(RequestSpec::new("HEAD", m.url()));

    assert!(result.is_ok(), "{:?}", result);
    assert!(result.body().is_empty());
}

#[test_case("" ; "empty")]
#[test_case("GE T" ; "contains a space")]
fn invalid_method_is_rejected(method: &str) {
    let m = mock!();

    let result = Client::new().unwrap().send(RequestSpec::new(method, m.url()));

    assert_eq!(result.error().unwrap().kind(), &ErrorKind::InvalidRequest);
    assert_eq!(m.requests_received(), 0);
}
