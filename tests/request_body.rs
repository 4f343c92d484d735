use test_case::test_case;
use testserver::mock;
use volley::{Client, RequestSpec};

#[test_case("POST")]
#[test_case("PUT")]
#[test_case("PATCH")]
#[test_case("DELETE")]
fn body_is_sent_verbatim(method: &str) {
    let m = mock!();

    let result = Client::new()
        .unwrap()
        .send(RequestSpec::new(method, m.url()).body(r#"{"k":"v"}"#));

    assert!(result.is_ok(), "{:?}", result);

    let request = m.request();
    assert_eq!(request.method(), method);
    request.expect_header("content-length", "9");
    request.expect_body(r#"{"k":"v"}"#);
}

#[test]
fn content_type_is_not_inferred() {
    let m = mock!();

    Client::new()
        .unwrap()
        .send(RequestSpec::new("POST", m.url()).body("a=b"));

    let request = m.request();
    request.expect_no_header("content-type");
    request.expect_no_header("expect");
    request.expect_body("a=b");
}

#[test]
fn content_type_is_sent_when_given() {
    let m = mock!();

    Client::new().unwrap().send(
        RequestSpec::new("POST", m.url())
            .header("Content-Type", "application/json")
            .body("{}"),
    );

    m.request().expect_header("content-type", "application/json");
}

#[test]
fn empty_post_sends_no_body() {
    let m = mock!();

    Client::new().unwrap().send(RequestSpec::new("POST", m.url()));

    let request = m.request();
    assert_eq!(request.method(), "POST");
    request.expect_body("");
}
