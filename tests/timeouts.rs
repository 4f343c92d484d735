use std::{
    io::Write,
    net::TcpListener,
    time::{Duration, Instant},
};
use testserver::mock;
use volley::{Client, ErrorKind, RequestSpec};

#[test]
fn slow_response_times_out() {
    let m = mock! {
        delay: 1s,
    };

    let client = Client::builder()
        .timeout(Duration::from_millis(500))
        .build()
        .unwrap();

    let result = client.send(RequestSpec::new("POST", m.url()).body("hello world"));

    assert_eq!(result.error().unwrap().kind(), &ErrorKind::Timeout);
    assert_eq!(m.requests_received(), 1);
}

#[test]
fn stalled_response_body_times_out() {
    let m = mock! {
        _ => writer |w| {
            w.write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 100\r\n\r\npartial").unwrap();
            w.flush().unwrap();
            std::thread::sleep(Duration::from_secs(2));
        },
    };

    let client = Client::builder()
        .timeout(Duration::from_millis(500))
        .build()
        .unwrap();

    let result = client.send(RequestSpec::new("GET", m.url()));

    assert_eq!(result.error().unwrap().kind(), &ErrorKind::Timeout);
}

#[test]
fn refused_connection_is_a_connection_error() {
    // Bind and immediately release a port so nothing is listening on it.
    let port = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();

    let result = Client::new()
        .unwrap()
        .send(RequestSpec::new("GET", format!("http://127.0.0.1:{}/", port)));

    assert_eq!(result.error().unwrap().kind(), &ErrorKind::Connection);
}

#[test]
fn unreachable_host_fails_within_connect_timeout() {
    let client = Client::builder()
        .connect_timeout(Duration::from_millis(500))
        .build()
        .unwrap();

    let start = Instant::now();

    // Non-routable address. Depending on the network the attempt hangs until
    // the connect timeout, fails fast, or is reset by an intercepting peer
    // after connecting. It never waits for the overall timeout.
    let result = client.send(RequestSpec::new("GET", "http://10.255.255.1/"));
    let kind = result.error().unwrap().kind().clone();

    assert!(
        kind == ErrorKind::Connection || kind == ErrorKind::Read,
        "unexpected error kind: {:?}",
        kind
    );
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[test]
fn slow_exchange_does_not_delay_fast_sibling_results() {
    let slow = mock! {
        delay: 2s,
    };
    let fast = mock! {
        body: "fast",
    };

    let client = Client::builder()
        .timeout(Duration::from_millis(500))
        .build()
        .unwrap();

    let batch = vec![
        RequestSpec::new("GET", slow.url()),
        RequestSpec::new("GET", fast.url()),
    ];
    let mut results = Vec::new();

    let report = client.dispatch_ordered(batch.into(), |r| results.push(r));

    assert_eq!(report.failed(), 1);
    assert_eq!(results[0].error().unwrap().kind(), &ErrorKind::Timeout);
    assert_eq!(results[1].body(), b"fast");
}
