use std::{
    io::Write,
    process::{Command, Stdio},
};
use testserver::mock;

fn volley() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_volley"));
    command.env_remove("PAYLOAD").env_remove("RUST_LOG");
    command
}

#[test]
fn prints_one_line_per_request() {
    let m = mock! {
        body: "pong",
    };

    let payload = format!(
        r#"[{{"method":"GET","url":"{url}"}},{{"method":"GET","url":""}}]"#,
        url = m.url()
    );

    let output = volley()
        .args(&["--ordered", "--payload", &payload])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines = stdout.lines().collect::<Vec<_>>();

    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "pong");
    assert!(lines[1].starts_with("error[invalid-request]: "), "{}", lines[1]);
}

#[test]
fn payload_is_read_from_the_environment() {
    let m = mock! {
        body: "from env",
    };

    let output = volley()
        .env("PAYLOAD", format!(r#"[{{"method":"GET","url":"{}"}}]"#, m.url()))
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(output.stdout, b"from env\n");
}

#[test]
fn payload_is_read_from_a_file() {
    let m = mock! {
        body: "from file",
    };

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"[{{"method":"GET","url":"{}"}}]"#, m.url()).unwrap();

    let output = volley()
        .arg("--payload-file")
        .arg(file.path())
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(output.stdout, b"from file\n");
}

#[test]
fn payload_is_read_from_stdin() {
    let m = mock! {
        body: "from stdin",
    };

    let mut child = volley()
        .args(&["--payload-file", "-"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();

    write!(
        child.stdin.take().unwrap(),
        r#"[{{"method":"GET","url":"{}"}}]"#,
        m.url()
    )
    .unwrap();

    let output = child.wait_with_output().unwrap();

    assert!(output.status.success());
    assert_eq!(output.stdout, b"from stdin\n");
}

#[test]
fn invalid_payload_exits_before_sending_anything() {
    for payload in &["   ", "not json", "{}", r#"[{"method":1,"url":"x"}]"#] {
        let output = volley().args(&["--payload", payload]).output().unwrap();

        assert_eq!(output.status.code(), Some(2), "payload {:?}", payload);
        assert!(output.stdout.is_empty());
        assert!(!output.stderr.is_empty());
    }
}

#[test]
fn missing_payload_is_an_error() {
    let output = volley().output().unwrap();

    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn limited_connections_print_every_result() {
    let m = mock! {
        body: "ok",
    };

    let payload = format!(
        "[{}]",
        vec![format!(r#"{{"method":"GET","url":"{}"}}"#, m.url()); 6].join(",")
    );

    let output = volley()
        .args(&["--max-connections", "2", "--payload", &payload])
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(output.stdout, b"ok\nok\nok\nok\nok\nok\n");
}
