#![cfg(feature = "cli")]

use std::process::Command;
use std::thread;

use mdwire_datagram::{ControlMessage, Datagram};
use mdwire_frame::{FrameError, FrameReader, FrameWriter};
use mdwire_transport::{DirectorAddress, MdListener, MdStream};

fn loopback_director() -> (MdListener, String) {
    let address: DirectorAddress = "127.0.0.1:0".parse().expect("address should parse");
    let listener = MdListener::bind(&address).expect("listener should bind");
    let bound = listener
        .local_address()
        .expect("listener should have an address")
        .to_string();
    (listener, bound)
}

fn split(stream: MdStream) -> (FrameReader<MdStream>, FrameWriter<MdStream>) {
    let reader = FrameReader::new(stream.try_clone().expect("stream should clone"));
    (reader, FrameWriter::new(stream))
}

/// Accept one client and collect every datagram until it hangs up.
fn record_one_client(listener: MdListener) -> thread::JoinHandle<Vec<Datagram>> {
    thread::spawn(move || {
        let stream = listener.accept().expect("accept should succeed");
        let mut reader = FrameReader::new(stream);
        let mut received = Vec::new();
        loop {
            match reader.read_frame() {
                Ok(datagram) => received.push(datagram),
                Err(FrameError::ConnectionClosed) => return received,
                Err(err) => panic!("director read failed: {err}"),
            }
        }
    })
}

#[test]
fn send_delivers_one_datagram() {
    let (listener, address) = loopback_director();
    let director = record_one_client(listener);

    let output = Command::new(env!("CARGO_BIN_EXE_mdwire"))
        .args(["--log-level", "error", "send", address.as_str()])
        .args(["--to", "5,6", "--sender", "9", "--msg-type", "300"])
        .args(["--data", "hello"])
        .output()
        .expect("send should run");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let mut expected = Datagram::create(&[5, 6], 9, 300).expect("valid header");
    expected.append_raw(b"hello");
    assert_eq!(director.join().expect("director thread"), vec![expected.build()]);
}

#[test]
fn send_hex_payload_from_env_address() {
    let (listener, address) = loopback_director();
    let director = record_one_client(listener);

    let output = Command::new(env!("CARGO_BIN_EXE_mdwire"))
        .env("MDWIRE_ADDRESS", &address)
        .args(["send", "--to", "1", "--hex", "00ff"])
        .output()
        .expect("send should run");
    assert!(output.status.success());

    let received = director.join().expect("director thread");
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].payload().expect("well formed"), &[0x00, 0xff]);
}

#[test]
fn subscribe_registers_and_prints_json() {
    let (listener, address) = loopback_director();
    let director = thread::spawn(move || {
        let stream = listener.accept().expect("accept should succeed");
        let (mut reader, mut writer) = split(stream);

        let first = ControlMessage::parse(&reader.read_frame().expect("add_channel"));
        let second = ControlMessage::parse(&reader.read_frame().expect("add_range"));

        let mut update = Datagram::create(&[5], 2, 400).expect("valid header");
        update.append_raw(b"tick");
        writer.write_frame(&update.build()).expect("write update");

        while reader.read_frame().is_ok() {}
        (first, second)
    });

    let output = Command::new(env!("CARGO_BIN_EXE_mdwire"))
        .args(["--format", "json", "subscribe", address.as_str()])
        .args(["--channel", "5", "--range", "100-200", "--count", "1"])
        .output()
        .expect("subscribe should run");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let line: serde_json::Value =
        serde_json::from_str(stdout.trim()).expect("subscribe should emit json");
    assert_eq!(line["channels"], serde_json::json!([5]));
    assert_eq!(line["sender"], 2);
    assert_eq!(line["kind"], "app");
    assert_eq!(line["payload"], "tick");

    let (first, second) = director.join().expect("director thread");
    assert_eq!(first.expect("control"), ControlMessage::AddChannel(5));
    assert_eq!(
        second.expect("control"),
        ControlMessage::AddRange {
            upper: 200,
            lower: 100
        }
    );
}

#[test]
fn reply_wait_timeout_returns_124() {
    let (listener, address) = loopback_director();
    let director = record_one_client(listener);

    let output = Command::new(env!("CARGO_BIN_EXE_mdwire"))
        .args(["send", address.as_str(), "--to", "3", "--reply-on", "4"])
        .args(["--wait-timeout", "200ms"])
        .output()
        .expect("send should run");
    assert_eq!(output.status.code(), Some(124));

    let received = director.join().expect("director thread");
    assert_eq!(received[0], Datagram::create_add_channel(4));
}

#[test]
fn invalid_address_is_usage_error() {
    let output = Command::new(env!("CARGO_BIN_EXE_mdwire"))
        .args(["send", "tcp://", "--to", "1"])
        .output()
        .expect("send should run");
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn control_channel_recipient_is_usage_error() {
    let output = Command::new(env!("CARGO_BIN_EXE_mdwire"))
        .args(["send", "127.0.0.1:1", "--to", "4001"])
        .output()
        .expect("send should run");
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn version_prints_package_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_mdwire"))
        .arg("version")
        .output()
        .expect("version should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}
