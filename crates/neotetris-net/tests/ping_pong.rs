// SPDX-License-Identifier: CEPL-1.0
use neotetris_net::{
    client_socket_path, client_socket_path_for, NetError, PingClient, PongServer, PING, PONG,
};
use std::os::unix::net::UnixDatagram;
use std::path::PathBuf;
use std::process::Command;
use std::thread;
use std::time::Duration;

fn temp_path(tag: &str) -> PathBuf {
    PathBuf::from(format!("/tmp/neotetris-it-{tag}.{}", std::process::id()))
}

#[test]
fn ping_gets_pong() {
    let server = PongServer::bind(temp_path("pong-a")).unwrap();
    let server_path = server.path().to_path_buf();
    let handle = thread::spawn(move || server.serve(Some(1)).unwrap());

    let client = PingClient::bind(temp_path("ping-a")).unwrap();
    let reply = client.ping(&server_path, Duration::from_secs(5)).unwrap();

    assert_eq!(reply.as_deref(), Some(PONG));
    assert_eq!(handle.join().unwrap(), 1);
    assert!(!server_path.exists());
}

#[test]
fn junk_and_unbound_senders_are_not_answered() {
    let server = PongServer::bind(temp_path("pong-b")).unwrap();
    let server_path = server.path().to_path_buf();

    let anon = UnixDatagram::unbound().unwrap();
    anon.send_to(b"Hello", &server_path).unwrap();
    anon.send_to(PING, &server_path).unwrap();

    // One junk datagram, one unanswerable ping.
    assert_eq!(server.serve(Some(1)).unwrap(), 1);
}

#[test]
fn zero_limit_returns_immediately() {
    let server = PongServer::bind(temp_path("pong-c")).unwrap();
    assert_eq!(server.serve(Some(0)).unwrap(), 0);
}

#[test]
fn ping_without_server_fails_to_send() {
    let client = PingClient::bind(temp_path("ping-d")).unwrap();
    let missing = temp_path("nobody-home");
    let err = client.ping(&missing, Duration::from_millis(10)).unwrap_err();
    assert!(matches!(err, NetError::Io { op: "send to", .. }));
}

#[test]
fn silent_server_times_out() {
    // Bound but never served.
    let server = PongServer::bind(temp_path("pong-e")).unwrap();
    let client = PingClient::bind(temp_path("ping-e")).unwrap();
    let reply = client
        .ping(server.path(), Duration::from_millis(50))
        .unwrap();
    assert_eq!(reply, None);
}

#[test]
fn each_process_pings_from_its_own_path() {
    let server_path = temp_path("pong-f");
    std::fs::remove_file(&server_path).ok();
    let server = UnixDatagram::bind(&server_path).unwrap();
    server
        .set_read_timeout(Some(Duration::from_secs(10)))
        .unwrap();

    let mut child = Command::new(env!("CARGO_BIN_EXE_local-ping"))
        .arg("--server-path")
        .arg(&server_path)
        .args(["--timeout-ms", "5000"])
        .spawn()
        .unwrap();

    let mut buf = [0u8; 16];
    let (n, from) = server.recv_from(&mut buf).unwrap();
    assert_eq!(&buf[..n], PING);

    let peer = from.as_pathname().unwrap().to_path_buf();
    assert_eq!(peer, client_socket_path_for("Ping", child.id()));
    assert_ne!(peer, client_socket_path("Ping"));

    server.send_to(PONG, &peer).unwrap();
    assert!(child.wait().unwrap().success());
    // The child removes its own socket file on exit.
    assert!(!peer.exists());

    drop(server);
    std::fs::remove_file(&server_path).ok();
}
