// SPDX-License-Identifier: CEPL-1.0
//! Local ping/pong over Unix-domain datagram sockets.
//!
//! The server binds a well-known path; each client binds a per-process path
//! under `/tmp` so the server has somewhere to send its reply. Payloads are
//! four ASCII bytes with no framing.

use std::fs;
use std::io;
use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const SERVER_PATH: &str = "/tmp/socket_local_pong";
pub const PING: &[u8] = b"Ping";
pub const PONG: &[u8] = b"Pong";

/// `sun_path` holds 108 bytes including the terminating NUL.
pub const MAX_PATH_LEN: usize = 107;

const RECV_BUF: usize = 32;

#[derive(Debug, Error)]
pub enum NetError {
    #[error("socket path {path} is {len} bytes, longer than 107")]
    PathTooLong { path: PathBuf, len: usize },
    #[error("{op} {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type NetResult<T> = Result<T, NetError>;

fn io_err<'a>(op: &'static str, path: &'a Path) -> impl FnOnce(io::Error) -> NetError + 'a {
    move |source| NetError::Io {
        op,
        path: path.to_path_buf(),
        source,
    }
}

/// `/tmp/<program>.<pid>` for the current process.
pub fn client_socket_path(program: &str) -> PathBuf {
    client_socket_path_for(program, std::process::id())
}

pub fn client_socket_path_for(program: &str, pid: u32) -> PathBuf {
    PathBuf::from(format!("/tmp/{program}.{pid}"))
}

pub fn check_path(path: &Path) -> NetResult<()> {
    let len = path.as_os_str().len();
    if len > MAX_PATH_LEN {
        return Err(NetError::PathTooLong {
            path: path.to_path_buf(),
            len,
        });
    }
    Ok(())
}

/// A datagram socket bound to a filesystem path. The socket file is removed
/// when this is dropped.
#[derive(Debug)]
pub struct BoundSocket {
    socket: UnixDatagram,
    path: PathBuf,
}

impl BoundSocket {
    /// Binds at `path`. With `replace_stale`, a leftover file at that path is
    /// removed first; a missing file is fine.
    pub fn bind(path: impl Into<PathBuf>, replace_stale: bool) -> NetResult<Self> {
        let path = path.into();
        check_path(&path)?;

        if replace_stale {
            match fs::remove_file(&path) {
                Ok(()) => debug!("removed stale socket file {}", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(io_err("remove", &path)(e)),
            }
        }

        let socket = UnixDatagram::bind(&path).map_err(io_err("bind", &path))?;
        debug!("socket bound to {}", path.display());
        Ok(BoundSocket { socket, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn socket(&self) -> &UnixDatagram {
        &self.socket
    }
}

impl Drop for BoundSocket {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("removed socket file {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("failed to remove {}: {e}", self.path.display()),
        }
    }
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

pub struct PingClient {
    sock: BoundSocket,
}

impl PingClient {
    /// Binds the per-process path for `program`.
    pub fn new(program: &str) -> NetResult<Self> {
        Self::bind(client_socket_path(program))
    }

    pub fn bind(path: impl Into<PathBuf>) -> NetResult<Self> {
        Ok(PingClient {
            sock: BoundSocket::bind(path, true)?,
        })
    }

    pub fn path(&self) -> &Path {
        self.sock.path()
    }

    /// Sends one `Ping` to `server` and waits up to `timeout` for a reply.
    /// `Ok(None)` means nothing arrived in time; a zero timeout does not wait.
    pub fn ping(&self, server: &Path, timeout: Duration) -> NetResult<Option<Vec<u8>>> {
        check_path(server)?;
        let socket = self.sock.socket();

        let sent = socket
            .send_to(PING, server)
            .map_err(io_err("send to", server))?;
        debug!("sent {sent} bytes to {}", server.display());

        if timeout.is_zero() {
            return Ok(None);
        }
        socket
            .set_read_timeout(Some(timeout))
            .map_err(io_err("set timeout on", self.sock.path()))?;

        let mut buf = [0u8; RECV_BUF];
        match socket.recv(&mut buf) {
            Ok(n) => Ok(Some(buf[..n].to_vec())),
            Err(e) if is_timeout(&e) => Ok(None),
            Err(e) => Err(io_err("receive on", self.sock.path())(e)),
        }
    }
}

pub struct PongServer {
    sock: BoundSocket,
}

impl PongServer {
    /// Binds `path`, replacing a stale socket file from an earlier run.
    pub fn bind(path: impl Into<PathBuf>) -> NetResult<Self> {
        Ok(PongServer {
            sock: BoundSocket::bind(path, true)?,
        })
    }

    pub fn path(&self) -> &Path {
        self.sock.path()
    }

    /// Answers `Ping` datagrams with `Pong` until `limit` pings have been
    /// seen, or forever when `limit` is `None`. Returns the ping count.
    ///
    /// Senders without a bound path cannot be answered; other payloads are
    /// ignored. A reply that cannot be delivered is logged, not fatal.
    pub fn serve(&self, limit: Option<u64>) -> NetResult<u64> {
        let socket = self.sock.socket();
        let mut buf = [0u8; RECV_BUF];
        let mut pings = 0u64;

        while limit.map_or(true, |l| pings < l) {
            let (n, from) = socket
                .recv_from(&mut buf)
                .map_err(io_err("receive on", self.sock.path()))?;
            let payload = &buf[..n];
            if payload != PING {
                warn!(
                    "ignoring {n}-byte datagram: {:?}",
                    String::from_utf8_lossy(payload)
                );
                continue;
            }
            pings += 1;

            let Some(peer) = from.as_pathname() else {
                info!("ping #{pings} from an unbound sender, not replying");
                continue;
            };
            info!("ping #{pings} from {}", peer.display());
            if let Err(e) = socket.send_to(PONG, peer) {
                warn!("reply to {} failed: {e}", peer.display());
            }
        }
        Ok(pings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(tag: &str) -> PathBuf {
        PathBuf::from(format!("/tmp/neotetris-net-{tag}.{}", std::process::id()))
    }

    #[test]
    fn client_path_is_per_process() {
        assert_eq!(client_socket_path("Ping"), client_socket_path("Ping"));
        assert_eq!(
            client_socket_path_for("Ping", 4242),
            PathBuf::from("/tmp/Ping.4242")
        );
        assert_ne!(
            client_socket_path_for("Ping", 1),
            client_socket_path_for("Ping", 2)
        );
    }

    #[test]
    fn path_length_limit() {
        let ok = PathBuf::from(format!("/{}", "a".repeat(MAX_PATH_LEN - 1)));
        assert!(check_path(&ok).is_ok());

        let long = PathBuf::from(format!("/{}", "a".repeat(MAX_PATH_LEN)));
        match BoundSocket::bind(long, true) {
            Err(NetError::PathTooLong { len, .. }) => assert_eq!(len, MAX_PATH_LEN + 1),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn stale_file_is_replaced_and_cleaned_up() {
        let path = temp_path("stale");
        fs::write(&path, b"left over").unwrap();

        let sock = BoundSocket::bind(&path, true).unwrap();
        assert_eq!(sock.path(), path.as_path());
        drop(sock);
        assert!(!path.exists());
    }

    #[test]
    fn stale_file_is_kept_without_replace() {
        let path = temp_path("keep");
        fs::write(&path, b"left over").unwrap();

        let res = BoundSocket::bind(&path, false);
        assert!(matches!(res, Err(NetError::Io { op: "bind", .. })));
        fs::remove_file(&path).unwrap();
    }
}
