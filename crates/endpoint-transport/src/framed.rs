use endpoint_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::error::{FramingError, DEFAULT_CONTENT_TYPE};

/// Reads one framed JSON-RPC message from `input`.
///
/// Always consumes the full body before validating `Content-Type`, so a
/// malformed content type never desynchronizes the byte stream: the next
/// call still starts at the next message's header.
pub async fn read_message<R>(input: &mut R) -> Result<Value, FramingError>
where
	R: AsyncRead + Unpin + Send,
{
	let mut content_length: Option<usize> = None;
	let mut content_type = DEFAULT_CONTENT_TYPE.to_string();

	loop {
		let line = match read_header_line(input).await? {
			Some(line) => line,
			None => break,
		};

		if line.is_empty() {
			break;
		}

		if let Some(idx) = line.find(':') {
			let key = line[..idx].trim();
			let value = line[idx + 1..].trim();
			match key {
				"Content-Length" => {
					content_length = value.parse().ok();
				}
				"Content-Type" => content_type = value.to_string(),
				_ => {}
			}
		}
	}

	let len = content_length.ok_or(FramingError::MissingContentLength)?;
	let mut body = vec![0u8; len];
	input.read_exact(&mut body).await.map_err(|_| {
		tracing::debug!("connection lost reading message body");
		FramingError::ConnectionLost
	})?;

	if let Err(err) = verify_content_type(&content_type) {
		tracing::warn!(%err, "rejecting message with unsupported content type");
		return Err(err);
	}

	let text = std::str::from_utf8(&body).map_err(|_| FramingError::InvalidUtf8)?;
	endpoint_json::parse(text).map_err(|err| {
		tracing::debug!(%err, "malformed JSON body");
		FramingError::from(err)
	})
}

/// Reads a single `\r\n`-terminated header line (without the terminator),
/// or `None` once the blank line ending the header block is consumed.
///
/// EOF at any point inside the header block (including before the first
/// byte of the first line) is reported as [`FramingError::ConnectionLost`]:
/// there is no protocol-legal resumption point partway through a header
/// block, so EOF before any header byte and EOF mid-header get the same
/// treatment.
async fn read_header_line<R>(input: &mut R) -> Result<Option<String>, FramingError>
where
	R: AsyncRead + Unpin + Send,
{
	let mut line = Vec::new();
	loop {
		let mut byte = [0u8; 1];
		let n = input.read(&mut byte).await.map_err(FramingError::Io)?;
		if n == 0 {
			return Err(FramingError::ConnectionLost);
		}

		match byte[0] {
			b'\r' => {
				let mut next = [0u8; 1];
				let n2 = input.read(&mut next).await.map_err(FramingError::Io)?;
				if n2 == 0 || next[0] != b'\n' {
					return Err(FramingError::BadHeaderTermination);
				}
				let text = String::from_utf8_lossy(&line).into_owned();
				return Ok(Some(text));
			}
			b'\n' => return Err(FramingError::BareNewlineInHeader),
			b => line.push(b),
		}
	}
}

fn verify_content_type(content_type: &str) -> Result<(), FramingError> {
	if !content_type.starts_with("application/vscode-jsonrpc") {
		return Err(FramingError::UnsupportedContentType(content_type.to_string()));
	}

	if let Some(idx) = content_type.find("charset=") {
		let rest = &content_type[idx + "charset=".len()..];
		let charset = rest.split(';').next().unwrap_or("").trim();
		let charset_lower = charset.to_ascii_lowercase();
		if charset_lower != "utf-8" && charset_lower != "utf8" {
			return Err(FramingError::UnsupportedContentType(content_type.to_string()));
		}
	}

	Ok(())
}

/// Writes one framed JSON-RPC message to `output`. Always emits
/// `Content-Type` (costs a few dozen bytes, maximizes interoperability).
pub async fn write_message<W>(output: &mut W, value: &Value) -> Result<(), FramingError>
where
	W: AsyncWrite + Unpin + Send,
{
	let body = endpoint_json::stringify(value);
	let header = format!(
		"Content-Length: {}\r\nContent-Type: {}\r\n\r\n",
		body.len(),
		DEFAULT_CONTENT_TYPE
	);
	output.write_all(header.as_bytes()).await.inspect_err(|err| {
		tracing::debug!(%err, "connection lost writing message header");
	})?;
	output.write_all(body.as_bytes()).await.inspect_err(|err| {
		tracing::debug!(%err, "connection lost writing message body");
	})?;
	output.flush().await?;
	Ok(())
}

/// A framed transport over a split bidirectional byte stream.
///
/// The read half and write half are each guarded by their own
/// [`tokio::sync::Mutex`], so reads and writes are independently
/// serialized and a single endpoint may read and write concurrently.
pub struct FramedTransport<R, W> {
	reader: Mutex<R>,
	writer: Mutex<W>,
}

impl<R, W> FramedTransport<R, W>
where
	R: AsyncRead + Unpin + Send,
	W: AsyncWrite + Unpin + Send,
{
	pub fn new(reader: R, writer: W) -> Self {
		Self {
			reader: Mutex::new(reader),
			writer: Mutex::new(writer),
		}
	}

	pub async fn read_message(&self) -> Result<Value, FramingError> {
		let mut reader = self.reader.lock().await;
		read_message(&mut *reader).await
	}

	pub async fn write_message(&self, value: &Value) -> Result<(), FramingError> {
		let mut writer = self.writer.lock().await;
		write_message(&mut *writer, value).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use endpoint_json::Object;
	use tokio::io::duplex;

	fn sample_value() -> Value {
		let mut object = Object::new();
		object.insert("jsonrpc", Value::String("2.0".to_string()));
		object.insert("id", Value::Integer(1));
		object.insert("method", Value::String("initialize".to_string()));
		Value::Object(object)
	}

	#[tokio::test]
	async fn frame_round_trip() {
		let (mut client, mut server) = duplex(4096);
		let value = sample_value();
		write_message(&mut client, &value).await.unwrap();
		let read_back = read_message(&mut server).await.unwrap();
		assert_eq!(read_back, value);
	}

	#[tokio::test]
	async fn rejects_bad_content_type_after_consuming_body() {
		let (mut client, mut server) = duplex(4096);
		let body = endpoint_json::stringify(&sample_value());
		let header = format!(
			"Content-Length: {}\r\nContent-Type: text/plain\r\n\r\n",
			body.len()
		);
		client.write_all(header.as_bytes()).await.unwrap();
		client.write_all(body.as_bytes()).await.unwrap();

		let err = read_message(&mut server).await.unwrap_err();
		assert!(matches!(err, FramingError::UnsupportedContentType(_)));

		// The body must have been fully consumed despite the error, so the
		// stream can still be used for the next message.
		let value = sample_value();
		write_message(&mut client, &value).await.unwrap();
		let read_back = read_message(&mut server).await.unwrap();
		assert_eq!(read_back, value);
	}

	#[tokio::test]
	async fn accepts_lenient_charset_casing() {
		let (mut client, mut server) = duplex(4096);
		let body = endpoint_json::stringify(&sample_value());
		let header = format!(
			"Content-Length: {}\r\nContent-Type: application/vscode-jsonrpc; charset=UTF8; foo=bar\r\n\r\n",
			body.len()
		);
		client.write_all(header.as_bytes()).await.unwrap();
		client.write_all(body.as_bytes()).await.unwrap();
		let read_back = read_message(&mut server).await.unwrap();
		assert_eq!(read_back, sample_value());
	}

	#[tokio::test]
	async fn bare_newline_in_header_is_a_framing_error() {
		let (mut client, mut server) = duplex(4096);
		client.write_all(b"Content-Length: 2\n\r\n").await.unwrap();
		drop(client);
		let err = read_message(&mut server).await.unwrap_err();
		assert!(matches!(err, FramingError::BareNewlineInHeader));
	}

	#[tokio::test]
	async fn eof_before_any_header_byte_is_connection_lost() {
		let (client, mut server) = duplex(4096);
		drop(client);
		let err = read_message(&mut server).await.unwrap_err();
		assert!(matches!(err, FramingError::ConnectionLost));
	}
}
