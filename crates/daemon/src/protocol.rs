// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The wire protocol spoken over the daemon's Unix domain socket:
//! newline-delimited JSON, one `Request` or `Response` object per line.
//!
//! Grounded in the teacher's `protocol_wire` module shape (`ProtocolError`,
//! a max-message-size guard, read/write helpers built on top of an
//! `AsyncBufRead`/`AsyncWrite` split stream) but adapted from a 4-byte
//! length-prefix frame to one JSON object per `\n`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Refuse to read a line longer than this; a well-behaved client never
/// sends one, and this bounds memory for a misbehaving one.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("message too large: {size} bytes exceeds max of {max}")]
    MessageTooLarge { size: usize, max: usize },
    #[error("connection closed")]
    ConnectionClosed,
    #[error("timed out waiting for message")]
    Timeout,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    pub fn ok(id: u64, result: Value) -> Self {
        Self { id, result: Some(result), error: None }
    }

    pub fn err(id: u64, code: i32, message: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(RpcError { code, message: message.into() }),
        }
    }
}

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');
    Ok(line)
}

pub fn decode<T: for<'de> Deserialize<'de>>(line: &str) -> Result<T, ProtocolError> {
    Ok(serde_json::from_str(line.trim_end_matches('\n'))?)
}

/// Reads one newline-terminated line from `reader` and deserializes it.
pub async fn read_message<R, T>(reader: &mut BufReader<R>) -> Result<T, ProtocolError>
where
    R: tokio::io::AsyncRead + Unpin,
    T: for<'de> Deserialize<'de>,
{
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Err(ProtocolError::ConnectionClosed);
    }
    if line.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge { size: line.len(), max: MAX_MESSAGE_SIZE });
    }
    decode(&line)
}

/// Encodes and writes one message, flushing the stream.
pub async fn write_message<W, T>(writer: &mut W, value: &T) -> Result<(), ProtocolError>
where
    W: tokio::io::AsyncWrite + Unpin,
    T: Serialize,
{
    let bytes = encode(value)?;
    if bytes.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge { size: bytes.len(), max: MAX_MESSAGE_SIZE });
    }
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_request<R>(reader: &mut BufReader<R>) -> Result<Request, ProtocolError>
where
    R: tokio::io::AsyncRead + Unpin,
{
    read_message(reader).await
}

pub async fn write_response<W>(writer: &mut W, response: &Response) -> Result<(), ProtocolError>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    write_message(writer, response).await
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
