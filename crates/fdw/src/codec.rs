//! Wire codec
//!
//! Every message is a 4-byte big-endian length followed by a MessagePack
//! body. Requests are `[quals, columns]`, replies are an array of
//! `[src, dest, score]` rows or a `{"error": message}` map.

use crate::protocol::{QueryRequest, Row};
use gravity_common::errors::{GravityError, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest accepted frame body
pub const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

/// Error reply body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub error: String,
}

/// Read one frame; `None` on a clean end of stream
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let len = match reader.read_u32().await {
        Ok(len) => len,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    if len > MAX_FRAME_LEN {
        return Err(GravityError::Protocol {
            message: format!("Frame of {} bytes exceeds limit of {}", len, MAX_FRAME_LEN),
        });
    }

    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body).await?;
    Ok(Some(body))
}

/// Write one frame and flush
pub async fn write_frame<W>(writer: &mut W, body: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(body.len())
        .ok()
        .filter(|len| *len <= MAX_FRAME_LEN)
        .ok_or_else(|| GravityError::Protocol {
            message: format!("Reply of {} bytes exceeds frame limit", body.len()),
        })?;

    writer.write_u32(len).await?;
    writer.write_all(body).await?;
    writer.flush().await?;
    Ok(())
}

pub fn decode_request(body: &[u8]) -> Result<QueryRequest> {
    Ok(rmp_serde::from_slice(body)?)
}

pub fn encode_request(request: &QueryRequest) -> Result<Vec<u8>> {
    Ok(rmp_serde::to_vec(request)?)
}

pub fn encode_rows(rows: &[Row]) -> Result<Vec<u8>> {
    Ok(rmp_serde::to_vec(rows)?)
}

pub fn decode_rows(body: &[u8]) -> Result<Vec<Row>> {
    Ok(rmp_serde::from_slice(body)?)
}

pub fn encode_error(message: &str) -> Result<Vec<u8>> {
    Ok(rmp_serde::to_vec_named(&ErrorReply {
        error: message.to_string(),
    })?)
}

/// Decoded reply: rows, or the error message the listener sent back
pub fn decode_reply(body: &[u8]) -> Result<std::result::Result<Vec<Row>, String>> {
    if let Ok(reply) = rmp_serde::from_slice::<ErrorReply>(body) {
        return Ok(Err(reply.error));
    }
    Ok(Ok(decode_rows(body)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Qual;

    #[tokio::test]
    async fn test_frame_over_duplex() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        write_frame(&mut client, b"hello").await.unwrap();
        drop(client);

        assert_eq!(read_frame(&mut server).await.unwrap(), Some(b"hello".to_vec()));
        assert_eq!(read_frame(&mut server).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let (mut client, mut server) = tokio::io::duplex(64);

        client.write_u32(MAX_FRAME_LEN + 1).await.unwrap();
        let err = read_frame(&mut server).await.unwrap_err();
        assert!(matches!(err, GravityError::Protocol { .. }));
    }

    #[test]
    fn test_request_is_positional() {
        let request = QueryRequest {
            quals: vec![Qual::new("src", "=", "U1")],
            columns: vec!["src".into(), "dest".into()],
        };
        let body = encode_request(&request).unwrap();

        // Same bytes a client packing [[["src","=","U1"]],["src","dest"]] sends
        let raw = rmp_serde::to_vec(&(vec![("src", "=", "U1")], vec!["src", "dest"])).unwrap();
        assert_eq!(body, raw);
        assert_eq!(decode_request(&raw).unwrap(), request);
    }

    #[test]
    fn test_error_reply_is_a_map() {
        let body = encode_error("No source node specified").unwrap();

        assert_eq!(decode_reply(&body).unwrap(), Err("No source node specified".to_string()));
        assert!(decode_request(&body).is_err());
    }

    #[test]
    fn test_rows_reply() {
        let rows = vec![("U1".to_string(), "B1".to_string(), 0.25)];
        let body = encode_rows(&rows).unwrap();

        assert_eq!(decode_reply(&body).unwrap(), Ok(rows));
    }
}
