//! Async read/write of one framed [`Message`] at a time over any
//! `AsyncRead`/`AsyncWrite` pair. Mirrors `client.py`'s `received_messages`
//! generator: read the 4-byte header, then read exactly `payload_len` more
//! bytes before decoding.

use crate::error::ProtoError;
use crate::message::Message;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const HEADER_LEN: usize = 4;

pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Message, ProtoError> {
    let mut header = [0u8; HEADER_LEN];
    reader.read_exact(&mut header).await?;
    let msg_type = header[0];
    let subtype = header[1];
    let payload_len = u16::from_be_bytes([header[2], header[3]]) as usize;

    let mut payload = vec![0u8; payload_len];
    reader.read_exact(&mut payload).await?;
    Message::decode(msg_type, subtype, &payload)
}

pub async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, msg: &Message) -> Result<(), ProtoError> {
    let encoded = msg.encode();
    writer.write_all(&encoded).await?;
    Ok(())
}
