//! Length-prefixed bincode framing over any async byte stream

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest payload accepted in either direction.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Writes `value` as a 4-byte big-endian length followed by its bincode bytes.
pub async fn write_frame<W, T>(writer: &mut W, value: &T) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload =
        bincode::serialize(value).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("frame of {} bytes exceeds limit", payload.len()),
        ));
    }

    writer.write_u32(payload.len() as u32).await?;
    writer.write_all(&payload).await?;
    writer.flush().await
}

/// Reads one frame. Returns `Ok(None)` when the peer closed the stream
/// cleanly between frames.
pub async fn read_frame<R, T>(reader: &mut R) -> io::Result<Option<T>>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    };
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("announced frame of {} bytes exceeds limit", len),
        ));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    bincode::deserialize(&payload)
        .map(Some)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ClientPacket, GameId, PlayerHandle};

    #[tokio::test]
    async fn test_frames_survive_a_stream() {
        let (mut a, mut b) = tokio::io::duplex(4096);

        let sent = ClientPacket::MakeMove {
            game_id: GameId::new("g1"),
            handle: PlayerHandle::new("p1"),
            index: 40,
        };
        write_frame(&mut a, &sent).await.unwrap();
        write_frame(&mut a, &ClientPacket::FinalizeScore).await.unwrap();

        let first: ClientPacket = read_frame(&mut b).await.unwrap().unwrap();
        assert_eq!(first, sent);
        let second: ClientPacket = read_frame(&mut b).await.unwrap().unwrap();
        assert_eq!(second, ClientPacket::FinalizeScore);
    }

    #[tokio::test]
    async fn test_frame_split_across_reads() {
        let payload = bincode::serialize(&ClientPacket::FinalizeScore).unwrap();
        let mut bytes = (payload.len() as u32).to_be_bytes().to_vec();
        bytes.extend_from_slice(&payload);

        let mut reader = tokio_test::io::Builder::new()
            .read(&bytes[..2])
            .read(&bytes[2..])
            .build();
        let frame: Option<ClientPacket> = read_frame(&mut reader).await.unwrap();
        assert_eq!(frame, Some(ClientPacket::FinalizeScore));
    }

    #[tokio::test]
    async fn test_truncated_payload_is_an_error() {
        let mut reader = tokio_test::io::Builder::new()
            .read(&[0, 0, 0, 10])
            .read(&[1, 2, 3])
            .build();
        let err = read_frame::<_, ClientPacket>(&mut reader).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn test_clean_eof_is_none() {
        let (a, mut b) = tokio::io::duplex(64);
        drop(a);
        let frame: Option<ClientPacket> = read_frame(&mut b).await.unwrap();
        assert!(frame.is_none());
    }

    #[tokio::test]
    async fn test_oversized_length_rejected() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_u32((MAX_FRAME_LEN + 1) as u32).await.unwrap();

        let err = read_frame::<_, ClientPacket>(&mut b).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn test_garbage_payload_rejected() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_u32(3).await.unwrap();
        a.write_all(&[0xff, 0xff, 0xff]).await.unwrap();

        let result = read_frame::<_, ClientPacket>(&mut b).await;
        assert!(result.is_err());
    }
}
