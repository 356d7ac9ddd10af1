use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Errors from the line-delimited JSON wire protocol spoken with workers.
///
/// Any of these ends the worker connection: the job (if one was leased)
/// is handed back to the manager and the socket is dropped. There is no
/// retry at this layer — retrying is the manager's job, on a fresh
/// connection.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("connection closed by peer")]
    Closed,
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed message: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Send one JSON value as a single newline-terminated line.
pub async fn send_line<W>(writer: &mut W, value: &serde_json::Value) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one line and decode it as JSON. Returns [`WireError::Closed`] if the
/// peer closed the connection before sending a full line.
pub async fn recv_line<R>(reader: &mut R) -> Result<serde_json::Value, WireError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let read = reader.read_line(&mut line).await?;
    if read == 0 {
        return Err(WireError::Closed);
    }
    let trimmed = line.trim_end_matches(['\n', '\r']);
    Ok(serde_json::from_str(trimmed)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn round_trips_a_value_through_a_pipe() {
        let (read_half, mut write_half) = tokio::io::duplex(4096);
        let value = serde_json::json!({"op": "add", "args": [1, 2]});
        send_line(&mut write_half, &value).await.unwrap();

        let mut reader = BufReader::new(read_half);
        let decoded = recv_line(&mut reader).await.unwrap();
        assert_eq!(decoded, value);
    }

    #[tokio::test]
    async fn empty_read_reports_closed() {
        let (read_half, write_half) = tokio::io::duplex(4096);
        drop(write_half);
        let mut reader = BufReader::new(read_half);
        match recv_line(&mut reader).await {
            Err(WireError::Closed) => {}
            other => panic!("expected Closed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_json_reports_decode_error() {
        let (read_half, mut write_half) = tokio::io::duplex(4096);
        write_half.write_all(b"not json\n").await.unwrap();
        drop(write_half);
        let mut reader = BufReader::new(read_half);
        match recv_line(&mut reader).await {
            Err(WireError::Decode(_)) => {}
            other => panic!("expected Decode error, got {other:?}"),
        }
    }
}
