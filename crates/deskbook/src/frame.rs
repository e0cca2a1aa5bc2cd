//! Native-messaging framing: a 32-bit length in native byte order followed
//! by that many bytes of UTF-8 JSON.

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest frame accepted from the browser.
pub(crate) const MAX_INBOUND_FRAME: usize = 64 * 1024 * 1024;
/// Browsers refuse host messages above 1 MiB.
pub(crate) const MAX_OUTBOUND_FRAME: usize = 1024 * 1024;

/// Read one frame body. `Ok(None)` on a clean end of stream.
pub(crate) async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; 4];
    match reader.read_exact(&mut prefix).await {
        Ok(_) => {}
        Err(error) if error.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(error) => return Err(error).context("failed to read frame length"),
    }
    let len = u32::from_ne_bytes(prefix) as usize;
    if len > MAX_INBOUND_FRAME {
        bail!("frame of {len} bytes exceeds the {MAX_INBOUND_FRAME} byte limit");
    }
    let mut body = vec![0u8; len];
    reader
        .read_exact(&mut body)
        .await
        .with_context(|| format!("truncated frame, expected {len} bytes"))?;
    Ok(Some(body))
}

pub(crate) async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize + ?Sized,
{
    let body = serde_json::to_vec(message).context("failed to encode frame")?;
    if body.len() > MAX_OUTBOUND_FRAME {
        bail!(
            "outbound frame of {} bytes exceeds the {MAX_OUTBOUND_FRAME} byte limit",
            body.len()
        );
    }
    let len = u32::try_from(body.len()).context("frame length overflow")?;
    writer.write_all(&len.to_ne_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}
