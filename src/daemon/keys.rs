use std::str::FromStr;

use anyhow::{anyhow, Result};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    sync::mpsc,
};
use tokio_stream::{wrappers::LinesStream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A button going down on a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPress {
    pub device_id: String,
    pub key: usize,
}

impl FromStr for KeyPress {
    type Err = anyhow::Error;

    /// Parses `<device id> <key index>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let (Some(device_id), Some(key), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(anyhow!("Expected \"<device> <key>\", got {s:?}"));
        };
        Ok(KeyPress {
            device_id: device_id.to_string(),
            key: key.parse()?,
        })
    }
}

/// Forwards key presses written one per line by the device driver. Blank and malformed lines are
/// skipped. Returns once input ends or shutdown is requested.
pub async fn forward_key_presses(
    input: impl AsyncRead + Unpin,
    sender: mpsc::Sender<KeyPress>,
    shutdown: CancellationToken,
) -> Result<()> {
    let mut lines = LinesStream::new(BufReader::new(input).lines());
    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            line = lines.next() => line,
        };
        let Some(line) = line else {
            info!("Key press input closed");
            return Ok(());
        };
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<KeyPress>() {
            Ok(press) => {
                debug!("Received {press:?}");
                if sender.send(press).await.is_err() {
                    return Ok(());
                }
            }
            Err(e) => warn!("Ignoring key press line: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::*;

    #[test]
    fn test_parse_key_press() {
        assert_eq!(
            "AL12 14".parse::<KeyPress>().unwrap(),
            KeyPress {
                device_id: "AL12".into(),
                key: 14
            }
        );
        assert!("AL12".parse::<KeyPress>().is_err());
        assert!("AL12 x".parse::<KeyPress>().is_err());
        assert!("AL12 1 2".parse::<KeyPress>().is_err());
    }

    #[tokio::test]
    async fn test_forwarding_skips_bad_lines() -> Result<()> {
        let input: &[u8] = b"AL12 0\n\nnonsense\nAL12 3\n";
        let (sender, mut receiver) = mpsc::channel(8);

        forward_key_presses(input, sender, CancellationToken::new()).await?;

        assert_eq!(receiver.recv().await.unwrap().key, 0);
        assert_eq!(receiver.recv().await.unwrap().key, 3);
        assert!(receiver.recv().await.is_none());
        Ok(())
    }
}
