//! Line reader for newline-delimited AIS messages.

use std::path::PathBuf;

use log::{debug, info};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio_graceful_shutdown::SubsystemHandle;

use crate::error::InputError;

/// Where messages come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Stdin,
    File(PathBuf),
}

impl InputSource {
    /// `None` or `-` read standard input
    pub fn from_arg(arg: Option<PathBuf>) -> Self {
        match arg {
            Some(path) if path.as_os_str() != "-" => InputSource::File(path),
            _ => InputSource::Stdin,
        }
    }
}

impl std::fmt::Display for InputSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputSource::Stdin => write!(f, "stdin"),
            InputSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Send every non-blank line to `tx` until end of input
///
/// Stops early, without error, if the receiver is gone.
pub async fn forward_lines<R: AsyncRead + Unpin>(
    reader: R,
    tx: &mpsc::Sender<String>,
) -> Result<usize, InputError> {
    let mut lines = BufReader::new(reader).lines();
    let mut count = 0;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        if tx.send(line).await.is_err() {
            debug!("Input: receiver closed");
            break;
        }
        count += 1;
    }
    Ok(count)
}

/// Reader subsystem; dropping `tx` at the end tells the pipeline input is done
pub async fn run_reader(
    source: InputSource,
    tx: mpsc::Sender<String>,
    subsys: SubsystemHandle,
) -> Result<(), InputError> {
    info!("Reading AIS messages from {}", source);

    let result = match &source {
        InputSource::Stdin => {
            tokio::select! {
                _ = subsys.on_shutdown_requested() => return Ok(()),
                r = forward_lines(tokio::io::stdin(), &tx) => r,
            }
        }
        InputSource::File(path) => {
            let file = File::open(path).await.map_err(|source| InputError::Open {
                path: path.clone(),
                source,
            })?;
            tokio::select! {
                _ = subsys.on_shutdown_requested() => return Ok(()),
                r = forward_lines(file, &tx) => r,
            }
        }
    };

    let count = result?;
    info!("End of input from {} after {} messages", source, count);
    Ok(())
}
