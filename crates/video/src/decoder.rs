use std::{path::Path, process::Stdio};

use anyhow::Context;
use async_trait::async_trait;
use ds_client::Task;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::{Child, ChildStdin, Command},
    select,
};
use tokio_util::sync::CancellationToken;
use tracing::*;

use crate::DecoderConfig;

/// A running decoder process. Numbered images appear in the output
/// directory. The process is killed when this is dropped.
pub struct Decoder {
    child: Child,
}

impl Decoder {
    /// Launches the decoder and returns it together with its stdin, which
    /// takes the raw video stream. Closing the stdin ends the stream.
    pub fn spawn(config: &DecoderConfig, output_dir: &Path) -> anyhow::Result<(Self, ChildStdin)> {
        let output = output_dir.join(&config.pattern);

        let mut command = Command::new(&config.program);
        command
            .arg("-i")
            .arg("-")
            .arg("-r")
            .arg(config.frame_rate.to_string())
            .args(&config.extra_args)
            .arg(&output)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("launching decoder: {command:?}");

        let mut child = command
            .spawn()
            .with_context(|| format!("failed to launch decoder '{}'", config.program))?;

        let input = child.stdin.take().context("decoder has no stdin")?;

        info!(
            "decoder running (pid {:?}), writing to {}",
            child.id(),
            output.display()
        );

        Ok((Self { child }, input))
    }
}

/// Watches the decoder process: relays its diagnostics to the log, reports
/// when it exits and kills it on shutdown. The decoder exiting is not fatal;
/// the sink will log the failed writes that follow.
pub struct DecoderTask {
    decoder: Decoder,
}

pub fn create_task(decoder: Decoder) -> DecoderTask {
    DecoderTask { decoder }
}

#[async_trait]
impl Task for DecoderTask {
    fn name(&self) -> &'static str {
        "video/decoder"
    }

    async fn run(self: Box<Self>, cancel: CancellationToken) -> anyhow::Result<()> {
        let Decoder { mut child } = self.decoder;

        let stderr = child.stderr.take();

        let log_loop = async move {
            if let Some(stderr) = stderr {
                let mut lines = BufReader::new(stderr).lines();

                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("decoder: {line}");
                }
            }

            std::future::pending::<()>().await
        };

        let cancelled = select! {
            _ = cancel.cancelled() => true,
            status = child.wait() => {
                match status {
                    Ok(status) => warn!("decoder exited ({status})"),
                    Err(err) => warn!("failed to wait for decoder: {err}"),
                }
                false
            }
            _ = log_loop => false,
        };

        if cancelled {
            debug!("stopping decoder");

            if let Err(err) = child.kill().await {
                warn!("failed to kill decoder: {err}");
            }
        }

        Ok(())
    }
}
