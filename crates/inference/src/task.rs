use async_trait::async_trait;
use ds_client::Task;
use ds_types::DecodedFrame;
use ds_video::FrameSlot;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::*;

use crate::{CommandDispatcher, InferenceClient};

/// The single inference worker. Frames arrive through a [`FrameSlot`], so at
/// most one request is in flight and a slow service only ever costs the
/// frames sampled while it was busy.
pub struct InferenceTask {
    client: InferenceClient,
    dispatcher: Box<dyn CommandDispatcher>,
    slot: FrameSlot,
}

pub fn create_task(client: InferenceClient, dispatcher: Box<dyn CommandDispatcher>) -> InferenceTask {
    InferenceTask {
        client,
        dispatcher,
        slot: FrameSlot::new(),
    }
}

impl InferenceTask {
    /// The slot the sampler should offer frames to.
    pub fn frames(&self) -> FrameSlot {
        self.slot.clone()
    }

    async fn process(&self, frame: DecodedFrame) {
        let response = match self.client.infer(&frame).await {
            Ok(response) => response,
            Err(err) => {
                warn!(
                    "inference for {} failed: {:#}",
                    frame.path.display(),
                    anyhow::Error::from(err)
                );
                return;
            }
        };

        if let Err(err) = self.dispatcher.dispatch(&response).await {
            warn!("could not act on inference reply '{}': {err:#}", response.trim());
        }
    }
}

#[async_trait]
impl Task for InferenceTask {
    fn name(&self) -> &'static str {
        "inference"
    }

    async fn run(self: Box<Self>, cancel: CancellationToken) -> anyhow::Result<()> {
        info!("posting frames to {}", self.client.endpoint());

        let loop_fut = async {
            while let Some(frame) = self.slot.take().await {
                self.process(frame).await;
            }

            Ok::<_, anyhow::Error>(())
        };

        select! {
          _ = cancel.cancelled() => {}
          res = loop_fut => { res? }
        };

        Ok(())
    }
}
