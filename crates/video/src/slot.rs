use ds_types::DecodedFrame;
use flume::TrySendError;

/// A single-frame mailbox between the sampler and the inference worker.
/// Offering a frame replaces any frame the worker has not picked up yet, so
/// the worker always sees the newest sample and never falls behind.
#[derive(Clone)]
pub struct FrameSlot {
    tx: flume::Sender<DecodedFrame>,
    rx: flume::Receiver<DecodedFrame>,
}

impl FrameSlot {
    pub fn new() -> Self {
        let (tx, rx) = flume::bounded(1);
        Self { tx, rx }
    }

    /// Puts `frame` in the slot and returns the unread frame it replaced.
    pub fn offer(&self, frame: DecodedFrame) -> Option<DecodedFrame> {
        let superseded = self.rx.try_recv().ok();
        let mut frame = frame;

        loop {
            match self.tx.try_send(frame) {
                Ok(()) => break,
                // another producer filled the slot in between
                Err(TrySendError::Full(rejected)) => {
                    frame = rejected;
                    let _ = self.rx.try_recv();
                }
                // unreachable while this slot holds a receiver
                Err(TrySendError::Disconnected(_)) => break,
            }
        }

        superseded
    }

    /// Waits for the next frame.
    pub async fn take(&self) -> Option<DecodedFrame> {
        self.rx.recv_async().await.ok()
    }

    pub fn try_take(&self) -> Option<DecodedFrame> {
        self.rx.try_recv().ok()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Default for FrameSlot {
    fn default() -> Self {
        Self::new()
    }
}
