use anyhow::Context;
use async_trait::async_trait;
use ds_scheduler::Handler;
use ds_types::VideoPacket;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::*;

/// Streams video packets into the decoder's input, one write per packet, in
/// the order they arrive. There is no buffering beyond the pipe itself, so a
/// decoder that stops reading stalls the relay.
pub struct FrameSink<W> {
    input: W,
    written: u64,
    dropped: u64,
}

impl<W: AsyncWrite + Unpin + Send + 'static> FrameSink<W> {
    pub fn new(input: W) -> Self {
        Self {
            input,
            written: 0,
            dropped: 0,
        }
    }

    pub async fn relay(&mut self, packet: &VideoPacket) -> std::io::Result<()> {
        self.input.write_all(packet.as_bytes()).await
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send + 'static> Handler<VideoPacket> for FrameSink<W> {
    async fn handle(&mut self, packet: VideoPacket) -> anyhow::Result<()> {
        match self.relay(&packet).await {
            Ok(()) => {
                self.written += 1;
                trace!("relayed {} byte packet to decoder", packet.len());
                Ok(())
            }
            Err(err) => {
                self.dropped += 1;
                Err(err).with_context(|| {
                    format!(
                        "dropped {} byte video packet ({} dropped so far)",
                        packet.len(),
                        self.dropped
                    )
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        pin::Pin,
        sync::{Arc, Mutex},
        task::{Context as TaskContext, Poll},
        time::Duration,
    };

    use ds_scheduler::Scheduler;
    use tokio_util::sync::CancellationToken;

    use super::*;

    /// Records every write; fails the writes whose index is in `fail_on`.
    #[derive(Default)]
    struct FlakyPipe {
        writes: Arc<Mutex<Vec<Vec<u8>>>>,
        calls: usize,
        fail_on: Vec<usize>,
    }

    impl AsyncWrite for FlakyPipe {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _: &mut TaskContext<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            let call = self.calls;
            self.calls += 1;

            if self.fail_on.contains(&call) {
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "decoder went away",
                )));
            }

            self.writes.lock().unwrap().push(buf.to_vec());
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut TaskContext<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _: &mut TaskContext<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn packet(n: u8) -> VideoPacket {
        VideoPacket::from(vec![n; 4])
    }

    #[tokio::test]
    async fn writes_each_packet_in_order() {
        let pipe = FlakyPipe::default();
        let writes = pipe.writes.clone();
        let mut sink = FrameSink::new(pipe);

        for n in 0..10 {
            sink.handle(packet(n)).await.unwrap();
        }

        let writes = writes.lock().unwrap();
        assert_eq!(writes.len(), 10);
        for (n, write) in writes.iter().enumerate() {
            assert_eq!(write, &vec![n as u8; 4]);
        }
        assert_eq!(sink.written(), 10);
    }

    #[tokio::test]
    async fn duplicate_packets_are_written_twice() {
        let pipe = FlakyPipe::default();
        let writes = pipe.writes.clone();
        let mut sink = FrameSink::new(pipe);

        sink.handle(packet(7)).await.unwrap();
        sink.handle(packet(7)).await.unwrap();

        assert_eq!(*writes.lock().unwrap(), vec![vec![7; 4], vec![7; 4]]);
    }

    #[tokio::test]
    async fn failed_write_does_not_stop_the_relay() {
        let pipe = FlakyPipe {
            fail_on: vec![1],
            ..Default::default()
        };
        let writes = pipe.writes.clone();
        let mut sink = FrameSink::new(pipe);

        assert!(sink.handle(packet(0)).await.is_ok());
        assert!(sink.handle(packet(1)).await.is_err());
        assert!(sink.handle(packet(2)).await.is_ok());

        assert_eq!(*writes.lock().unwrap(), vec![vec![0; 4], vec![2; 4]]);
        assert_eq!(sink.written(), 2);
        assert_eq!(sink.dropped(), 1);
    }

    #[tokio::test]
    async fn relays_packets_delivered_by_the_scheduler() {
        let pipe = FlakyPipe {
            fail_on: vec![3],
            ..Default::default()
        };
        let writes = pipe.writes.clone();
        let scheduler = Scheduler::new(CancellationToken::new());
        let (video_tx, video_rx) = flume::unbounded();

        scheduler.listen("video/sink", video_rx, FrameSink::new(pipe));

        for n in 0..50 {
            video_tx.send_async(packet(n)).await.unwrap();
        }

        tokio::time::timeout(Duration::from_secs(5), async {
            while writes.lock().unwrap().len() < 49 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let expected: Vec<Vec<u8>> = (0..50).filter(|n| *n != 3).map(|n| vec![n; 4]).collect();
        assert_eq!(*writes.lock().unwrap(), expected);

        scheduler.stop();
    }
}
