//! Relay service core logic.
//!
//! Drives an [`ExportPipeline`] from a fixed-rate tick loop over a
//! synthetic [`TestPatternSurface`], or runs the matching UDP receiver.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use framecast_core::{
    ExportError, ExportPipeline, ExportStats, FrameReceiver, FrameSink, JsonLineSink, NullSink,
    TestPatternSurface, UdpFrameSink,
};

use crate::config::{RelayConfig, SinkKind};

/// Boxed sink so one pipeline type serves every configured transport.
pub type DynSink = Box<dyn FrameSink + Send>;

// ── RelayService ─────────────────────────────────────────────────

/// The top-level relay.
pub struct RelayService {
    config: RelayConfig,
    running: Arc<AtomicBool>,
}

impl RelayService {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle that stops the loop when set to `false`.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Build the configured sink.
    pub fn build_sink(&self) -> Result<DynSink, ExportError> {
        self.config.validate()?;
        let sink: DynSink = match self.config.sink.kind {
            SinkKind::Udp => {
                let remote = self.config.remote_addr()?;
                let udp = UdpFrameSink::bind(self.config.sink.bind.as_str(), remote)?
                    .with_mtu(self.config.sink.mtu)?;
                info!("UDP sink → {remote}");
                Box::new(udp)
            }
            SinkKind::Stdout => Box::new(JsonLineSink::spawn(std::io::stdout())?),
            SinkKind::Null => Box::new(NullSink::default()),
        };
        Ok(sink)
    }

    /// Run the export loop until stopped or `max_ticks` ticks have run.
    pub async fn run(&self, max_ticks: Option<u64>) -> Result<ExportStats, ExportError> {
        self.running.store(true, Ordering::SeqCst);

        let sink = self.build_sink()?;
        let mut pipeline = ExportPipeline::new(self.config.to_pipeline_config(), sink);
        let mut surface =
            TestPatternSurface::new(self.config.source.width, self.config.source.height);

        let mut ticker = tokio::time::interval(self.config.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let stats_every = Duration::from_secs(self.config.logging.stats_interval_secs);
        let mut last_report = Instant::now();
        let mut reported = ExportStats::default();

        info!(
            strategy = ?pipeline.strategy(),
            skip = self.config.to_pipeline_config().frame_skip.get(),
            "export loop started"
        );

        while self.running.load(Ordering::SeqCst) {
            if max_ticks.is_some_and(|max| pipeline.stats().ticks >= max) {
                break;
            }
            ticker.tick().await;

            surface.advance();
            let outcome = pipeline.export_tick(&mut surface);
            debug!(?outcome, "tick");

            if !stats_every.is_zero() && last_report.elapsed() >= stats_every {
                let now = pipeline.stats();
                report(&reported, &now, last_report.elapsed());
                reported = now;
                last_report = Instant::now();
            }
        }

        let stats = pipeline.stats();
        info!(
            ticks = stats.ticks,
            exported = stats.exported,
            skipped = stats.skipped,
            dropped = stats.delivery_failures,
            reallocations = stats.reallocations,
            "export loop stopped"
        );
        Ok(stats)
    }

    /// Receive frames on `sink.listen` and log what arrives.
    pub async fn run_receiver(&self) -> Result<(), ExportError> {
        self.running.store(true, Ordering::SeqCst);

        let listen = self.config.listen_addr()?;
        let socket = UdpSocket::bind(listen).await?;
        let mut receiver = FrameReceiver::with_mtu(socket, self.config.sink.mtu);
        info!("receiving frames on {listen}");

        let mut frames = 0u64;
        let mut window_start = Instant::now();

        while self.running.load(Ordering::SeqCst) {
            let frame = tokio::select! {
                result = receiver.receive_frame() => result,
                _ = wait_for_stop(&self.running) => break,
            };

            let frame = match frame {
                Ok(f) => f,
                Err(e) => {
                    warn!("receive error: {e}");
                    continue;
                }
            };

            match frame.pixels() {
                Ok(pixels) => debug!(
                    seq = frame.sequence,
                    kind = frame.kind.as_str(),
                    dims = %frame.dimensions(),
                    bytes = pixels.len(),
                    "frame received"
                ),
                Err(e) => warn!(seq = frame.sequence, "undecodable frame: {e}"),
            }

            frames += 1;
            let elapsed = window_start.elapsed();
            if elapsed >= Duration::from_secs(1) {
                info!(
                    fps = frames as f64 / elapsed.as_secs_f64(),
                    abandoned = receiver.frames_abandoned(),
                    "receiver"
                );
                frames = 0;
                window_start = Instant::now();
            }
        }
        Ok(())
    }

    /// Signal the service to stop.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Log throughput since the previous report.
fn report(prev: &ExportStats, now: &ExportStats, elapsed: Duration) {
    let secs = elapsed.as_secs_f64().max(f64::EPSILON);
    info!(
        export_fps = (now.exported - prev.exported) as f64 / secs,
        tick_fps = (now.ticks - prev.ticks) as f64 / secs,
        skipped = now.skipped - prev.skipped,
        dropped = now.delivery_failures - prev.delivery_failures,
        "export stats"
    );
}

/// Resolve once the running flag is cleared.
async fn wait_for_stop(running: &AtomicBool) {
    while running.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn null_config() -> RelayConfig {
        let mut cfg = RelayConfig::default();
        cfg.sink.kind = SinkKind::Null;
        cfg.source.tick_hz = 240;
        cfg.source.width = 8;
        cfg.source.height = 8;
        cfg.logging.stats_interval_secs = 0;
        cfg
    }

    #[tokio::test]
    async fn bounded_run_honours_frame_skip() {
        let service = RelayService::new(null_config());
        let stats = service.run(Some(12)).await.unwrap();
        assert_eq!(stats.ticks, 12);
        assert_eq!(stats.exported, 3);
        assert_eq!(stats.throttled, 9);
    }

    #[tokio::test]
    async fn stop_handle_ends_run() {
        let service = RelayService::new(null_config());
        let handle = service.stop_handle();
        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            handle.store(false, Ordering::SeqCst);
        });
        let stats = service.run(None).await.unwrap();
        stopper.await.unwrap();
        assert!(stats.ticks > 0);
    }

    #[tokio::test]
    async fn invalid_combination_fails_to_start() {
        let mut cfg = null_config();
        cfg.sink.kind = SinkKind::Stdout;
        let service = RelayService::new(cfg);
        assert!(service.run(Some(1)).await.is_err());
    }

    #[tokio::test]
    async fn udp_export_reaches_receiver() {
        let receiver_sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut receiver = FrameReceiver::new(receiver_sock);

        let mut cfg = null_config();
        cfg.sink.kind = SinkKind::Udp;
        cfg.sink.bind = "127.0.0.1:0".into();
        cfg.sink.remote = receiver.local_addr().unwrap().to_string();
        cfg.pipeline.frame_skip = 1;

        let service = RelayService::new(cfg);
        let stats = service.run(Some(1)).await.unwrap();
        assert_eq!(stats.exported, 1);

        let frame = tokio::time::timeout(Duration::from_secs(5), receiver.receive_frame())
            .await
            .expect("timeout")
            .unwrap();
        assert_eq!(frame.payload.len(), 8 * 8 * 4);
    }
}
