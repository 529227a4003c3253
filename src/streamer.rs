//! The transmission loop: discover, connect, stream, close.

use crate::config::StreamConfig;
use crate::error::{Result, SystemError};
use crate::metrics::{MetricsProvider, SystemCollector};
use crate::serial::{discovery, LineSink, SerialLink};
use serde::Serialize;
use std::future::Future;
use tracing::{debug, error, info};

/// Where the link is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LinkState {
    Discovering,
    Connecting,
    Streaming,
    Closed,
}

/// Counters kept while streaming.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreamStats {
    /// Lines written successfully
    pub lines_sent: u64,
    /// Iterations that failed to collect or write
    pub errors: u64,
}

/// Streams samples from a provider into a sink until shut down.
pub struct Streamer<P, S> {
    provider: P,
    sink: Option<S>,
    config: StreamConfig,
    state: LinkState,
    stats: StreamStats,
}

impl<P, S> Streamer<P, S>
where
    P: MetricsProvider,
    S: LineSink,
{
    /// Create a streamer over an already connected sink.
    pub fn new(provider: P, sink: S, config: StreamConfig) -> Self {
        Self {
            provider,
            sink: Some(sink),
            config,
            state: LinkState::Streaming,
            stats: StreamStats::default(),
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    fn set_state(&mut self, next: LinkState) {
        debug!(from = ?self.state, to = ?next, "link state");
        self.state = next;
    }

    /// Collect one sample and write it. Errors are returned, not handled.
    pub async fn step(&mut self) -> Result<()> {
        let sample = self.provider.collect_sample().await?;
        let line = sample.to_line();

        let sink = self
            .sink
            .as_mut()
            .ok_or_else(|| SystemError::system_error("serial link already closed"))?;
        sink.write_line(&line).await?;

        debug!(line = line.trim_end(), "sent");
        Ok(())
    }

    /// Stream until `shutdown` resolves, then close the sink.
    ///
    /// `shutdown` is polled once before the first sample, so a signal
    /// listener behind it is installed before any work starts. After that it
    /// is only observed while waiting between iterations, so a line is never
    /// cut off halfway through a write. A terminal error also ends the loop.
    pub async fn run_until<F>(mut self, shutdown: F) -> StreamStats
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let mut stopping = tokio::select! {
            biased;
            _ = &mut shutdown => true,
            _ = std::future::ready(()) => false,
        };

        while !stopping && self.state == LinkState::Streaming {
            let pause = match self.step().await {
                Ok(()) => {
                    self.stats.lines_sent += 1;
                    self.config.interval()
                }
                Err(err) if err.is_terminal() => {
                    self.stats.errors += 1;
                    error!(error = %err, "unrecoverable error; closing link");
                    break;
                }
                Err(err) => {
                    self.stats.errors += 1;
                    error!(error = %err, "iteration failed; pausing before retry");
                    self.config.error_pause()
                }
            };

            stopping = tokio::select! {
                biased;
                _ = &mut shutdown => true,
                _ = tokio::time::sleep(pause) => false,
            };
        }

        if stopping {
            info!("shutdown requested");
        }
        self.close().await;
        self.stats
    }

    /// Close the sink if it is still open; errors are logged and dropped.
    async fn close(&mut self) {
        if let Some(sink) = self.sink.take() {
            if let Err(err) = sink.close().await {
                debug!(error = %err, "error while closing serial link ignored");
            }
        }
        self.set_state(LinkState::Closed);
    }
}

impl<P> Streamer<P, SerialLink>
where
    P: MetricsProvider,
{
    /// Create a streamer that still has to find and open its serial port.
    pub fn discovering(provider: P, config: StreamConfig) -> Self {
        Self {
            provider,
            sink: None,
            config,
            state: LinkState::Discovering,
            stats: StreamStats::default(),
        }
    }

    /// Resolve the port and open it. On failure the state stays where it
    /// failed.
    pub async fn connect(&mut self) -> Result<()> {
        let port = resolve_port(&self.config)?;

        self.set_state(LinkState::Connecting);
        info!(port = %port, baud = self.config.baud_rate, "connecting");
        let link = SerialLink::open(&port, &self.config).await?;

        self.sink = Some(link);
        self.set_state(LinkState::Streaming);
        Ok(())
    }

    /// Device path of the open link.
    pub fn port(&self) -> Option<&str> {
        self.sink.as_ref().map(SerialLink::port)
    }
}

/// Resolve the device path: the configured port, or discovery.
pub fn resolve_port(config: &StreamConfig) -> Result<String> {
    if let Some(port) = &config.port {
        info!(port = %port, "using configured port");
        return Ok(port.clone());
    }

    let ports = discovery::list_ports()?;
    discovery::find_device(&ports, &config.keywords).ok_or(SystemError::DeviceNotFound {
        available: ports.len(),
    })
}

/// Resolves once Ctrl-C is received. Never resolves if listening fails.
async fn ctrl_c_pressed() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

/// Discover the device, connect, and stream until Ctrl-C.
pub async fn run(config: StreamConfig) -> Result<StreamStats> {
    config.validate()?;

    let collector = SystemCollector::new()?;
    let mut streamer = Streamer::discovering(collector, config);
    streamer.connect().await?;

    info!(
        port = streamer.port().unwrap_or_default(),
        interval_ms = streamer.config.interval_ms,
        "streaming metrics; press Ctrl-C to stop"
    );

    let stats = streamer.run_until(ctrl_c_pressed()).await;

    info!(
        lines_sent = stats.lines_sent,
        errors = stats.errors,
        "serial link closed"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Sample;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::Notify;

    fn fixed_sample() -> Sample {
        Sample {
            timestamp: 1,
            cpu_percent: 12.34,
            ram_percent: 56.7,
            disk_percent: 0.0,
            temp_celsius: -1.0,
            gpu_percent: -1.0,
        }
    }

    /// Fails on the listed call numbers (1-based), otherwise returns a fixed sample.
    struct FlakyProvider {
        calls: Arc<AtomicUsize>,
        fail_on: Vec<usize>,
    }

    impl MetricsProvider for FlakyProvider {
        async fn collect_sample(&mut self) -> Result<Sample> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on.contains(&call) {
                return Err(SystemError::sensor_error("injected failure"));
            }
            Ok(fixed_sample())
        }
    }

    /// Always fails with an error that cannot be retried.
    struct MisconfiguredProvider {
        calls: Arc<AtomicUsize>,
    }

    impl MetricsProvider for MisconfiguredProvider {
        async fn collect_sample(&mut self) -> Result<Sample> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(SystemError::config_error("no usable sensors"))
        }
    }

    /// Interrupts its own process while taking the first sample.
    #[cfg(unix)]
    struct InterruptingProvider;

    #[cfg(unix)]
    impl MetricsProvider for InterruptingProvider {
        async fn collect_sample(&mut self) -> Result<Sample> {
            let status = std::process::Command::new("kill")
                .args(["-INT", &std::process::id().to_string()])
                .status()?;
            assert!(status.success());
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(fixed_sample())
        }
    }

    /// Records lines and close calls; signals `done` after `stop_after` lines.
    #[derive(Clone)]
    struct RecordingSink {
        lines: Arc<Mutex<Vec<String>>>,
        closes: Arc<AtomicUsize>,
        done: Arc<Notify>,
        stop_after: usize,
    }

    impl RecordingSink {
        fn new(stop_after: usize) -> Self {
            Self {
                lines: Arc::new(Mutex::new(Vec::new())),
                closes: Arc::new(AtomicUsize::new(0)),
                done: Arc::new(Notify::new()),
                stop_after,
            }
        }
    }

    impl LineSink for RecordingSink {
        async fn write_line(&mut self, line: &str) -> Result<()> {
            let count = {
                let mut lines = self.lines.lock().unwrap();
                lines.push(line.to_string());
                lines.len()
            };
            if count >= self.stop_after {
                self.done.notify_one();
            }
            Ok(())
        }

        async fn close(self) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Err(SystemError::system_error("close errors are swallowed"))
        }
    }

    fn fast_config() -> StreamConfig {
        StreamConfig::default().with_interval(1).with_error_pause(1)
    }

    #[tokio::test]
    async fn test_loop_survives_collection_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = FlakyProvider {
            calls: calls.clone(),
            fail_on: vec![2],
        };
        let sink = RecordingSink::new(3);
        let done = sink.done.clone();

        let stats = Streamer::new(provider, sink.clone(), fast_config())
            .run_until(async move { done.notified().await })
            .await;

        assert_eq!(stats.errors, 1);
        assert_eq!(stats.lines_sent, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        let lines = sink.lines.lock().unwrap();
        assert!(lines.iter().all(|l| l == "12.3,56.7,0.0,0.0,0.0\n"));
    }

    #[tokio::test]
    async fn test_shutdown_closes_once() {
        let provider = FlakyProvider {
            calls: Arc::new(AtomicUsize::new(0)),
            fail_on: Vec::new(),
        };
        let sink = RecordingSink::new(1);
        let done = sink.done.clone();

        let stats = Streamer::new(provider, sink.clone(), fast_config())
            .run_until(async move { done.notified().await })
            .await;

        assert!(stats.lines_sent >= 1);
        assert_eq!(sink.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_terminal_error_stops_loop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = MisconfiguredProvider {
            calls: calls.clone(),
        };
        let sink = RecordingSink::new(usize::MAX);

        let stats = tokio::time::timeout(
            Duration::from_secs(5),
            Streamer::new(provider, sink.clone(), fast_config())
                .run_until(std::future::pending::<()>()),
        )
        .await
        .expect("loop should stop on its own");

        assert_eq!(stats, StreamStats { lines_sent: 0, errors: 1 });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(sink.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_shutdown_before_start_sends_nothing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = FlakyProvider {
            calls: calls.clone(),
            fail_on: Vec::new(),
        };
        let sink = RecordingSink::new(usize::MAX);

        let stats = Streamer::new(provider, sink.clone(), fast_config())
            .run_until(std::future::ready(()))
            .await;

        assert_eq!(stats, StreamStats::default());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(sink.closes.load(Ordering::SeqCst), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_interrupt_during_first_sample_closes_link() {
        let sink = RecordingSink::new(usize::MAX);
        let config = StreamConfig::default().with_interval(60_000);

        let stats = tokio::time::timeout(
            Duration::from_secs(10),
            Streamer::new(InterruptingProvider, sink.clone(), config).run_until(async {
                tokio::signal::ctrl_c().await.unwrap();
            }),
        )
        .await
        .expect("Ctrl-C should end the loop");

        assert_eq!(stats.lines_sent, 1);
        assert_eq!(sink.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_connect_failure_keeps_state() {
        let provider = FlakyProvider {
            calls: Arc::new(AtomicUsize::new(0)),
            fail_on: Vec::new(),
        };
        let config = StreamConfig::default()
            .with_port(Some("/nonexistent/pc_meter_tty".to_string()))
            .with_settle_delay(0);
        let mut streamer = Streamer::discovering(provider, config);
        assert_eq!(streamer.state(), LinkState::Discovering);
        assert_eq!(streamer.port(), None);

        let result = streamer.connect().await;
        assert!(matches!(result, Err(SystemError::Connection { .. })));
        assert_eq!(streamer.state(), LinkState::Connecting);

        let stats = streamer.run_until(std::future::pending::<()>()).await;
        assert_eq!(stats, StreamStats::default());
    }

    #[tokio::test]
    async fn test_step_writes_one_line() {
        let provider = FlakyProvider {
            calls: Arc::new(AtomicUsize::new(0)),
            fail_on: Vec::new(),
        };
        let sink = RecordingSink::new(usize::MAX);
        let mut streamer = Streamer::new(provider, sink.clone(), fast_config());

        assert_eq!(streamer.state(), LinkState::Streaming);
        tokio_test::assert_ok!(streamer.step().await);
        streamer.close().await;
        assert_eq!(streamer.state(), LinkState::Closed);
        tokio_test::assert_err!(streamer.step().await);
        assert_eq!(sink.lines.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_resolve_configured_port() {
        let config = StreamConfig::default().with_port(Some("/dev/ttyUSB7".to_string()));
        assert_eq!(resolve_port(&config).unwrap(), "/dev/ttyUSB7");
    }

    #[tokio::test]
    async fn test_run_rejects_invalid_config() {
        let result = run(StreamConfig::default().with_baud_rate(0)).await;
        assert!(matches!(result, Err(SystemError::Config(_))));
    }
}
