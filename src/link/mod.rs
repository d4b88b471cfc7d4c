//! # Link Module
//!
//! Runs an MSP link in the background.
//!
//! Two workers on tokio's blocking pool share one [`state::LinkState`]:
//!
//! - The [`scheduler::TransmitScheduler`] sends pending commands, the RC
//!   frame and a sensor request, one phase per tick.
//! - The [`receiver::ReceiveLoop`] decodes inbound bytes and keeps the latest
//!   sensor report.
//!
//! Transport I/O is synchronous, so neither loop ever runs on an async worker
//! thread. The caller steers both through a [`control::ControlSurface`]. Both
//! loops check the shared watch channel once per iteration and exit when
//! [`MspLink::shutdown`] flips it.
//!
//! ```no_run
//! use msp_link::config::Config;
//! use msp_link::link::MspLink;
//! use msp_link::serial::SerialTransport;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::default();
//! let rx = SerialTransport::open(config.serial.baud_rate, config.serial.timeout())?;
//! let tx = rx.try_clone()?;
//!
//! let link = MspLink::start(&config, rx, tx);
//! link.control().arm();
//! println!("{:?}", link.control().telemetry().reading());
//!
//! link.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod control;
pub mod receiver;
pub mod scheduler;
pub mod state;

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::{self, JoinHandle};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{LinkError, Result};
use crate::serial::Transport;
use control::ControlSurface;
use receiver::ReceiveLoop;
use scheduler::TransmitScheduler;
use state::LinkState;

/// True once `shutdown` carries `true` or its sender is gone
pub(crate) fn stop_requested(shutdown: &watch::Receiver<bool>) -> bool {
    shutdown.has_changed().is_err() || *shutdown.borrow()
}

/// Handle to a running link
#[derive(Debug)]
pub struct MspLink {
    control: ControlSurface,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl MspLink {
    /// Start the receive loop on `rx` and the transmit scheduler on `tx`, each
    /// on its own blocking worker
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime
    pub fn start<R, W>(config: &Config, rx: R, tx: W) -> Self
    where
        R: Transport + 'static,
        W: Transport + 'static,
    {
        let state = Arc::new(LinkState::new());
        let (shutdown, shutdown_rx) = watch::channel(false);

        let receiver = ReceiveLoop::new(state.clone());
        let scheduler = TransmitScheduler::new(state.clone());

        let poll_interval = config.link.rx_poll_interval();
        let tick_interval = config.link.tick_interval();
        let receiver_shutdown = shutdown_rx.clone();

        let tasks = vec![
            task::spawn_blocking(move || receiver.run(rx, poll_interval, receiver_shutdown)),
            task::spawn_blocking(move || scheduler.run(tx, tick_interval, shutdown_rx)),
        ];

        info!("MSP link started");

        Self {
            control: ControlSurface::new(state, config.control.clone()),
            shutdown,
            tasks,
        }
    }

    pub fn control(&self) -> &ControlSurface {
        &self.control
    }

    /// True while both loops are still running
    pub fn is_running(&self) -> bool {
        self.tasks.iter().all(|task| !task.is_finished())
    }

    /// Stop both loops and wait for them to exit
    ///
    /// # Errors
    ///
    /// Returns error if a loop panicked
    pub async fn shutdown(self) -> Result<()> {
        // Receivers may already be gone if a loop died; that is fine here
        let _ = self.shutdown.send(true);

        let mut failure = None;
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("Link task ended abnormally: {}", e);
                failure.get_or_insert(LinkError::Task(e.to_string()));
            }
        }

        info!("MSP link stopped");
        failure.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msp::decoder::FrameDecoder;
    use crate::msp::encoder::encode_frame;
    use crate::msp::protocol::*;
    use crate::serial::mocks::LoopbackTransport;
    use std::io;
    use std::time::{Duration, Instant};

    /// Loopback whose writes hold the calling thread like a slow serial line
    struct SlowWriter {
        inner: LoopbackTransport,
        byte_time: Duration,
    }

    impl Transport for SlowWriter {
        fn byte_available(&mut self) -> io::Result<bool> {
            self.inner.byte_available()
        }

        fn read_byte(&mut self) -> io::Result<u8> {
            self.inner.read_byte()
        }

        fn write_byte(&mut self, byte: u8) -> io::Result<()> {
            std::thread::sleep(self.byte_time);
            self.inner.write_byte(byte)
        }
    }

    fn fast_config() -> Config {
        let mut config = Config::default();
        config.link.tick_interval_us = 1_000;
        config.link.rx_poll_interval_us = 500;
        config
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        for _ in 0..200 {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }

    fn sent_frames(bytes: &[u8]) -> Vec<MspFrame> {
        let mut decoder = FrameDecoder::with_direction(Direction::Request);
        bytes.iter().filter_map(|&b| decoder.feed(b)).collect()
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let link = MspLink::start(&fast_config(), LoopbackTransport::new(), LoopbackTransport::new());
        assert!(link.is_running());
        tokio_test::assert_ok!(link.shutdown().await);
    }

    #[tokio::test]
    async fn test_end_to_end() {
        let rx = LoopbackTransport::new();
        let tx = LoopbackTransport::new();
        let link = MspLink::start(&fast_config(), rx.clone(), tx.clone());

        link.control().arm();
        link.control().right();
        link.control().set_throttle(60);

        let report: Vec<u8> = (1..=18).collect();
        rx.inject_rx_data(&encode_frame(Direction::Response, MSP_SENSORS, &report).unwrap());

        let control = link.control().clone();
        assert!(wait_for(|| control.stats().telemetry_updates == 1).await);
        assert_eq!(&link.control().telemetry().as_bytes()[..], &report[..]);

        // The loops run on their own threads, so early RC frames may predate the
        // setters above
        assert!(wait_for(|| {
            let frames = sent_frames(&tx.written());
            frames.iter().any(|f| f.command == MSP_SENSORS)
                && frames
                    .iter()
                    .any(|f| f.command == MSP_SET_TINY_RC && f.payload == vec![137, 125, 125, 60, 0])
        })
        .await);

        link.shutdown().await.unwrap();

        let frames = sent_frames(&tx.written());
        let arms = frames.iter().filter(|f| f.command == MSP_ARM).count();
        assert_eq!(arms, 1);

        let last_rc = frames.iter().rev().find(|f| f.command == MSP_SET_TINY_RC).unwrap();
        assert_eq!(last_rc.payload, vec![137, 125, 125, 60, 0]);
    }

    #[tokio::test]
    async fn test_control_outlives_link() {
        let link = MspLink::start(&fast_config(), LoopbackTransport::new(), LoopbackTransport::new());
        let control = link.control().clone();
        link.shutdown().await.unwrap();

        // Setters keep working against the detached state
        control.set_throttle(5);
        assert_eq!(control.controls().throttle, 5);
    }

    #[test]
    fn test_stop_requested() {
        let (tx, rx) = watch::channel(false);
        assert!(!stop_requested(&rx));

        tx.send(true).unwrap();
        assert!(stop_requested(&rx));

        let (tx, rx) = watch::channel(false);
        drop(tx);
        assert!(stop_requested(&rx));
    }

    #[tokio::test]
    async fn test_blocking_writes_do_not_stall_runtime() {
        let tx = SlowWriter {
            inner: LoopbackTransport::new(),
            byte_time: Duration::from_millis(50),
        };
        let link = MspLink::start(&fast_config(), LoopbackTransport::new(), tx);

        // Single-threaded runtime: a write on an async worker would hold up these
        // timers for a whole RC frame (11 bytes, 550 ms)
        let started = Instant::now();
        for _ in 0..10 {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert!(started.elapsed() < Duration::from_millis(300), "{:?}", started.elapsed());

        tokio_test::assert_ok!(link.shutdown().await);
    }
}
