use std::fmt::Write as _;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};

use anyhow::{Context, Result};
use log::info;

use crate::models::FrameOutcome;

pub const DEFAULT_TABLE: &str = "vision";
pub const OFFSET_KEY: &str = "pid_offset";
pub const VERTICAL_OFFSET_KEY: &str = "pid_offset_y";
pub const DISTANCE_KEY: &str = "distance";
pub const VISIBLE_KEY: &str = "target_visible";

/// One named value published for a frame
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: &'static str,
    pub value: f64,
}

/// Flatten a frame outcome into the values published on the telemetry table.
///
/// Visibility is always published; offsets and distance only when present.
pub fn entries(outcome: &FrameOutcome) -> Vec<Entry> {
    let mut out = Vec::with_capacity(4);
    match outcome {
        FrameOutcome::Detected(estimate) => {
            out.push(Entry { key: VISIBLE_KEY, value: 1.0 });
            out.push(Entry { key: OFFSET_KEY, value: estimate.offset_x });
            out.push(Entry { key: VERTICAL_OFFSET_KEY, value: estimate.offset_y });
            if let Some(distance) = estimate.distance {
                out.push(Entry { key: DISTANCE_KEY, value: distance });
            }
        }
        FrameOutcome::NoDetection(_) => {
            out.push(Entry { key: VISIBLE_KEY, value: 0.0 });
        }
    }
    out
}

/// Receives one publish per processed frame.
///
/// Publishing is fire-and-forget: an error is reported to the caller, which
/// logs it and keeps going.
pub trait TelemetrySink: Send {
    fn publish(&mut self, outcome: &FrameOutcome) -> Result<()>;
}

/// Publishes `table/key=value` lines in a single UDP datagram per frame
pub struct UdpTelemetry {
    socket: UdpSocket,
    target: SocketAddr,
    table: String,
}

impl UdpTelemetry {
    pub fn new(target: SocketAddr, table: impl Into<String>) -> Result<Self> {
        let bind_addr: SocketAddr = if target.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind_addr).context("Failed to bind telemetry socket")?;
        socket
            .set_nonblocking(true)
            .context("Failed to make telemetry socket non-blocking")?;

        Ok(Self {
            socket,
            target,
            table: table.into(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Text payload for one frame
    pub fn encode(&self, outcome: &FrameOutcome) -> String {
        let mut payload = String::new();
        for entry in entries(outcome) {
            let _ = writeln!(payload, "{}/{}={}", self.table, entry.key, entry.value);
        }
        payload
    }
}

impl TelemetrySink for UdpTelemetry {
    fn publish(&mut self, outcome: &FrameOutcome) -> Result<()> {
        let payload = self.encode(outcome);
        self.socket
            .send_to(payload.as_bytes(), self.target)
            .with_context(|| format!("Failed to publish telemetry to {}", self.target))?;
        Ok(())
    }
}

/// Writes each frame's result to the log instead of the network
#[derive(Debug, Default)]
pub struct LogTelemetry;

impl TelemetrySink for LogTelemetry {
    fn publish(&mut self, outcome: &FrameOutcome) -> Result<()> {
        match outcome {
            FrameOutcome::Detected(estimate) => match estimate.distance {
                Some(d) => info!("offset {:.1} px, distance {:.2}", estimate.offset_x, d),
                None => info!("offset {:.1} px, distance indeterminate", estimate.offset_x),
            },
            FrameOutcome::NoDetection(reason) => info!("no detection ({:?})", reason),
        }
        Ok(())
    }
}
