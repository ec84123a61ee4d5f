//! Asynchronous reachability probe.
//!
//! A probe resolves a host, tries a TCP connect to the configured port and,
//! when that fails, falls back to an ICMP echo. [`Dispatcher`] runs probes
//! on a shared tokio runtime and delivers each [`ProbeOutcome`] to a
//! callback without blocking the caller.

pub mod config;
pub mod dispatcher;
pub mod prober;

pub use config::{AppConfig, ProbeConfig};
pub use dispatcher::{DispatchFault, Dispatcher};
pub use prober::{
    HostResolver, IcmpReachability, OutcomeReport, ProbeError, ProbeMethod, ProbeOutcome, Prober,
    Reachability,
};
