// Vidra Infra System - system monitoring adapters

mod system_probe_impl;

pub use system_probe_impl::SystemProbeImpl;
