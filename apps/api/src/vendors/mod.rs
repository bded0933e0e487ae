// Outbound vendor integrations. No other module talks to vendor HTTP APIs directly.

pub mod persona;
pub mod streaming;
