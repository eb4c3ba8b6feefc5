//! Application Layer
//!
//! Ports (the seams toward transports, exchanges, the outbound sink and
//! metrics) and the services that run the relay on top of them.

pub mod ports;
pub mod services;
