//! Realtime layer: push transport, frame decoding and event dispatch.

pub mod connectivity;
pub mod dispatcher;
pub mod frame;
pub mod transport;
