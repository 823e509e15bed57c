//! Frame Transport (C1): the WebSocket upgrade surface and the
//! per-connection read/write loop.

mod websocket;

pub use websocket::{build_app, serve};
