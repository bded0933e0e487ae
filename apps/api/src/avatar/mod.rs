// Avatar coach: session lifecycle, status fan-out and the browser WebSocket.
pub mod broker;
pub mod handlers;
pub mod hub;
pub mod store;
pub mod ws;
