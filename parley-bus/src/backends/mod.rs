// ABOUTME: Backend implementations (Socket.IO over WebSocket, mock).
// ABOUTME: Each backend implements the BusBackend trait.

pub mod mock;
pub mod socketio;

pub use socketio::SocketIoBackend;
