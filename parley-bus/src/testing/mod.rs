// ABOUTME: Test fixtures for code that drives a TransportHandle.
// ABOUTME: Pair FakeRelay with MockBus to script whole relay conversations.

pub mod fake_relay;

pub use fake_relay::FakeRelay;
