//! Shared test doubles for core integration tests.

pub mod adapters;
pub mod store;

#[allow(unused_imports)]
pub use adapters::StubAdapter;
#[allow(unused_imports)]
pub use store::MockQueueStore;
