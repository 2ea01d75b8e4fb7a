//! Mock implementations for testing.
//!
//! Shared by unit tests and the integration suites. Each mock records its
//! calls and can be scripted to fail, so tests can pin retry counts,
//! fallback order, and best-effort semantics without real subprocesses or
//! network access.

mod mock_notifier;
mod mock_provider;
mod mock_resolver;

pub use mock_notifier::MockNotifier;
pub use mock_provider::MockProvider;
pub use mock_resolver::{MockResolver, NullResolver};
