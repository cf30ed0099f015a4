//! Long-polling side of the courier: the review API client, the error
//! classifier and the watcher loop that ties them to a notification sink.

pub mod classifier;
pub mod client;
pub mod poller;

pub use classifier::ErrorClassifier;
pub use client::{ReviewApiClient, ReviewSource};
pub use poller::{Outcome, ReviewWatcher, WatcherStats};
