//! Error classifier: decides retry vs. abort for a failed long poll.
//!
//! | failure            | classification | delay |
//! |--------------------|----------------|-------|
//! | read timeout       | transient      | none  |
//! | connection failure | unknown        | 10s   |
//! | HTTP 401           | unauthorized   | abort |
//! | other HTTP status  | unknown        | 10s   |
//! | unparsable body    | malformed      | 5s    |
//! | anything else      | unknown        | 10s   |
//!
//! The polling loop handles read timeouts itself and never asks the
//! classifier about them; the mapping is still total.

use std::time::Duration;

use courier_common::config::RetryPolicy;
use courier_common::error::PollFailure;
use courier_common::types::ClassifiedError;

const UNAUTHORIZED: u16 = 401;

#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorClassifier {
    policy: RetryPolicy,
}

impl ErrorClassifier {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn classify(&self, failure: &PollFailure) -> ClassifiedError {
        match failure {
            PollFailure::ReadTimeout => ClassifiedError::Transient {
                retry_after: Duration::ZERO,
            },
            PollFailure::Status(UNAUTHORIZED) => ClassifiedError::Unauthorized,
            PollFailure::Malformed(_) => ClassifiedError::Malformed {
                retry_after: self.policy.malformed_delay,
            },
            PollFailure::Connection(_) | PollFailure::Status(_) | PollFailure::Other(_) => {
                ClassifiedError::Unknown {
                    retry_after: self.policy.unknown_delay,
                }
            }
        }
    }
}
