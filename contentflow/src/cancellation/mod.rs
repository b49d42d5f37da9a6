//! Cooperative cancellation.
//!
//! A [`CancellationToken`] is shared between whoever may cancel a job (the
//! job service, an operator) and the code that must honour it (the retry
//! controller and the pipeline sequencer).

mod token;

pub use token::CancellationToken;
