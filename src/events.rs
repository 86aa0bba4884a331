//! Event system for observing the generate loop.
//!
//! Provides an optional, non-intrusive way to observe a forge run.
//! The forge emits events as attempts start, replies arrive, and retries
//! are triggered. Users can implement [`EventHandler`] to receive these
//! events for logging or progress tracking.

use std::sync::Arc;

/// Events emitted during a `generate` call.
#[derive(Debug, Clone)]
pub enum Event {
    /// An attempt is starting (prompt about to be sent).
    AttemptStart {
        /// 1-based attempt index.
        attempt: u32,
        /// Total attempt budget (`max_retries + 1`).
        total: u32,
    },
    /// The provider returned a reply for this attempt.
    ResponseReceived {
        /// 1-based attempt index.
        attempt: u32,
        /// Length of the raw reply in characters.
        chars: usize,
        /// Number of candidate payloads located in the reply.
        candidates: usize,
    },
    /// The previous attempt failed validation and a corrective retry is
    /// being drafted.
    RetryStart {
        /// 1-based index of the attempt about to run.
        attempt: u32,
        /// The validation failure being echoed back to the model.
        reason: String,
    },
    /// The generate call has finished.
    GenerateEnd {
        /// Total attempts consumed.
        attempts: u32,
        /// Whether a typed value was derived.
        success: bool,
    },
}

/// Handler for generate lifecycle events.
///
/// Implement this trait to receive progress and retry signals during a
/// forge run. Entirely optional -- the forge works without a handler.
///
/// # Example
///
/// ```
/// use structforge::events::{Event, EventHandler};
///
/// struct PrintHandler;
///
/// impl EventHandler for PrintHandler {
///     fn on_event(&self, event: Event) {
///         match event {
///             Event::AttemptStart { attempt, total } => {
///                 println!("[attempt {}/{}]", attempt, total)
///             }
///             Event::RetryStart { reason, .. } => println!("[retry] {}", reason),
///             _ => {}
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    /// Called when the forge emits an event.
    fn on_event(&self, event: Event);
}

/// Emit an event if a handler is present. No-op otherwise.
pub(crate) fn emit(handler: &Option<Arc<dyn EventHandler>>, event: Event) {
    if let Some(ref h) = handler {
        h.on_event(event);
    }
}

/// An [`EventHandler`] backed by a closure.
///
/// # Example
///
/// ```
/// use structforge::events::{Event, FnEventHandler};
/// use std::sync::Arc;
///
/// let handler = Arc::new(FnEventHandler(|event: Event| {
///     if let Event::GenerateEnd { attempts, success } = event {
///         println!("done: {} attempts, success={}", attempts, success);
///     }
/// }));
/// ```
pub struct FnEventHandler<F: Fn(Event) + Send + Sync>(pub F);

impl<F: Fn(Event) + Send + Sync> EventHandler for FnEventHandler<F> {
    fn on_event(&self, event: Event) {
        (self.0)(event);
    }
}
