//! Name → handler registry with a textual error protocol.

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, error, warn};

use crate::error::RegistryError;

/// Response sent when the requested command name is missing or blank.
pub const BLANK_NAME_RESPONSE: &str = "Command name cannot be null or blank";

/// Response sent when no handler is registered under the requested name.
pub const NOT_FOUND_RESPONSE: &str = "Command name not found";

/// Error type a handler may fail with.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

type Handler = Box<dyn Fn() -> Result<String, HandlerError> + Send + Sync>;

/// Outcome of dispatching one command.
///
/// Every variant renders to the text sent back to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// The handler produced a response.
    Completed(String),
    /// The name was missing, empty or whitespace only.
    BlankName,
    /// No handler is registered under the case-folded name.
    NotFound(String),
    /// The handler failed or panicked.
    HandlerFault { command: String, message: String },
}

impl Dispatch {
    /// Whether a handler ran to completion.
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Render the wire response.
    pub fn into_response(self) -> String {
        match self {
            Self::Completed(text) => text,
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Dispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed(text) => f.write_str(text),
            Self::BlankName => f.write_str(BLANK_NAME_RESPONSE),
            Self::NotFound(_) => f.write_str(NOT_FOUND_RESPONSE),
            Self::HandlerFault { message, .. } => write!(f, "Error: {message}"),
        }
    }
}

/// Registry mapping lowercase command names to zero-argument handlers.
///
/// Registration takes `&mut self` and dispatch takes `&self`; once the
/// dispatcher is shared behind an `Arc` it is read-only.
#[derive(Default)]
pub struct CommandDispatcher {
    handlers: HashMap<String, Handler>,
}

impl CommandDispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`, case-folded to lowercase.
    pub fn register<F, E>(&mut self, name: &str, handler: F) -> Result<(), RegistryError>
    where
        F: Fn() -> Result<String, E> + Send + Sync + 'static,
        E: Into<HandlerError>,
    {
        if name.trim().is_empty() {
            error!("{BLANK_NAME_RESPONSE}");
            return Err(RegistryError::InvalidName);
        }

        let key = name.to_lowercase();
        if self.handlers.contains_key(&key) {
            return Err(RegistryError::Duplicate(key));
        }

        debug!(command = %key, "registered command");
        self.handlers
            .insert(key, Box::new(move || handler().map_err(Into::into)));
        Ok(())
    }

    /// Dispatch `name` and report the tagged outcome.
    pub fn dispatch(&self, name: Option<&str>) -> Dispatch {
        debug!(command = name.unwrap_or("null"), "execute command");

        let Some(name) = name.filter(|name| !name.trim().is_empty()) else {
            warn!("{BLANK_NAME_RESPONSE}");
            return Dispatch::BlankName;
        };

        let key = name.to_lowercase();
        let Some(handler) = self.handlers.get(&key) else {
            warn!(command = %key, "{NOT_FOUND_RESPONSE}");
            return Dispatch::NotFound(key);
        };

        match catch_unwind(AssertUnwindSafe(|| handler())) {
            Ok(Ok(text)) => {
                debug!(command = %key, len = text.len(), "command completed");
                Dispatch::Completed(text)
            }
            Ok(Err(err)) => {
                error!(command = %key, error = %err, "command failed");
                Dispatch::HandlerFault {
                    command: key,
                    message: err.to_string(),
                }
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(command = %key, error = %message, "command panicked");
                Dispatch::HandlerFault {
                    command: key,
                    message,
                }
            }
        }
    }

    /// Dispatch `name` and render the response text. Never fails.
    pub fn execute(&self, name: Option<&str>) -> String {
        self.dispatch(name).into_response()
    }

    /// Registered command names, sorted.
    pub fn commands(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered commands.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no command is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("commands", &self.commands())
            .finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "command handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    fn echo_dispatcher() -> CommandDispatcher {
        let mut dispatcher = CommandDispatcher::new();
        dispatcher
            .register("Echo", || Ok::<_, Infallible>("Echo".to_string()))
            .unwrap();
        dispatcher
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let dispatcher = echo_dispatcher();

        assert_eq!(dispatcher.execute(Some("ECHO")), "Echo");
        assert_eq!(dispatcher.execute(Some("echo")), "Echo");
        assert_eq!(dispatcher.execute(Some("eChO")), "Echo");
        assert_eq!(dispatcher.commands(), vec!["echo"]);
    }

    #[test]
    fn unknown_command_is_reported_as_text() {
        let dispatcher = echo_dispatcher();

        assert_eq!(dispatcher.execute(Some("nope")), "Command name not found");
        assert_eq!(
            dispatcher.dispatch(Some("NOPE")),
            Dispatch::NotFound("nope".to_string())
        );
    }

    #[test]
    fn name_is_not_trimmed_for_lookup() {
        let dispatcher = echo_dispatcher();
        assert_eq!(dispatcher.execute(Some(" echo")), NOT_FOUND_RESPONSE);
    }

    #[test]
    fn blank_command_is_reported_as_text() {
        let dispatcher = echo_dispatcher();

        for name in [None, Some(""), Some("   "), Some("\t\n")] {
            assert_eq!(
                dispatcher.execute(name),
                "Command name cannot be null or blank"
            );
        }
        assert_eq!(dispatcher.dispatch(None), Dispatch::BlankName);
    }

    #[test]
    fn failing_handler_becomes_error_text() {
        let mut dispatcher = echo_dispatcher();
        dispatcher
            .register("broken", || Err::<String, _>("disk on fire"))
            .unwrap();

        let outcome = dispatcher.dispatch(Some("broken"));
        assert!(!outcome.is_completed());
        assert_eq!(outcome.into_response(), "Error: disk on fire");

        // The dispatcher keeps working after a fault.
        assert_eq!(dispatcher.execute(Some("echo")), "Echo");
    }

    #[test]
    fn panicking_handler_becomes_error_text() {
        let mut dispatcher = CommandDispatcher::new();
        dispatcher
            .register("explode", || -> Result<String, Infallible> {
                panic!("boom")
            })
            .unwrap();

        assert_eq!(dispatcher.execute(Some("explode")), "Error: boom");
        assert_eq!(dispatcher.execute(Some("explode")), "Error: boom");
    }

    #[test]
    fn handler_error_types_are_converted() {
        let mut dispatcher = CommandDispatcher::new();
        dispatcher
            .register("io", || {
                Err::<String, _>(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no such file",
                ))
            })
            .unwrap();

        assert_eq!(dispatcher.execute(Some("io")), "Error: no such file");
    }

    #[test]
    fn register_rejects_blank_names() {
        let mut dispatcher = CommandDispatcher::new();
        for name in ["", "  ", "\t"] {
            let err = dispatcher
                .register(name, || Ok::<_, Infallible>(String::new()))
                .unwrap_err();
            assert!(matches!(err, RegistryError::InvalidName));
        }
        assert!(dispatcher.is_empty());
    }

    #[test]
    fn register_rejects_duplicates_after_folding() {
        let mut dispatcher = echo_dispatcher();
        let err = dispatcher
            .register("ECHO", || Ok::<_, Infallible>("other".to_string()))
            .unwrap_err();

        assert!(matches!(err, RegistryError::Duplicate(name) if name == "echo"));
        assert_eq!(dispatcher.execute(Some("echo")), "Echo");
        assert_eq!(dispatcher.len(), 1);
    }

    #[test]
    fn handlers_run_once_per_dispatch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut dispatcher = CommandDispatcher::new();
        dispatcher
            .register("count", move || {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                Ok::<_, Infallible>(n.to_string())
            })
            .unwrap();

        assert_eq!(dispatcher.execute(Some("count")), "1");
        assert_eq!(dispatcher.execute(Some("COUNT")), "2");
        assert_eq!(dispatcher.execute(Some("missing")), NOT_FOUND_RESPONSE);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn debug_lists_commands() {
        let dispatcher = echo_dispatcher();
        assert_eq!(
            format!("{dispatcher:?}"),
            "CommandDispatcher { commands: [\"echo\"] }"
        );
    }
}
