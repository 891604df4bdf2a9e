//! Recording assertion helpers
//!
//! Unlike `assert!`, these macros do not unwind on failure. They record an
//! assertion failure on the current test case and let it continue, unless
//! the case has `continue_after_failure` disabled, in which case the
//! failure ends the case through the controller.

use crate::context;
use crate::location::SourceLocation;

/// Record a failed check `description` on the current test case.
///
/// # Panics
///
/// Panics when no test case is executing on this thread.
pub fn record_check_failure(description: String, location: SourceLocation) {
    if let Err(err) = context::record_failure(description, location, true) {
        panic!("{err}");
    }
}

#[doc(hidden)]
pub fn with_message(base: String, message: Option<String>) -> String {
    match message {
        Some(message) if !message.is_empty() => format!("{base} - {message}"),
        _ => base,
    }
}

/// Check that a condition holds
#[macro_export]
macro_rules! check {
    ($cond:expr $(,)?) => {
        if !$cond {
            $crate::assertions::record_check_failure(
                format!("check failed: ({})", stringify!($cond)),
                $crate::SourceLocation::new(file!(), line!()),
            );
        }
    };
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            $crate::assertions::record_check_failure(
                $crate::assertions::with_message(
                    format!("check failed: ({})", stringify!($cond)),
                    Some(format!($($arg)+)),
                ),
                $crate::SourceLocation::new(file!(), line!()),
            );
        }
    };
}

/// Check that two values are equal
#[macro_export]
macro_rules! check_eq {
    (@inner $left:expr, $right:expr, $message:expr) => {
        match (&$left, &$right) {
            (left, right) => {
                if !(*left == *right) {
                    $crate::assertions::record_check_failure(
                        $crate::assertions::with_message(
                            format!("check_eq failed: ({:?}) is not equal to ({:?})", left, right),
                            $message,
                        ),
                        $crate::SourceLocation::new(file!(), line!()),
                    );
                }
            }
        }
    };
    ($left:expr, $right:expr $(,)?) => {
        $crate::check_eq!(@inner $left, $right, None)
    };
    ($left:expr, $right:expr, $($arg:tt)+) => {
        $crate::check_eq!(@inner $left, $right, Some(format!($($arg)+)))
    };
}

/// Check that two values differ
#[macro_export]
macro_rules! check_ne {
    (@inner $left:expr, $right:expr, $message:expr) => {
        match (&$left, &$right) {
            (left, right) => {
                if *left == *right {
                    $crate::assertions::record_check_failure(
                        $crate::assertions::with_message(
                            format!("check_ne failed: ({:?}) is equal to ({:?})", left, right),
                            $message,
                        ),
                        $crate::SourceLocation::new(file!(), line!()),
                    );
                }
            }
        }
    };
    ($left:expr, $right:expr $(,)?) => {
        $crate::check_ne!(@inner $left, $right, None)
    };
    ($left:expr, $right:expr, $($arg:tt)+) => {
        $crate::check_ne!(@inner $left, $right, Some(format!($($arg)+)))
    };
}

/// Record an unconditional failure
#[macro_export]
macro_rules! fail {
    () => {
        $crate::assertions::record_check_failure(
            "failed".to_string(),
            $crate::SourceLocation::new(file!(), line!()),
        )
    };
    ($($arg:tt)+) => {
        $crate::assertions::record_check_failure(
            $crate::assertions::with_message("failed".to_string(), Some(format!($($arg)+))),
            $crate::SourceLocation::new(file!(), line!()),
        )
    };
}
