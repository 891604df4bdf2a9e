//! Expecta test execution engine
//!
//! Runs test cases through a set-up, body, tear-down lifecycle, records
//! their failures, and lets a test block until asynchronous conditions
//! ("expectations") are fulfilled within a time budget.
//!
//! # Usage
//!
//! ```rust,no_run
//! use expecta::TestCase;
//! use std::time::Duration;
//!
//! let mut case = TestCase::new("callback fires", |ctx| {
//!     let fired = ctx.expectation("callback invoked");
//!     let handle = fired.clone();
//!     std::thread::spawn(move || handle.fulfill());
//!     ctx.wait(&[fired], Duration::from_secs(1))?;
//!     Ok(())
//! });
//!
//! match case.run() {
//!     Ok(run) => assert!(run.has_succeeded()),
//!     Err(abort) => {
//!         eprintln!("{abort}");
//!         std::process::exit(1);
//!     }
//! }
//! ```

pub mod assertions;
pub mod case;
pub mod config;
pub mod context;
pub mod error;
pub mod expectation;
pub mod location;
pub mod registry;
pub mod run;
pub mod test_utils;
pub mod wait;

pub use case::{AbortReason, FatalAbort, TestCase, TestHook, TestState, Verdict};
pub use config::CaseConfig;
pub use context::{current, expectation, try_expectation, wait_for_expectations, TestContext};
pub use error::{ExpectaError, Result};
pub use expectation::{ContextId, Expectation, ExpectationId};
pub use location::SourceLocation;
pub use registry::ExpectationRegistry;
pub use run::{FailureKind, FailureRecord, TestRun};
pub use wait::WaitOutcome;
