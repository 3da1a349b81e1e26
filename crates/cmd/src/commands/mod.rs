// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

pub mod cleanup;
pub mod results;
pub mod run;
pub mod suite;

pub use cleanup::cleanup_command;
pub use results::results_command;
pub use run::{RunOptions, run_command};
pub use suite::{SuiteOverrides, suite_command};
