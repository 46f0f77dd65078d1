// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use clap::Parser;

use ractopo_lib::commands::{self, Cli};

/// The ractopo binary runs admin commands like "validate", "sysctls" and "status" against a
/// cluster config file.
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RACTOPO_LOG", "warn"))
        .init();

    let args = Cli::parse();

    if commands::main(&args).is_err() {
        std::process::exit(1);
    }
}
