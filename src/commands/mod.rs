// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

pub mod names;
pub mod status;
pub mod sysctls;
pub mod validate;

use {names::NamesArgs, status::StatusArgs};

use clap::{Parser, Subcommand};

use crate::config::ClusterSpec;

/// A `HandledError` represents an error that has already been handled. When you call a function
/// that returns a `HandledError` or `HandledResult`, you don't need to do anything with that error,
/// other than just be aware that it happened, and return it on to your caller.
///
/// `main()` has a special responsibility: since its "caller" is, in a certain sense, the operating
/// system, `main()` must return a nonzero exit status when it gets a `HandledError`.
///
/// The primary way to construct a `HandledError` is with the `handle_err()` function, which turns a
/// generic error into a `HandledError`, and also runs some caller-provided code to handle the
/// error. That provided code would normally do something like report the error to stderr.
#[derive(Debug, PartialEq)]
pub struct HandledError {}

pub type HandledResult<T> = std::result::Result<T, HandledError>;

pub trait Handle<T, F> {
    fn handle_err(self, handler: F) -> HandledResult<T>;
}

impl<T, E, F: FnOnce(E)> Handle<T, F> for std::result::Result<T, E> {
    /// Handle an error by running the provided `handler` code, giving it the error.
    ///
    /// Then, return a `HandledResult`, so that transitive callers of this function know that they
    /// do not need to do anything further to handle the error.
    fn handle_err(self, handler: F) -> HandledResult<T> {
        self.map_err(|e| {
            handler(e);
            HandledError {}
        })
    }
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Cluster config file. Defaults to $RACTOPO_CONFIG, then /etc/ractopo/cluster.toml.
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the kernel parameters each node will be created with.
    Sysctls,
    /// Print the derived names of every node and storage object.
    Names(NamesArgs),
    /// Check the config file and print a summary of it.
    Validate,
    /// Run reconciliation passes against a scripted platform and print the resulting status.
    Status(StatusArgs),
}

/// Load the cluster spec named on the command line, or the default one.
pub fn load_spec(cli: &Cli) -> HandledResult<ClusterSpec> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => crate::default_config_path(),
    };
    ClusterSpec::from_file(&path).handle_err(|e| eprintln!("{e}"))
}

pub fn main(cli: &Cli) -> HandledResult<()> {
    let spec = load_spec(cli)?;

    match &cli.command {
        Commands::Sysctls => sysctls::sysctls(&spec),
        Commands::Names(args) => names::names(&spec, args),
        Commands::Validate => validate::validate(&spec),
        Commands::Status(args) => {
            let rt = tokio::runtime::Runtime::new()
                .handle_err(|e| eprintln!("Error launching tokio runtime: {e}"))?;
            rt.block_on(status::status(&spec, args))
        }
    }
}
