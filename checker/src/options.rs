// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use clap::{value_parser, Arg, ArgAction, Command};
use std::path::PathBuf;
use thiserror::Error;

/// Creates the clap::Command metadata for argument parsing.
fn make_options_parser() -> Command {
    Command::new("xcheck")
        .no_binary_name(true)
        .version("v0.3.0")
        .about("Decodes transaction value files and prints the values they hold.")
        .arg(Arg::new("json")
            .long("json")
            .action(ArgAction::SetTrue)
            .help("Print values as JSON rather than in their display form."))
        .arg(Arg::new("files")
            .value_parser(value_parser!(PathBuf))
            .action(ArgAction::Append)
            .help("Files holding encoded transaction values."))
}

#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("cannot parse argument string: {0}")]
    Split(String),
    #[error(transparent)]
    Command(#[from] clap::Error),
}

/// Represents options passed to xcheck.
#[derive(Debug, Default)]
pub struct Options {
    pub json: bool,
    pub files: Vec<PathBuf>,
}

impl Options {
    /// Parse options from an argument string. The argument string will be split using unix
    /// shell escaping rules.
    pub fn parse_from_str(&mut self, s: &str) -> Result<(), OptionsError> {
        let args = shellwords::split(s).map_err(|e| OptionsError::Split(format!("{:?}", e)))?;
        self.parse(&args)?;
        Ok(())
    }

    /// Parses options from a list of strings that does not start with the binary name.
    /// Options that are not given keep their current values.
    pub fn parse(&mut self, args: &[String]) -> Result<(), clap::Error> {
        let matches = make_options_parser().try_get_matches_from(args.iter())?;
        if matches.get_flag("json") {
            self.json = true;
        }
        if let Some(files) = matches.get_many::<PathBuf>("files") {
            self.files.extend(files.cloned());
        }
        Ok(())
    }
}
