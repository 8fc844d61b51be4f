// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

extern crate env_logger;

#[macro_use]
extern crate log;

use std::env;
use xcheck::operand::read_operand_file;
use xcheck::options::Options;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize loggers.
    if env::var("XCHECK_LOG").is_ok() {
        let e = env_logger::Env::new()
            .filter("XCHECK_LOG")
            .write_style("XCHECK_LOG_STYLE");
        env_logger::init_from_env(e);
    }

    let command_line_arguments: Vec<String> = env::args().skip(1).collect();
    let mut options = Options::default();
    if let Err(e) = options.parse(&command_line_arguments) {
        e.exit();
    }
    debug!("options: {:?}", options);

    for path in &options.files {
        let operands = match read_operand_file(path) {
            Ok(operands) => operands,
            Err(e) => {
                eprintln!("xcheck: {}", e);
                std::process::exit(1);
            }
        };
        for operand in &operands {
            if options.json {
                println!("{}", serde_json::to_string(operand)?);
            } else {
                println!("{}", operand);
            }
        }
    }
    Ok(())
}
