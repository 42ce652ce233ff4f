//! Command-line front end for the lockcard operations
//!
//! Usage:
//!   lockcard readers
//!   lockcard uid <reader>
//!   lockcard dump <reader>
//!   lockcard wipe <reader>
//!   lockcard rotate <reader>
//!   lockcard restore <reader>
//!   lockcard setup <reader> <lock_no> <wait_time> <sound_mode> <alarm_mode> <lock_mode>
//!   lockcard clear-setup <reader>
//!   lockcard lock-number <reader>

use std::env;
use std::process;

use lockcard::{config, ops, OperationResult, PcscTransport, SetupParams};

fn usage() -> ! {
    eprintln!("usage: lockcard <command> [reader] [args...]");
    eprintln!("commands: readers, uid, dump, wipe, rotate, restore,");
    eprintln!("          setup <lock_no> <wait_time> <sound_mode> <alarm_mode> <lock_mode>,");
    eprintln!("          clear-setup, lock-number");
    process::exit(2);
}

fn print_result(result: OperationResult) {
    for line in &result.log {
        println!("{}", line);
    }
    if let Some(n) = result.lock_no {
        println!("Lock number: {}", n);
    }
    if let Some(n) = result.next_lock_no {
        println!("Next lock number: {}", n);
    }
    if let Some(error) = &result.error {
        eprintln!("Error: {}", error);
        process::exit(1);
    }
}

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    let command = match args.first() {
        Some(c) => c.as_str(),
        None => usage(),
    };

    if command == "readers" {
        match lockcard::list_readers() {
            Ok(readers) if readers.is_empty() => println!("No readers found"),
            Ok(readers) => {
                for reader in readers {
                    println!("{}", reader);
                }
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    let reader = match args.get(1) {
        Some(r) => r.as_str(),
        None => usage(),
    };
    let cfg = config::snapshot();

    match command {
        "uid" => match PcscTransport::connect(reader) {
            Ok(mut transport) => match lockcard::read_uid(&mut transport) {
                Ok(uid) => println!("{}", uid),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    process::exit(1);
                }
            },
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        },
        "dump" => print_result(ops::dump_card(reader, &cfg)),
        "wipe" => print_result(ops::clear_data_blocks(reader, &cfg)),
        "rotate" => print_result(ops::rotate_trailer_key(reader, &cfg)),
        "restore" => print_result(ops::restore_trailer_key(reader, &cfg)),
        "setup" => {
            if args.len() < 7 {
                usage();
            }
            let parse = |i: usize| -> u32 {
                args[i].parse().unwrap_or_else(|_| {
                    eprintln!("Error: {} is not a number", args[i]);
                    process::exit(2);
                })
            };
            let params = SetupParams {
                lock_no: parse(2),
                wait_time: (parse(3) & 0xFF) as u8,
                sound_mode: (parse(4) & 0xFF) as u8,
                alarm_mode: (parse(5) & 0xFF) as u8,
                lock_mode: (parse(6) & 0xFF) as u8,
                auto_increment: false,
            };
            print_result(ops::write_setup_card(reader, &cfg, params));
        }
        "clear-setup" => print_result(ops::clear_setup_blocks(reader, &cfg)),
        "lock-number" => print_result(ops::read_lock_number(reader, &cfg)),
        _ => usage(),
    }
}
