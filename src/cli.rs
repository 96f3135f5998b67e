use std::env;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::sync::Arc;

use crate::{Healer, Options};

fn print_help(program: &str) {
    eprintln!(
        "Usage: {prog} [OPTIONS] [INPUT]\n\
         \n\
         INPUT: optional input file. When omitted, reads from stdin.\n\
         \n\
         Options:\n\
           -o, --output FILE     Write output to FILE (default stdout)\n\
               --schema FILE     JSON Schema file; missing required properties\n\
                                 are injected into the closing tail\n\
               --chunk-size N    Feed input through the healer N bytes at a\n\
                                 time (default 65536)\n\
           -h, --help            Show this help\n",
        prog = program
    );
}

struct CliMode {
    input: Option<String>,
    output: Option<String>,
    schema: Option<String>,
    chunk_size: usize,
}

fn parse_args() -> CliMode {
    let mut args: Vec<String> = env::args().collect();
    let program = args
        .first()
        .cloned()
        .unwrap_or_else(|| "jsonheal".to_string());
    args.remove(0);

    let mut mode = CliMode {
        input: None,
        output: None,
        schema: None,
        chunk_size: 65536,
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help(&program);
                std::process::exit(0);
            }
            "-o" | "--output" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Missing FILE for --output");
                    std::process::exit(2);
                }
                mode.output = Some(args[i].clone());
            }
            "--schema" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Missing FILE for --schema");
                    std::process::exit(2);
                }
                mode.schema = Some(args[i].clone());
            }
            "--chunk-size" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Missing N for --chunk-size");
                    std::process::exit(2);
                }
                mode.chunk_size = args[i].parse().unwrap_or(65536);
            }
            other if other.starts_with('-') => {
                eprintln!("Unknown option: {other}");
                print_help(&program);
                std::process::exit(2);
            }
            _ => {
                mode.input = Some(args[i].clone());
            }
        }
        i += 1;
    }
    mode
}

fn read_input(path: Option<&str>) -> io::Result<String> {
    match path {
        Some(path) => fs::read_to_string(path),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

pub fn main() {
    let mode = parse_args();

    let schema = match &mode.schema {
        Some(path) => match fs::read_to_string(path) {
            Ok(text) => match serde_json::from_str::<serde_json::Value>(&text) {
                Ok(v) => Some(Arc::new(v)),
                Err(e) => {
                    eprintln!("Invalid schema {path}: {e}");
                    std::process::exit(2);
                }
            },
            Err(e) => {
                eprintln!("Cannot read schema {path}: {e}");
                std::process::exit(2);
            }
        },
        None => None,
    };

    let input = match read_input(mode.input.as_deref()) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Cannot read input: {e}");
            std::process::exit(1);
        }
    };

    let mut writer: BufWriter<Box<dyn Write>> = match &mode.output {
        Some(path) => match File::create(path) {
            Ok(f) => BufWriter::new(Box::new(f)),
            Err(e) => {
                eprintln!("Cannot create {path}: {e}");
                std::process::exit(1);
            }
        },
        None => BufWriter::new(Box::new(io::stdout())),
    };

    let mut healer = match schema {
        Some(s) => Healer::with_schema(s, Options::default()),
        None => Healer::new(Options::default()),
    };

    let chunk_size = mode.chunk_size.max(1);
    let mut start = 0usize;
    let mut failed = false;
    while start < input.len() {
        let mut end = usize::min(start + chunk_size, input.len());
        while end < input.len() && !input.is_char_boundary(end) {
            end += 1;
        }
        let forwarded = healer.process(&input[start..end]);
        if !forwarded.is_empty() && writer.write_all(forwarded.as_bytes()).is_err() {
            failed = true;
            break;
        }
        start = end;
    }
    if !failed {
        let tail = healer.finish();
        failed = writer.write_all(tail.as_bytes()).is_err() || writer.flush().is_err();
    }
    if failed {
        eprintln!("Write error");
        std::process::exit(1);
    }
}
