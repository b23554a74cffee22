use erdflow::document::{Document, Presentation, Viewport};
use erdflow::sql::{parse_sql, Dialect};
use std::env;
use std::fs;
use std::io;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "erdflow=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <dump.sql> [options]", args[0]);
        eprintln!();
        eprintln!("Options:");
        eprintln!("  -o, --output <file>     Output file (default: stdout)");
        eprintln!("  -d, --dialect <name>    SQL dialect: auto, generic, postgres, mysql (default: auto)");
        process::exit(1);
    }

    let input_path = &args[1];
    let mut output_path: Option<String> = None;
    let mut dialect = Dialect::Auto;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "-o" | "--output" => {
                i += 1;
                if i < args.len() {
                    output_path = Some(args[i].clone());
                }
            }
            "-d" | "--dialect" => {
                i += 1;
                if i < args.len() {
                    dialect = Dialect::from_str(&args[i]).unwrap_or_else(|| {
                        eprintln!("Invalid dialect: {}", args[i]);
                        process::exit(1);
                    });
                }
            }
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                process::exit(1);
            }
        }
        i += 1;
    }

    let input = match fs::read_to_string(input_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to read {}: {}", input_path, e);
            process::exit(1);
        }
    };

    let imported = match parse_sql(&input, dialect) {
        Ok(imported) => imported,
        Err(e) => {
            eprintln!("Parse error: {}", e);
            process::exit(1);
        }
    };
    for note in &imported.notifications {
        eprintln!("warning: {}", note);
    }

    let document = Document::new(imported.graph, Presentation::default(), Viewport::default());
    let json = match document.to_json() {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Failed to serialize diagram: {}", e);
            process::exit(1);
        }
    };

    match output_path {
        Some(path) => {
            if let Err(e) = fs::write(&path, &json) {
                eprintln!("Failed to write {}: {}", path, e);
                process::exit(1);
            }
        }
        None => println!("{}", json),
    }
}
