//! Command-line shell for the embedded SQL database.
//!
//! Supports both execute mode (one-shot queries) and interactive mode (REPL).

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use common::pretty;
use database::{Engine, EngineResponse};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

const DEFAULT_DATA_DIR: &str = "./db_data";

#[derive(Parser, Debug)]
#[command(name = "sqlsh", about = "shell for the embedded SQL database")]
struct Args {
    /// Directory holding the catalog and index files.
    #[arg(long, default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    /// Execute the provided SQL and exit.
    #[arg(short = 'e', long)]
    execute: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = common::Config::builder().data_dir(args.data_dir.clone()).build();
    let mut engine = Engine::open(config)?;
    println!("Opened {}", args.data_dir.display());

    if let Some(sql) = args.execute {
        print_response(&engine.execute(&sql));
    } else {
        interactive_loop(&mut engine)?;
    }

    Ok(())
}

/// Process a line of input from the REPL.
/// Returns true to continue the loop, false to exit.
fn process_line(engine: &mut Engine, line: &str) -> bool {
    if line.is_empty() {
        return true;
    }

    if line == ".quit" || line == ".exit" {
        return false;
    }

    if line == ".help" {
        print_help();
        return true;
    }

    print_response(&engine.execute(line));
    true
}

/// Handle readline errors.
/// Returns true to continue the loop, false to exit.
fn handle_readline_error(error: ReadlineError) -> bool {
    match error {
        ReadlineError::Interrupted => {
            println!("^C");
            false
        }
        ReadlineError::Eof => {
            println!("^D");
            false
        }
        err => {
            eprintln!("Error: {err:?}");
            false
        }
    }
}

/// Run an interactive REPL loop.
fn interactive_loop(engine: &mut Engine) -> Result<()> {
    let mut rl = DefaultEditor::new()?;

    println!();
    println!("Type SQL statements or .quit to exit");
    println!();

    loop {
        let readline = rl.readline("> ");

        let should_continue = match readline {
            Ok(line) => {
                let line = line.trim();
                let _ = rl.add_history_entry(line);
                process_line(engine, line)
            }
            Err(e) => handle_readline_error(e),
        };

        if !should_continue {
            break;
        }
    }

    Ok(())
}

/// Print one `Engine::execute` response.
fn print_response(response: &EngineResponse) {
    if let Some(error) = &response.error {
        eprintln!("Error: {error}");
        return;
    }

    if let Some(rows) = &response.result {
        let batch = row_maps_to_batch(rows);
        let rendered = pretty::render_record_batch(&batch, pretty::TableStyleKind::Modern);
        println!("{rendered}");
    } else if let Some(affected) = response.rows_affected {
        println!("{affected} row(s) affected");
    } else {
        println!("Success");
    }

    println!("({:.6}s)", response.runtime);
}

/// `RowMap`s carry no fixed column order; recover a stable column list
/// from the first row (or none, for an empty result set) to render a
/// table.
fn row_maps_to_batch(rows: &[common::RowMap]) -> common::RecordBatch {
    let columns: Vec<String> = rows.first().map(|r| r.keys().cloned().collect()).unwrap_or_default();
    let batch_rows = rows
        .iter()
        .map(|row| common::Row::new(columns.iter().map(|c| row[c].clone()).collect()))
        .collect();
    common::RecordBatch {
        columns,
        rows: batch_rows,
    }
}

/// Print help message.
fn print_help() {
    println!("Commands:");
    println!("  .help    Show this help");
    println!("  .quit    Exit the client");
    println!();
    println!("Or enter SQL statements to execute them.");
}
