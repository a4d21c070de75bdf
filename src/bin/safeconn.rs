use safeconn::config::load_config;
use safeconn::{Param, QueryOutcome, SafeConnection, SessionOption, SqliteDriver};
use std::process::ExitCode;
use tracing::info;

/// Reads a command-line argument as an integer, then a finite float, then text.
fn parse_param(raw: &str) -> Param {
    if let Ok(i) = raw.parse::<i64>() {
        Param::Int(i)
    } else if let Some(f) = raw.parse::<f64>().ok().filter(|f| f.is_finite()) {
        Param::Float(f)
    } else {
        Param::from(raw)
    }
}

fn run(config_path: &str, sql: &str, raw_params: &[String]) -> safeconn::Result<()> {
    let config = load_config(config_path)?;
    let mut options = config.options()?;

    // There is no statement to replay yet; reuse is switched on once one is set
    let reuse_statement = options.reuse_statement;
    options.reuse_statement = false;

    let mut conn = SafeConnection::new(SqliteDriver, config.connection_info(), options);
    if !conn.is_connected() {
        conn.connect(None)?;
    }

    let params: Vec<Param> = raw_params.iter().map(|p| parse_param(p)).collect();
    conn.set(sql, &params)?;
    conn.set_option(SessionOption::ReuseStatement(reuse_statement))?;

    match conn.query(&[])? {
        QueryOutcome::Rows(result) => {
            println!("{}", result.columns.join("\t"));
            for row in &result.rows {
                println!("{}", row.join("\t"));
            }
            info!("{} rows returned", result.row_count);
        }
        QueryOutcome::Completed { affected_rows } => {
            println!("{} rows affected", affected_rows);
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    // Logs go to stderr so stdout carries only query output
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: safeconn <config.toml> <sql> [params...]");
        return ExitCode::FAILURE;
    }

    match run(&args[1], &args[2], &args[3..]) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
