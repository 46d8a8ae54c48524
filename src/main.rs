use quickdb::config::{default_config_path, load_config, Config};
use quickdb::{Database, QueryOutput};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};

const USAGE: &str = "usage: quickdb [--config PATH] [DATABASE] SQL...";

struct Args {
    config: Option<PathBuf>,
    database: Option<String>,
    sql: String,
}

fn parse_args(raw: Vec<String>) -> Result<Args, String> {
    let mut config = None;
    let mut positional = Vec::new();
    let mut iter = raw.into_iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = iter.next().ok_or("--config needs a path")?;
                config = Some(PathBuf::from(path));
            }
            "--help" | "-h" => return Err(USAGE.to_string()),
            _ => positional.push(arg),
        }
    }

    match positional.len() {
        0 => Err(USAGE.to_string()),
        1 => Ok(Args {
            config,
            database: None,
            sql: positional.remove(0),
        }),
        _ => {
            let database = positional.remove(0);
            Ok(Args {
                config,
                database: Some(database),
                sql: positional.join(" "),
            })
        }
    }
}

fn settings(args: &Args) -> quickdb::Result<Config> {
    if let Some(path) = &args.config {
        return load_config(path);
    }
    match default_config_path() {
        Some(path) if path.exists() => {
            debug!("Loading settings from {:?}", path);
            load_config(path)
        }
        _ => Ok(Config::default()),
    }
}

fn run(args: Args) -> quickdb::Result<()> {
    let mut config = settings(&args)?;
    if let Some(database) = &args.database {
        config.connection.database = database.clone();
    }
    // SQLite has no accounts; any name satisfies the credential check.
    if config.connection.username.is_empty() {
        config.connection.username = std::env::var("USER").unwrap_or_else(|_| "quickdb".to_string());
    }

    let mut db = Database::from_config(&config);
    info!("Running statement against {}", config.connection.database);

    match db.query(&args.sql, true)? {
        QueryOutput::Rows(set) => {
            for row in set {
                println!("{}", serde_json::to_string(&row)?);
            }
            if let Some(n) = db.num_rows() {
                eprintln!("{} row(s)", n);
            }
        }
        QueryOutput::Affected(n) => println!("affected rows: {}", n),
        QueryOutput::InsertId(id) => println!("insert id: {}", id),
        QueryOutput::Success => println!("ok"),
    }

    if db.is_connected() {
        db.close()?;
    }
    Ok(())
}

fn main() -> ExitCode {
    // Initialize the logging system using tracing subscriber; stdout carries results
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let args = match parse_args(std::env::args().skip(1).collect()) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::from(2);
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
