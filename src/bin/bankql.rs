//! bankql command-line front end
//!
//! # Usage
//!
//! ```bash
//! # Show the SQL a query compiles to
//! bankql sql users --where "active=true" --where "age>=18" --limit 10
//!
//! # Run it against a database
//! bankql query users --select id,email --database-url sqlite://app.db
//!
//! # Inspect native triggers and views
//! bankql triggers --table users
//! bankql views
//! ```

use anyhow::{anyhow, bail, Context, Result};
use bankql::prelude::*;
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::*;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "bankql")]
#[command(version)]
#[command(about = "Compile and run bankql queries", long_about = None)]
#[command(after_help = "EXAMPLES:
    bankql sql users --where active=true --limit 10
    bankql query orders --select id,total --where 'total>100' --format json
    bankql triggers --table users")]
struct Cli {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    format: OutputFormat,

    /// Database connection URL; overrides the config file
    #[arg(long, env = "BANKQL_DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// Config file (defaults to <config dir>/bankql/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Args)]
struct QueryArgs {
    /// Table to query
    table: String,

    /// Filter such as `id=1`, `age>=18` or `name like a%`; repeatable
    #[arg(short, long = "where")]
    filters: Vec<String>,

    /// Comma-separated columns
    #[arg(short, long, value_delimiter = ',')]
    select: Vec<String>,

    #[arg(short, long)]
    limit: Option<u64>,

    #[arg(long)]
    offset: Option<u64>,

    /// Order by column; prefix with `-` for descending
    #[arg(long)]
    order: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print compiled SQL and bindings without connecting
    Sql(QueryArgs),
    /// Execute a read against the configured database
    Query(QueryArgs),
    /// List native triggers in the database
    Triggers {
        #[arg(short, long)]
        table: Option<String>,
    },
    /// List views in the database
    Views,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Sql(args) => {
            let hub = Hub::new(Config::default());
            let compiled = build_query(&hub, args)?.to_sql();
            print_compiled(&compiled, cli.format)
        }
        Commands::Query(args) => {
            let hub = connect(cli).await?;
            let query = build_query(&hub, args)?;
            if cli.verbose {
                println!("{} {}", "SQL:".dimmed(), query.to_sql().sql.yellow());
            }
            let rows = query.all().await?;
            format_output(&rows, cli.format);
            Ok(())
        }
        Commands::Triggers { table } => {
            let hub = connect(cli).await?;
            let names = hub.triggers().list_triggers_async(table.as_deref()).await;
            print_names(&names, "trigger", cli.format);
            Ok(())
        }
        Commands::Views => {
            let hub = connect(cli).await?;
            let names = hub.triggers().list_views_async().await;
            print_names(&names, "view", cli.format);
            Ok(())
        }
    }
}

async fn connect(cli: &Cli) -> Result<Hub> {
    if let Some(url) = &cli.database_url {
        if cli.verbose {
            println!("{} {}", "Connecting to:".dimmed(), url);
        }
        let db = SqlxExecutor::connect(url).await?;
        let mut builder = Config::builder().executor(Arc::new(db));
        if let Some(dialect) = Dialect::from_url(url) {
            builder = builder.dialect(dialect);
        }
        return Ok(Hub::new(builder.build()));
    }

    let path = match &cli.config {
        Some(path) => path.clone(),
        None => ConfigFile::default_path()
            .ok_or_else(|| anyhow!("no config directory on this platform"))?,
    };
    if !path.exists() {
        bail!(
            "no database configured. Use --database-url, set BANKQL_DATABASE_URL or create {}",
            path.display()
        );
    }
    let file = ConfigFile::load(&path).with_context(|| format!("reading {}", path.display()))?;
    Ok(Hub::new(file.connect().await?))
}

fn build_query(hub: &Hub, args: &QueryArgs) -> Result<Query> {
    let mut query = hub.query(&args.table);
    if !args.select.is_empty() {
        query = query.select(&args.select);
    }
    for filter in &args.filters {
        let (column, op, value) = parse_filter(filter)?;
        query = query.where_(column, op, value);
    }
    if let Some(order) = &args.order {
        query = match order.strip_prefix('-') {
            Some(column) => query.order_by_desc(column),
            None => query.order_by(order),
        };
    }
    if let Some(limit) = args.limit {
        query = query.limit(limit);
    }
    if let Some(offset) = args.offset {
        query = query.offset(offset);
    }
    Ok(query)
}

/// Split `col<op>value`, or `col <word op> value` for LIKE forms.
fn parse_filter(input: &str) -> Result<(String, Operator, Value)> {
    const SYMBOLS: &[char] = &['=', '!', '<', '>'];

    if let Some(start) = input.find(SYMBOLS) {
        let rest = &input[start..];
        let end = rest.find(|c: char| !SYMBOLS.contains(&c)).unwrap_or(rest.len());
        let column = input[..start].trim();
        if column.is_empty() {
            bail!("filter '{}' has no column", input);
        }
        let op = Operator::parse(&rest[..end])?;
        return Ok((column.to_string(), op, parse_value(rest[end..].trim())));
    }

    let tokens: Vec<&str> = input.split_whitespace().collect();
    if tokens.len() < 3 {
        bail!("cannot parse filter '{}'; expected col=value", input);
    }
    let op = Operator::parse(&tokens[1..tokens.len() - 1].join(" "))?;
    Ok((tokens[0].to_string(), op, parse_value(tokens[tokens.len() - 1])))
}

fn parse_value(text: &str) -> Value {
    if let Ok(n) = text.parse::<i64>() {
        Value::Int(n)
    } else if let Ok(f) = text.parse::<f64>() {
        Value::Float(f)
    } else if text == "true" {
        Value::Bool(true)
    } else if text == "false" {
        Value::Bool(false)
    } else if text.eq_ignore_ascii_case("null") {
        Value::Null
    } else {
        Value::String(text.trim_matches('\'').to_string())
    }
}

fn print_compiled(compiled: &CompiledQuery, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(compiled)?),
        OutputFormat::Table => {
            println!("{}", "Generated SQL:".green().bold());
            println!("{}", compiled.sql.white());
            if !compiled.bindings.is_empty() {
                println!();
                println!("{}", "Bindings:".cyan());
                for (i, b) in compiled.bindings.iter().enumerate() {
                    println!("  ?{} = {}", i + 1, b.to_string().yellow());
                }
            }
        }
    }
    Ok(())
}

fn print_names(names: &[String], kind: &str, format: OutputFormat) {
    let rows: Vec<Row> = names
        .iter()
        .map(|n| row(serde_json::json!({ kind: n })))
        .collect();
    format_output(&rows, format);
}

fn format_output(results: &[Row], format: OutputFormat) {
    if results.is_empty() {
        println!("{}", "(no results)".dimmed());
        return;
    }
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(results).unwrap_or_default());
        }
        OutputFormat::Table => print_table(results),
    }
}

/// Columns are the union of every row's keys, in first-seen order.
fn print_table(results: &[Row]) {
    let mut columns: Vec<(&str, usize)> = Vec::new();
    for record in results {
        for (name, cell) in record {
            let len = cell_text(Some(cell)).chars().count();
            let known = columns.iter().position(|(c, _)| *c == name.as_str());
            match known {
                Some(i) => columns[i].1 = columns[i].1.max(len),
                None => columns.push((name.as_str(), len.max(name.chars().count()))),
            }
        }
    }

    let line = |cells: Vec<String>| cells.join(" │ ");
    let header = line(columns.iter().map(|(c, w)| format!("{:w$}", c, w = *w)).collect());
    println!("{}", header.white().bold());
    let rule: Vec<String> = columns.iter().map(|(_, w)| "─".repeat(*w)).collect();
    println!("{}", rule.join("─┼─").dimmed());

    for record in results {
        let cells = columns
            .iter()
            .map(|(c, w)| format!("{:w$}", cell_text(record.get(*c)), w = *w))
            .collect();
        println!("{}", line(cells));
    }
    println!("\n{} row(s)", results.len().to_string().cyan());
}

fn cell_text(cell: Option<&serde_json::Value>) -> String {
    match cell {
        None => String::new(),
        Some(serde_json::Value::Null) => "NULL".to_string(),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
