use aws_sdk_dynamodb::Client as DynamoClient;
use clap::{Parser, ValueEnum};
use dispatch_shared::audit::{find_schedule_violations, ScheduleViolation};
use dispatch_shared::config::Config;
use dispatch_shared::store::{DispatchStore, DynamoStore};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "lead-audit")]
#[command(version)]
#[command(about = "Report leads in the scheduled family that have no appointment time")]
struct Args {
    /// DynamoDB table (defaults to TABLE_NAME or lead-dispatch)
    #[arg(long)]
    table: Option<String>,

    /// Only audit this team
    #[arg(long)]
    team: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    format: OutputFormat,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(&args).await {
        Ok(violations) if violations.is_empty() => {
            eprintln!("No violations found");
            ExitCode::SUCCESS
        }
        Ok(violations) => {
            print_violations(&violations, args.format);
            eprintln!("{} violation(s) found", violations.len());
            ExitCode::from(1)
        }
        Err(e) => {
            tracing::error!("Audit failed: {}", e);
            eprintln!("Audit failed: {}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(args: &Args) -> dispatch_shared::error::Result<Vec<ScheduleViolation>> {
    let config = Config::from_env();
    let table = args.table.clone().unwrap_or(config.table_name);
    let sdk_config = aws_config::load_from_env().await;
    let store = DynamoStore::new(DynamoClient::new(&sdk_config), &table);

    tracing::info!("Auditing table {}", table);
    let leads = match &args.team {
        Some(team_id) => store.list_team_leads(team_id).await?,
        None => store.list_all_leads().await?,
    };
    tracing::info!("Scanned {} leads", leads.len());

    Ok(find_schedule_violations(&leads))
}

fn print_violations(violations: &[ScheduleViolation], format: OutputFormat) {
    match format {
        OutputFormat::Json => match serde_json::to_string_pretty(violations) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to encode violations: {}", e),
        },
        OutputFormat::Table => {
            println!("{:<38} {:<38} {}", "LEAD", "TEAM", "STATUS");
            for v in violations {
                println!("{:<38} {:<38} {}", v.lead_id, v.team_id, v.status.as_str());
            }
        }
    }
}
