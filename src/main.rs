use std::process::ExitCode;

use tracing::{error, info};

use adilet_lookup::config::{self, WaitBounds};
use adilet_lookup::render;
use adilet_lookup::types::{Iin, LookupError, RecordSet};
use adilet_lookup::RegistryClient;

const USAGE: &str = "\
Usage: adilet-lookup [OPTIONS] IIN...

Looks up each 12-digit IIN in the arrest/encumbrance and debtor registers
on aisoip.adilet.gov.kz and prints the normalized results.

Options:
  --json      Print both record sets as one JSON document
  --headed    Run the browser with a visible window (default: headless)
  -h, --help  Show this help
";

struct ShellArgs {
    iins: Vec<String>,
    json: bool,
    headed: bool,
    help: bool,
}

fn parse_shell_args() -> Result<ShellArgs, String> {
    let mut out = ShellArgs {
        iins: Vec::new(),
        json: false,
        headed: false,
        help: false,
    };
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--json" => out.json = true,
            "--headed" => out.headed = true,
            "-h" | "--help" => out.help = true,
            flag if flag.starts_with('-') => {
                return Err(format!("unknown option {flag}"));
            }
            _ => out.iins.push(arg),
        }
    }
    Ok(out)
}

fn looks_like_timeout(err: &anyhow::Error) -> bool {
    let text = format!("{err:#}").to_ascii_lowercase();
    text.contains("timeout") || text.contains("timed out")
}

fn report_failure(err: &LookupError) {
    match err {
        LookupError::InvalidIin(_) => eprintln!("{err}"),
        LookupError::SessionInit(cause) => {
            eprintln!("Failed to start the browser session: {cause:#}");
        }
        LookupError::Automation(cause) if looks_like_timeout(cause) => {
            eprintln!(
                "The registry site did not respond in time. Try again later or check the connection."
            );
        }
        LookupError::Automation(cause) => {
            eprintln!("Unexpected automation failure: {cause:#}");
        }
    }
}

fn render_results(arrests: &RecordSet, debtors: &RecordSet, iins: &[Iin], json: bool) {
    if json {
        let doc = serde_json::json!({
            "arrests": arrests.to_json_records(),
            "debtors": debtors.to_json_records(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&doc).unwrap_or_else(|_| "{}".to_string())
        );
        return;
    }

    if arrests.is_empty() && debtors.is_empty() {
        let listed: Vec<&str> = iins.iter().map(Iin::as_str).collect();
        println!("Nothing found for IIN {}.", listed.join(", "));
        return;
    }

    if !arrests.is_empty() {
        println!("Arrests / encumbrances:");
        print!("{}", render::render_table(arrests));
    } else {
        println!("No arrests or encumbrances found.");
    }
    println!();
    if !debtors.is_empty() {
        println!("Debtor records:");
        print!("{}", render::render_table(debtors));
    } else {
        println!("Not listed in the debtor register.");
    }

    let mut found = Vec::new();
    if !arrests.is_empty() {
        found.push("arrests");
    }
    if !debtors.is_empty() {
        found.push("debts");
    }
    println!("\nFound: {}.", found.join(", "));
}

async fn run_lookups(
    client: &RegistryClient,
    iins: &[Iin],
) -> Result<(RecordSet, RecordSet), LookupError> {
    info!("Fetching arrests / encumbrances");
    let arrests = client.arrests(iins).await?;
    info!("Fetching debtor records");
    let debtors = client.debtors(iins).await?;
    Ok((arrests, debtors))
}

#[tokio::main]
async fn main() -> ExitCode {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let args = match parse_shell_args() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{msg}\n\n{USAGE}");
            return ExitCode::from(2);
        }
    };
    if args.help {
        print!("{USAGE}");
        return ExitCode::SUCCESS;
    }
    if args.iins.is_empty() {
        eprintln!("No IIN given.\n\n{USAGE}");
        return ExitCode::from(2);
    }

    // Validate everything up front; malformed input never reaches the client
    // and no browser session is created for it.
    let mut iins = Vec::with_capacity(args.iins.len());
    for raw in &args.iins {
        match Iin::parse(raw) {
            Ok(iin) => iins.push(iin),
            Err(err) => {
                report_failure(&err);
                return ExitCode::from(2);
            }
        }
    }

    let headless = !args.headed && config::headless();
    let client = match RegistryClient::launch(headless, WaitBounds::from_env()).await {
        Ok(client) => client,
        Err(err) => {
            error!("{}", err);
            report_failure(&err);
            return ExitCode::from(1);
        }
    };

    let result = run_lookups(&client, &iins).await;
    client.close().await;

    match result {
        Ok((arrests, debtors)) => {
            render_results(&arrests, &debtors, &iins, args.json);
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{}", err);
            report_failure(&err);
            ExitCode::from(1)
        }
    }
}
