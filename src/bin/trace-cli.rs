use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::collections::HashMap;

use trace_propagation::http::middleware::TRACE_ID_HEADER;
use trace_propagation::propagation::{decode, encode, TraceIdentity, TRACE_HEADER};

#[derive(Parser)]
#[command(name = "trace-cli")]
#[command(about = "Inspect uber-trace-id headers and send traced requests", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse an uber-trace-id header value
    Decode {
        /// Header value, e.g. "deadbeef:1:0:1"
        value: String,
    },
    /// GET a URL under a fresh root trace
    Call {
        url: String,

        /// Send the trace as not sampled
        #[arg(long)]
        unsampled: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Decode { value } => {
            let mut headers: HashMap<String, String> = HashMap::new();
            headers.insert(TRACE_HEADER.to_string(), value);
            let identity = decode(&headers)?;
            println!("{}", serde_json::to_string_pretty(&describe(&identity))?);
        }
        Commands::Call { url, unsampled } => {
            let identity = TraceIdentity::new_root(!unsampled);
            let mut headers: HashMap<String, String> = HashMap::new();
            encode(&identity, &mut headers);

            let client = reqwest::Client::new();
            let mut request = client.get(&url);
            for (name, value) in &headers {
                request = request.header(name.as_str(), value.as_str());
            }
            println!("{}: {}", TRACE_HEADER, identity);

            let res = request.send().await?;
            if let Some(echoed) = res.headers().get(TRACE_ID_HEADER) {
                println!("{}: {}", TRACE_ID_HEADER, echoed.to_str().unwrap_or("<binary>"));
            }
            print_response(res).await?;
        }
    }

    Ok(())
}

fn describe(identity: &TraceIdentity) -> Value {
    json!({
        "trace_id": identity.trace_id.to_hex(),
        "span_id": identity.span_id.to_hex(),
        "parent_span_id": identity.parent_span_id.map(|id| id.to_hex()),
        "sampled": identity.sampled,
        "baggage": identity.baggage,
    })
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: service returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
