use std::fs;
use std::io::Read;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Args;
use tracing::info;

use cwop::cwop_client::{CwopClient, CwopClientConfigBuilder};
use cwop::packet::{Callsign, Packet, Via};
use cwop::wx::{SendRequest, format_wx_report};

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Observation JSON file; "-" or absent reads stdin
    pub input: Option<String>,
    /// Station (From) callsign, e.g. N0CALL or N0CALL-13
    #[arg(long)]
    pub from: Option<String>,
    /// Destination callsign (default: APRS)
    #[arg(long)]
    pub to: Option<String>,
    /// Via path (default: TCPIP*)
    #[arg(long)]
    pub via: Option<String>,
    /// CWOP server hostname
    #[arg(long, default_value = "cwop.aprs.net")]
    pub server: String,
    /// CWOP server port
    #[arg(long, default_value_t = 14580)]
    pub port: u16,
    /// APRS-IS username (defaults to CWOP_USER, then the From callsign)
    #[arg(long)]
    pub user: Option<String>,
    /// APRS-IS passcode (falls back to CWOP_PASS; "-1" when absent)
    #[arg(long)]
    pub pass: Option<String>,
    /// Overall send deadline in seconds
    #[arg(long, default_value_t = 20)]
    pub timeout: u64,
    /// Treat the input as a preformatted report body instead of JSON
    #[arg(long, default_value_t = false)]
    pub raw: bool,
    /// Print the framed packet without connecting
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

pub async fn handle_send(args: SendArgs) -> Result<()> {
    let input = read_input(args.input.as_deref())?;

    let (request, data) = if args.raw {
        let body = input.trim_end_matches(['\r', '\n']).to_string();
        (SendRequest::default(), body)
    } else {
        let request: SendRequest =
            serde_json::from_str(&input).context("Failed to parse observation JSON")?;
        let data = format_wx_report(request.observation())?;
        (request, data)
    };

    // Payload-level addressing wins over command-line flags, matching
    // per-call overrides of a configured station identity.
    let from = request
        .from
        .clone()
        .or_else(|| args.from.clone().map(Callsign::Plain));
    let Some(from) = from else {
        bail!("No From callsign: pass --from or include one in the payload");
    };
    let to = request
        .to
        .clone()
        .or_else(|| args.to.clone().map(Callsign::Plain));
    let via = request
        .via
        .clone()
        .or_else(|| args.via.clone().map(Via::Path));

    let packet = Packet {
        from,
        to,
        via,
        data,
    };
    let line = packet.format()?;

    if args.dry_run {
        println!("{line}");
        return Ok(());
    }

    let username = args
        .user
        .clone()
        .or_else(|| std::env::var("CWOP_USER").ok())
        .unwrap_or_else(|| packet.from.to_string());
    let passcode = args.pass.clone().or_else(|| std::env::var("CWOP_PASS").ok());

    let config = CwopClientConfigBuilder::new()
        .server(args.server)
        .port(args.port)
        .username(username)
        .passcode(passcode)
        .timeout(Duration::from_secs(args.timeout))
        .build();

    info!(
        "Transmitting {} byte packet to {}:{}",
        line.len(),
        config.server,
        config.port
    );
    CwopClient::new(config).send(&line).await?;
    info!("Packet sent");
    Ok(())
}

fn read_input(path: Option<&str>) -> Result<String> {
    match path {
        Some(path) if path != "-" => {
            fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))
        }
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            Ok(buf)
        }
    }
}
