use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::Value;
use slack_lite::config::{ForwarderConfig, load_settings};
use slack_lite::slack::MessageTs;
use slack_lite::{Params, SlackClient, SlackHandler};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, Layer as _};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Small command line front end for the Slack Web API
#[derive(Debug, Parser)]
#[command(name = "slack-lite", version, about)]
struct Cli {
    /// Extra form field for the call, as key=value (repeatable)
    #[arg(short = 'o', long = "option", value_parser = parse_option, global = true)]
    options: Vec<(String, String)>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check the token
    AuthTest,
    /// Post a message
    Post { channel: String, text: String },
    /// Replace the text of a message
    Update {
        channel: String,
        ts: String,
        text: String,
    },
    /// Delete a message
    Delete { channel: String, ts: String },
    /// Show recent channel history
    History {
        channel: String,
        #[arg(short, long, default_value_t = 10)]
        count: u32,
        /// Keep raw user IDs instead of user records
        #[arg(long)]
        raw: bool,
    },
    /// List channels
    Channels {
        #[arg(long)]
        include_archived: bool,
    },
    /// List users
    Users,
    /// Resolve a channel name to its ID
    Resolve {
        channel: String,
        #[arg(long)]
        refresh: bool,
    },
    /// Set a channel topic
    Topic { channel: String, topic: String },
    /// Forward stdin lines to a channel as WARN log records
    Relay { channel: Option<String> },
}

fn parse_option(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = load_settings().context("failed to load Slack settings")?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("slack_lite=info"));
    let options: Params = cli.options.into_iter().collect();

    if let Command::Relay { channel } = cli.command {
        let forwarder = match (channel, settings.forwarder) {
            (Some(channel), Some(config)) => ForwarderConfig { channel, ..config },
            (Some(channel), None) => ForwarderConfig::new(channel),
            (None, Some(config)) => config,
            (None, None) => anyhow::bail!("relay needs a channel argument or SLACK_LOG_CHANNEL"),
        };

        let handler = SlackHandler::from_config(settings.client, &forwarder)?;
        let (layer, forwarder_task) = handler.into_layer();
        let guard = tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_target(true).with_filter(filter))
            .with(layer)
            .set_default();

        // Dropping the guard drops the layer, which lets the forwarder drain and stop
        let relay = async move {
            let result = relay_stdin().await;
            drop(guard);
            result
        };
        let (result, ()) = tokio::join!(relay, forwarder_task.run());
        result?;
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true)
        .init();

    let client = SlackClient::connect(settings.client).await?;
    let result = run(&client, cli.command, options).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    client.directory().log_stats().await;
    Ok(())
}

async fn run(client: &SlackClient, command: Command, options: Params) -> anyhow::Result<Value> {
    let result = match command {
        Command::AuthTest => client.auth_test(options).await?,
        Command::Post { channel, text } => client.post_message(&channel, &text, options).await?,
        Command::Update { channel, ts, text } => {
            client
                .update_message(&channel, &MessageTs::new(ts), &text, options)
                .await?
        }
        Command::Delete { channel, ts } => {
            client
                .delete_message(&channel, &MessageTs::new(ts), options)
                .await?
        }
        Command::History {
            channel,
            count,
            raw,
        } => client.channel_history(&channel, count, !raw, options).await?,
        Command::Channels { include_archived } => {
            client.list_channels(!include_archived, options).await?
        }
        Command::Users => client.list_users(options).await?,
        Command::Resolve { channel, refresh } => {
            let id = client
                .resolve_channel(&channel, refresh)
                .await
                .with_context(|| format!("cannot resolve {channel}"))?;
            serde_json::json!({ "channel": channel, "id": id })
        }
        Command::Topic { channel, topic } => client.set_topic(&channel, &topic, options).await?,
        Command::Relay { .. } => anyhow::bail!("relay does not run through a plain client"),
    };
    Ok(result)
}

async fn relay_stdin() -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if !line.trim().is_empty() {
            tracing::warn!(target: "relay", "{line}");
        }
    }
    Ok(())
}
