//! `rmq-topology`: declare and inspect broker/trigger wiring from the shell.

use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use rmq_topology_client::{
    CancellationToken, ManagementClient, ManagementConfig, TopologyClient, TopologyConfig,
    TopologyDeclarer,
};
use rmq_topology_core::{make_binding, make_dlq_binding, BindingArgs, Broker, Identity, Trigger};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "rmq-topology", version, about = "Declare broker/trigger bindings on RabbitMQ")]
struct Cli {
    /// AMQP URL including credentials and vhost.
    #[arg(long, env = "RMQ_TOPOLOGY_AMQP_URL")]
    amqp_url: String,

    /// Management API port (introspection only).
    #[arg(long, env = "RMQ_TOPOLOGY_MANAGEMENT_PORT", default_value_t = 15672)]
    management_port: u16,

    #[arg(long, env = "RMQ_TOPOLOGY_MANAGEMENT_SCHEME", default_value = "http")]
    management_scheme: String,

    #[arg(long, env = "RMQ_TOPOLOGY_CONNECT_TIMEOUT_MS", default_value_t = 10_000)]
    connect_timeout_ms: u64,

    #[arg(long, env = "RMQ_TOPOLOGY_BIND_TIMEOUT_MS", default_value_t = 10_000)]
    bind_timeout_ms: u64,

    #[arg(long, value_enum, env = "RMQ_TOPOLOGY_LOG_FORMAT", default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Args)]
struct BrokerArgs {
    #[arg(long)]
    namespace: String,
    #[arg(long)]
    broker: String,
    #[arg(long)]
    broker_uid: String,
}

impl BrokerArgs {
    fn to_broker(&self) -> Broker {
        Broker::new(Identity::new(&self.namespace, &self.broker, &self.broker_uid))
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Bind a trigger's queue to its broker's exchange.
    Bind {
        #[command(flatten)]
        broker: BrokerArgs,
        #[arg(long)]
        trigger: String,
        #[arg(long)]
        trigger_uid: String,
        /// Filter attribute as `key=value`; repeatable.
        #[arg(long = "filter", value_parser = parse_attribute)]
        filters: Vec<(String, String)>,
        #[arg(long, default_value = "")]
        routing_key: String,
        /// Print the resolved binding without contacting the broker.
        #[arg(long)]
        dry_run: bool,
    },
    /// Bind a queue to a trigger- or broker-level dead-letter exchange.
    BindDlq {
        #[command(flatten)]
        broker: BrokerArgs,
        /// Selects the trigger's dead-letter exchange; requires `--trigger-uid`.
        #[arg(long)]
        trigger: Option<String>,
        #[arg(long)]
        trigger_uid: Option<String>,
        #[arg(long)]
        queue: String,
        #[arg(long, default_value = "")]
        routing_key: String,
        #[arg(long)]
        dry_run: bool,
    },
    /// Declare a durable headers exchange.
    DeclareExchange { name: String },
    /// Declare a durable queue.
    DeclareQueue {
        name: String,
        #[arg(long)]
        dead_letter_exchange: Option<String>,
    },
    /// List bindings through the management API.
    Bindings {
        /// Only bindings whose source starts with this prefix.
        #[arg(long)]
        source_prefix: Option<String>,
    },
}

fn parse_attribute(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected key=value, got {raw:?}"))
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = TopologyConfig {
        connect_timeout: Duration::from_millis(cli.connect_timeout_ms),
        bind_timeout: Duration::from_millis(cli.bind_timeout_ms),
        ..TopologyConfig::default()
    };
    let client = TopologyClient::new(config);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling");
            on_signal.cancel();
        }
    });

    let base = BindingArgs::new(cli.amqp_url.clone()).with_management_port(cli.management_port);

    match cli.command {
        Command::Bind {
            broker,
            trigger,
            trigger_uid,
            filters,
            routing_key,
            dry_run,
        } => {
            let trigger = Trigger::new(
                Identity::new(&broker.namespace, trigger, trigger_uid),
                &broker.broker,
            )
            .with_filter(filters);
            let args = base
                .with_routing_key(routing_key)
                .with_broker(broker.to_broker())
                .with_trigger(trigger);
            let request = if dry_run {
                make_binding(&args)?
            } else {
                client.bind(&args, &cancel).await?
            };
            print_json(&request)?;
        }
        Command::BindDlq {
            broker,
            trigger,
            trigger_uid,
            queue,
            routing_key,
            dry_run,
        } => {
            let mut args = base
                .with_routing_key(routing_key)
                .with_broker(broker.to_broker())
                .with_queue_name(queue);
            if trigger.is_some() || trigger_uid.is_some() {
                args = args.with_trigger(Trigger::new(
                    Identity::new(
                        &broker.namespace,
                        trigger.unwrap_or_default(),
                        trigger_uid.unwrap_or_default(),
                    ),
                    &broker.broker,
                ));
            }
            let request = if dry_run {
                make_dlq_binding(&args)?
            } else {
                client.bind_dead_letter(&args, &cancel).await?
            };
            print_json(&request)?;
        }
        Command::DeclareExchange { name } => {
            client.declare_exchange(&cli.amqp_url, &name, &cancel).await?;
        }
        Command::DeclareQueue {
            name,
            dead_letter_exchange,
        } => {
            client
                .declare_queue(&cli.amqp_url, &name, dead_letter_exchange.as_deref(), &cancel)
                .await?;
        }
        Command::Bindings { source_prefix } => {
            let management_config = ManagementConfig {
                scheme: cli.management_scheme,
                ..ManagementConfig::default()
            };
            let management = ManagementClient::from_broker_url(
                &cli.amqp_url,
                cli.management_port,
                &management_config,
            )
            .context("building management client")?;
            let bindings = match source_prefix {
                Some(prefix) => management.bindings_with_source_prefix(&prefix).await?,
                None => management.list_bindings().await?,
            };
            print_json(&bindings)?;
        }
    }
    Ok(())
}
