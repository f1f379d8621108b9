//! Storage protocol diagnostic tool.
//!
//! Decodes captured storage messages, prints node routes and encodes a
//! sample command at any supported wire version.

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use storage_api::message::PutCommand;
use storage_api::{
    Bucket, BucketId, BucketInfo, Document, DocumentId, NodeType, Render, StorageCommand,
    StorageMessageAddress, StorageReply, Timestamp,
};
use storage_protocol::{PendingCommands, StorageProtocol, WireVersion};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[macro_use]
mod logging;
mod config;

use config::ProtocolConfig;
use logging::StorageLogFormatter;

/// Storage protocol inspection tool
#[derive(Parser, Debug)]
#[command(name = "storage-proto", version, about = "Encode, decode and inspect storage protocol messages")]
struct Args {
    /// Path to the shared config file
    #[arg(long, default_value = "./config.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the route of a cluster node
    Address {
        /// Cluster name, defaults to the configured cluster
        #[arg(long)]
        cluster: Option<String>,

        /// Node role: storage or distributor
        #[arg(long, default_value = "storage")]
        node_type: NodeType,

        /// Node index
        #[arg(long)]
        index: u16,
    },

    /// Decode a hex encoded command
    Decode {
        /// Wire version the bytes were encoded at, e.g. 5.1.0
        #[arg(long)]
        version: Option<WireVersion>,

        /// Message bytes as hex, whitespace allowed
        #[arg(long)]
        hex: String,

        /// Render with every field and the message header
        #[arg(long)]
        verbose: bool,

        /// Print a JSON summary instead of the rendering
        #[arg(long)]
        json: bool,
    },

    /// Encode a sample put and its reply and show the wire form
    Demo {
        /// Wire version to encode at
        #[arg(long)]
        version: Option<WireVersion>,
    },

    /// Print the effective configuration as JSON
    Config,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let env_filter = EnvFilter::new("warn")
        .add_directive(format!("storage_proto={}", args.log_level).parse()?)
        .add_directive(format!("storage_protocol={}", args.log_level).parse()?)
        .add_directive(format!("storage_api={}", args.log_level).parse()?)
        .add_directive(format!("storage_wire={}", args.log_level).parse()?);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .event_format(StorageLogFormatter::new("storage-proto"))
        .init();

    info!("Starting storage-proto v{}", env!("CARGO_PKG_VERSION"));

    let config = ProtocolConfig::load_from_file(&args.config)?;
    let default_version = config.wire_version()?;

    match args.command {
        Command::Address {
            cluster,
            node_type,
            index,
        } => {
            let cluster = cluster.unwrap_or_else(|| config.cluster.clone());
            let address = StorageMessageAddress::new(cluster, node_type, index);
            println!("{}", address.route());
        }
        Command::Decode {
            version,
            hex,
            verbose,
            json,
        } => {
            let version = version.unwrap_or(default_version);
            decode(&config.protocol(), &hex, version, verbose, json)?;
        }
        Command::Demo { version } => {
            demo(&config, version.unwrap_or(default_version))?;
        }
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }
    Ok(())
}

fn decode(protocol: &StorageProtocol, input: &str, version: WireVersion, verbose: bool, json: bool) -> Result<()> {
    let bytes = parse_hex(input)?;
    component_debug!("decode", "Decoding {} bytes at {}", bytes.len(), version);
    let cmd = protocol
        .decode_command(bytes, version)
        .with_context(|| format!("failed to decode command at {}", version))?;

    if json {
        let summary = serde_json::json!({
            "kind": cmd.kind().name(),
            "msg_id": cmd.msg_id().0,
            "priority": cmd.header().priority,
            "load_type": cmd.header().load_type.name,
            "source_index": cmd.header().source_index,
            "bucket": cmd.bucket().map(|b| b.to_string()),
            "size": cmd.approx_size(),
            "rendered": cmd.rendered(verbose, ""),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", cmd.rendered(verbose, ""));
    }
    Ok(())
}

fn demo(config: &ProtocolConfig, version: WireVersion) -> Result<()> {
    let protocol = config.protocol();
    let pending = PendingCommands::new();

    let doc_type = config
        .document_types
        .first()
        .context("no document types configured")?;
    let id = DocumentId::parse(format!("id:demo:{}::sample", doc_type))?;
    let document = Document::new(id, Bytes::from_static(b"headerval=17"));
    let mut put = PutCommand::new(
        Bucket::in_default_space(BucketId::new(16, 0x51)),
        document,
        Timestamp(14),
    );
    put.update_timestamp = Timestamp(13);
    let cmd = StorageCommand::Put(put);

    let encoded = protocol.encode_command(&cmd, version)?;
    println!("{}", cmd.rendered(true, ""));
    println!("command at {}: {} bytes", version, encoded.len());
    println!("{}", hex::encode(&encoded));
    pending.insert(cmd.clone());

    let mut reply = cmd.make_reply();
    if let StorageReply::Put(put_reply) = &mut reply {
        put_reply.bucket_info = BucketInfo::with_flags(0x1234, 1, 12, true, true);
    }
    let reply_bytes = protocol.encode_reply(&reply, version)?;
    println!("reply at {}: {} bytes", version, reply_bytes.len());
    println!("{}", hex::encode(&reply_bytes));

    let decoded = pending.decode_reply(&protocol, reply_bytes, version)?;
    println!("{}", decoded.rendered(true, ""));

    let expired = pending.expire(config.pending_timeout);
    if !expired.is_empty() {
        component_warn!("demo", "{} commands expired without a reply", expired.len());
    }
    component_info!("demo", "Demo round trip at {} complete", version);
    Ok(())
}

fn parse_hex(input: &str) -> Result<Bytes> {
    let digits: String = input.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = hex::decode(&digits).with_context(|| format!("invalid hex input {:?}", digits))?;
    Ok(Bytes::from(bytes))
}
