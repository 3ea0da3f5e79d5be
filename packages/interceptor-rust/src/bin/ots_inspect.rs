//! `ots-inspect`: decodes and encodes the wire artifacts the transaction
//! interceptors exchange.
//!
//! - `ots-inspect context <hex>` decodes a transaction service context
//! - `ots-inspect policy <hex> --kind ots|invocation` decodes a policy component
//! - `ots-inspect encode-policy --kind ots --value REQUIRES` prints component hex
//! - `ots-inspect config` prints the effective interceptor switches

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ots_core::{
    CdrCodecFactory, Codec, CodecFactory, Encoding, InvocationPolicyValue, OtsPolicyValue,
    PropagationContext, TAG_INV_POLICY, TAG_OTS_POLICY,
};
use ots_interceptor::config::{CLIENT_POLICY_CHECKING_ENV, INTEROP_MODE_ENV};
use ots_interceptor::InterceptorConfig;
use serde_json::json;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ots-inspect", version, about = "Inspect OTS transaction contexts and policy components")]
struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, env = "OTS_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode a propagation context (service context data, hex)
    Context {
        /// CDR 1.2 encapsulation, hex encoded
        data: String,
    },

    /// Decode a policy tagged component (component data, hex)
    Policy {
        /// CDR 1.2 encapsulation, hex encoded
        data: String,

        #[arg(long, value_enum)]
        kind: PolicyKind,
    },

    /// Encode a policy value as tagged component data
    EncodePolicy {
        #[arg(long, value_enum)]
        kind: PolicyKind,

        /// Symbolic (REQUIRES, SHARED, ...) or numeric policy value
        #[arg(long)]
        value: String,
    },

    /// Print the interceptor switches as the ORB would read them
    Config {
        #[arg(long, env = CLIENT_POLICY_CHECKING_ENV, default_value = "true")]
        client_policy_checking: String,

        #[arg(long, env = INTEROP_MODE_ENV, default_value = "true")]
        interop_mode: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyKind {
    Ots,
    Invocation,
}

impl PolicyKind {
    fn tag(self) -> u32 {
        match self {
            Self::Ots => TAG_OTS_POLICY,
            Self::Invocation => TAG_INV_POLICY,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    let codec = CdrCodecFactory
        .create_codec(Encoding::CDR_ENCAPS_1_2)
        .context("CDR 1.2 codec")?;

    let output = match cli.command {
        Command::Context { data } => inspect_context(&codec, &data)?,
        Command::Policy { data, kind } => inspect_policy(&codec, &data, kind)?,
        Command::EncodePolicy { kind, value } => encode_policy(&codec, kind, &value)?,
        Command::Config {
            client_policy_checking,
            interop_mode,
        } => serde_json::to_value(config_from_switches(&client_policy_checking, &interop_mode))?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn config_from_switches(client_policy_checking: &str, interop_mode: &str) -> InterceptorConfig {
    InterceptorConfig::from_lookup(|key| match key {
        CLIENT_POLICY_CHECKING_ENV => Some(client_policy_checking.to_owned()),
        INTEROP_MODE_ENV => Some(interop_mode.to_owned()),
        _ => None,
    })
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("invalid log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
    Ok(())
}

fn decode_hex(data: &str) -> Result<Vec<u8>> {
    let trimmed: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(trimmed.trim_start_matches("0x")).context("input is not valid hex")
}

fn inspect_context(codec: &Arc<dyn Codec>, data: &str) -> Result<serde_json::Value> {
    let bytes = decode_hex(data)?;
    debug!(len = bytes.len(), "decoding propagation context");
    let ctx = codec
        .decode_context(&bytes)
        .context("not a propagation context")?;

    Ok(json!({
        "classification": classify(&ctx),
        "context": ctx,
    }))
}

/// Every dummy context is also a null context, so dummy is checked first.
fn classify(ctx: &PropagationContext) -> &'static str {
    if ctx.is_dummy() {
        "dummy"
    } else if ctx.is_null() {
        "null"
    } else {
        "transaction"
    }
}

fn inspect_policy(
    codec: &Arc<dyn Codec>,
    data: &str,
    kind: PolicyKind,
) -> Result<serde_json::Value> {
    let bytes = decode_hex(data)?;
    let raw = codec
        .decode_short(&bytes)
        .context("not a policy component")?;

    let name = match kind {
        PolicyKind::Ots => OtsPolicyValue::try_from(raw).map(|v| v.to_string()),
        PolicyKind::Invocation => InvocationPolicyValue::try_from(raw).map(|v| v.to_string()),
    };
    let Ok(name) = name else {
        bail!("unknown policy value {raw}");
    };
    Ok(json!({
        "tag": kind.tag(),
        "value": raw,
        "name": name,
    }))
}

fn encode_policy(
    codec: &Arc<dyn Codec>,
    kind: PolicyKind,
    value: &str,
) -> Result<serde_json::Value> {
    let raw = match kind {
        PolicyKind::Ots => parse_ots(value)?.as_i16(),
        PolicyKind::Invocation => parse_invocation(value)?.as_i16(),
    };
    let bytes = codec.encode_short(raw)?;
    Ok(json!({
        "tag": kind.tag(),
        "component_data": hex::encode(bytes),
    }))
}

fn parse_ots(value: &str) -> Result<OtsPolicyValue> {
    match value.to_ascii_uppercase().as_str() {
        "REQUIRES" => Ok(OtsPolicyValue::Requires),
        "FORBIDS" => Ok(OtsPolicyValue::Forbids),
        "ADAPTS" => Ok(OtsPolicyValue::Adapts),
        other => {
            let raw: i16 = other.parse().with_context(|| format!("unknown OTS policy {value}"))?;
            OtsPolicyValue::try_from(raw).map_err(|v| anyhow::anyhow!("OTS policy out of range: {v}"))
        }
    }
}

fn parse_invocation(value: &str) -> Result<InvocationPolicyValue> {
    match value.to_ascii_uppercase().as_str() {
        "EITHER" => Ok(InvocationPolicyValue::Either),
        "SHARED" => Ok(InvocationPolicyValue::Shared),
        "UNSHARED" => Ok(InvocationPolicyValue::Unshared),
        other => {
            let raw: i16 = other
                .parse()
                .with_context(|| format!("unknown invocation policy {value}"))?;
            InvocationPolicyValue::try_from(raw)
                .map_err(|v| anyhow::anyhow!("invocation policy out of range: {v}"))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
