mod normalize;
mod results;
mod simulate;
mod warehouse_sync;

use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Instant;

use montefolio_core::{
    Envelope, EnvelopeError, EnvelopeMeta, Payload, ProviderId, SchemaNormalizer, SimulationConfig,
};
use serde_json::Value;
use uuid::Uuid;

use crate::cli::{Cli, Command, PayloadArgs};
use crate::error::CliError;

pub struct CommandResult {
    pub data: Value,
    pub warnings: Vec<String>,
    pub errors: Vec<EnvelopeError>,
    pub source_chain: Vec<String>,
}

impl CommandResult {
    pub fn ok(data: Value, source_chain: Vec<String>) -> Self {
        Self {
            data,
            warnings: Vec::new(),
            errors: Vec::new(),
            source_chain,
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    pub fn with_errors(mut self, errors: Vec<EnvelopeError>) -> Self {
        self.errors.extend(errors);
        self
    }
}

pub fn run(cli: &Cli) -> Result<Envelope<Value>, CliError> {
    let started = Instant::now();
    let config = load_config(cli.config.as_deref())?;

    let result = match &cli.command {
        Command::Normalize(args) => normalize::run(args, cli.warehouse)?,
        Command::Simulate(args) => simulate::run(args, &config, cli.warehouse)?,
        Command::Results(args) => results::run(args)?,
    };

    let CommandResult {
        data,
        warnings,
        errors,
        source_chain,
    } = result;

    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    let mut meta = EnvelopeMeta::new(Uuid::new_v4().to_string(), source_chain, latency_ms)?;
    for warning in warnings {
        meta.push_warning(warning);
    }

    let mut envelope = Envelope::success(meta, data);
    for error in errors {
        envelope.push_error(error)?;
    }
    Ok(envelope)
}

fn load_config(path: Option<&Path>) -> Result<SimulationConfig, CliError> {
    let Some(path) = path else {
        return Ok(SimulationConfig::default());
    };
    let raw = fs::read_to_string(path)?;
    SimulationConfig::from_json(&raw)
        .map_err(|error| CliError::Config(format!("{}: {error}", path.display())))
}

/// Parses `--source`; required whenever payload files are given.
fn parse_source(args: &PayloadArgs) -> Result<ProviderId, CliError> {
    let source = args.source.as_deref().ok_or_else(|| {
        CliError::Command(String::from("--source is required with --input"))
    })?;
    Ok(ProviderId::from_str(source)?)
}

fn normalizer(args: &PayloadArgs) -> SchemaNormalizer {
    match &args.fallback_ticker {
        Some(ticker) => SchemaNormalizer::new().with_fallback_ticker(ticker.clone()),
        None => SchemaNormalizer::new(),
    }
}

fn read_payload(path: &Path) -> Result<Payload, CliError> {
    let raw = fs::read_to_string(path)?;
    Ok(Payload::from_json(&raw)?)
}
