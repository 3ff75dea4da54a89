//! Wires configuration, HTTP client, backends and pipeline together for one run.

use std::time::Duration;

use reqwest::{Client, Proxy};
use tracing::{info, warn};

use crate::cli::Cli;
use crate::config::{Config, ConfigError};
use crate::extract::ConstraintExtractor;
use crate::llm::OpenAiClient;
use crate::pipeline::{
    InputError, JsonlWriter, OutputError, Pipeline, RunSummary, load_records, write_json_pretty,
};
use crate::search::{Backend, BaiduClient, GoogleClient, MultiSearch};
use crate::synth::AnswerSynthesizer;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Fatal errors; each one stops the run.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("input error: {0}")]
    Input(#[from] InputError),

    #[error("output error: {0}")]
    Output(#[from] OutputError),

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Runs the whole batch. Configuration is validated before the input is read
/// or the output file is touched.
pub async fn run(
    cli: &Cli,
    load_config: impl FnOnce() -> Result<Config, ConfigError>,
) -> Result<RunSummary, AppError> {
    let config = load_config()?;
    let http = http_client(&config, Duration::from_secs(cli.timeout_secs.max(1)))?;

    let records = load_records(&cli.input, &cli.input_fields())?;
    info!(path = %cli.input.display(), records = records.len(), "input loaded");

    let mut backends = Vec::new();
    if let Some(google) = &config.google {
        backends.push(Backend::Google(GoogleClient::new(http.clone(), google, cli.top_k)));
    }
    if let Some(baidu) = &config.baidu {
        backends.push(Backend::Baidu(BaiduClient::new(http.clone(), baidu, cli.top_k)));
    }
    info!(
        google = config.google.is_some(),
        baidu = config.baidu.is_some(),
        model = %config.llm.model,
        "search backends configured"
    );

    let llm = OpenAiClient::new(http, &config.llm);
    let pipeline = Pipeline::new(
        ConstraintExtractor::new(llm.clone()),
        MultiSearch::new(backends),
        AnswerSynthesizer::new(llm, cli.synthesis_options()),
        cli.concurrency,
    );

    let mut writer = JsonlWriter::create(&cli.output)?;
    let report = pipeline.run(&records, &mut writer).await?;
    info!(path = %cli.output.display(), "answers written");

    if let Some(path) = &cli.process_log {
        match write_json_pretty(path, &report.traces) {
            Ok(()) => info!(path = %path.display(), "process log written"),
            Err(error) => warn!(%error, "failed to write process log"),
        }
    }

    Ok(report.summary)
}

fn http_client(config: &Config, timeout: Duration) -> Result<Client, AppError> {
    let mut builder = Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(timeout);
    if let Some(proxy) = &config.proxy {
        let proxy = Proxy::all(proxy).map_err(|e| ConfigError::Invalid {
            var: "PROXY_URL",
            reason: e.to_string(),
        })?;
        builder = builder.proxy(proxy);
    }
    Ok(builder.build()?)
}
