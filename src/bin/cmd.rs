// Copyright 2025 CloudWeGo Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{ArgAction, Parser};
use tracing_subscriber::EnvFilter;

use unitgen::{
    config::{Language, ModelConfig},
    generate::generate_tests_from_file,
    llm::azure::AzureChatClient,
    utils::{errors::Error, files},
};

/// Generate a pytest suite for the top-level functions of a Python module.
#[derive(Parser, Debug)]
#[command(name = "unitgen", version)]
struct Options {
    /// Python module to analyze.
    #[arg(default_value = "sample_module.py")]
    source: PathBuf,

    /// Where to write the suite (default: test_<module>.py in the working directory).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Do not probe the model before generating.
    #[arg(long)]
    skip_check: bool,

    /// Prompt language: en or pt.
    #[arg(long, env = "PROMPT_LANGUAGE", default_value = "en")]
    language: Language,

    /// More logs (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_config(config: &ModelConfig) {
    println!("model configuration:");
    println!("  endpoint:    {}", config.endpoint);
    println!("  deployment:  {}", config.deployment);
    println!("  api version: {}", config.api_version);
    println!("  api key:     {}", config.masked_api_key());
    println!("  temperature: {}", config.temperature);
    println!("  max tokens:  {}", config.max_tokens);
}

fn report_missing_source(source: &Path) {
    eprintln!("source file not found: {}", source.display());
    let candidates = files::list_python_files(Path::new("."));
    if !candidates.is_empty() {
        eprintln!("python files in the current directory:");
        for name in candidates {
            eprintln!("  {name}");
        }
    }
}

fn run(options: Options) -> anyhow::Result<()> {
    if !options.source.exists() {
        report_missing_source(&options.source);
        return Err(Error::SourceNotFound(options.source).into());
    }

    let config = ModelConfig::parse_from_env().context("invalid model configuration")?;
    print_config(&config);
    let client = AzureChatClient::new(config);

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;

    if !options.skip_check {
        let answer = rt
            .block_on(client.check_connection(options.language))
            .context("connection check failed")?;
        println!("connection check: {answer}");
    }

    let suite = rt.block_on(generate_tests_from_file(
        &options.source,
        &client,
        options.output.as_deref(),
        options.language,
    ))?;

    println!("tests saved to {}", suite.output_path.display());
    println!("  lines:          {}", suite.stats.lines);
    println!("  test functions: {}", suite.stats.test_functions);
    println!("run them with: pytest {} -v", suite.output_path.display());
    Ok(())
}

fn main() -> ExitCode {
    // before clap, so PROMPT_LANGUAGE may come from .env
    dotenv::dotenv().ok();
    let options = Options::parse();
    init_tracing(options.verbose);

    match run(options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            if let Some(hint) = err.downcast_ref::<Error>().and_then(Error::hint) {
                eprintln!("hint: {hint}");
            }
            ExitCode::FAILURE
        }
    }
}
