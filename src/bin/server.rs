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

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::{ArgAction, Parser};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use unitgen::{
    config::{Language, ModelConfig, ServerConfig},
    llm::{azure::AzureChatClient, ChatBackend},
    server::{self, AppState},
};

/// STRIDE threat-model endpoint over an architecture diagram upload.
#[derive(Parser, Debug)]
#[command(name = "unitgen-server", version)]
struct Options {
    #[arg(long, env = "SERVER_ADDR", default_value_t = ServerConfig::default().addr)]
    addr: SocketAddr,

    /// Answer with canned analyses instead of calling the model.
    #[arg(long)]
    simulate: bool,

    /// Prompt language: en or pt.
    #[arg(long, env = "PROMPT_LANGUAGE", default_value = "en")]
    language: Language,

    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let options = Options::parse();

    let level = if options.verbose > 0 { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    let config = ServerConfig {
        addr: options.addr,
        simulate: options.simulate,
    };

    let backend: Option<Arc<dyn ChatBackend>> = match ModelConfig::parse_from_env() {
        Ok(model) => {
            info!(deployment = %model.deployment, "using hosted model");
            Some(Arc::new(AzureChatClient::new(model)))
        }
        Err(err) if config.simulate => {
            warn!(error = %err, "model not configured, serving simulated analyses only");
            None
        }
        Err(err) => return Err(err).context("invalid model configuration"),
    };

    let state = Arc::new(AppState {
        backend,
        simulate: config.simulate,
        lang: options.language,
    });

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;
    rt.block_on(server::serve(config.addr, state))
        .context("server stopped")?;
    Ok(())
}
