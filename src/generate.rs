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

use tracing::info;

use crate::{
    config::Language,
    llm::{prompts::build_prompt_in, Dispatcher},
    parse,
    utils::{
        errors::Error,
        files,
        llm::{count_tokens_rough, GenerationStats},
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSuite {
    pub content: String,
    pub output_path: PathBuf,
    pub stats: GenerationStats,
}

/// Extracts the top-level functions of `code`, renders the prompt and asks the
/// dispatcher for a pytest suite. The model's answer is returned untouched.
pub async fn generate_tests_for_code(
    code: &str,
    module_name: &str,
    dispatcher: &dyn Dispatcher,
    lang: Language,
) -> Result<String, Error> {
    info!(module = module_name, "analyzing module");
    let records = parse::extract(code)?;
    if records.is_empty() {
        return Err(Error::NoFunctionsFound);
    }
    let names: Vec<&str> = records.iter().map(|r| r.name()).collect();
    info!(count = records.len(), functions = ?names, "found top-level functions");

    let prompt = build_prompt_in(lang, module_name, &records, code)?;
    info!(prompt_tokens = count_tokens_rough(&prompt), "generating tests");

    let content = dispatcher.dispatch(&prompt).await?;
    info!(chars = content.len(), "tests generated");
    Ok(content)
}

/// Reads `source`, generates its test suite and saves it to `output` (or
/// `test_<module>.py` in the working directory).
///
/// Nothing is written when generation fails. A failed write still returns the
/// generated text inside `Error::Write`.
pub async fn generate_tests_from_file(
    source: &Path,
    dispatcher: &dyn Dispatcher,
    output: Option<&Path>,
    lang: Language,
) -> Result<GeneratedSuite, Error> {
    info!(path = %source.display(), "processing file");
    let code = files::read_source(source)?;
    let module_name = files::module_name(source);

    let content = generate_tests_for_code(&code, &module_name, dispatcher, lang).await?;

    let output_path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| files::default_output_path(&module_name));
    files::write_output(&content, &output_path)?;

    Ok(GeneratedSuite {
        stats: GenerationStats::of(&content),
        content,
        output_path,
    })
}
