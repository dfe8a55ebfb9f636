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

use std::io;
use std::path::PathBuf;

use thiserror::Error as ThisError;

// Every failure the generator and the threat server can surface to their callers.
#[derive(Debug, ThisError)]
pub enum Error {
    #[error("invalid Python source: {0}")]
    Syntax(String),

    #[error("no top-level function found in the provided source")]
    NoFunctionsFound,

    #[error("source file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // the generated text is kept so a failed write never loses it
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
        content: String,
    },

    #[error("model request failed: {0}")]
    Dispatch(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid form: {0}")]
    Form(String),
}

impl Error {
    /// Generated content carried by a failed write, if any.
    pub fn recovered_content(&self) -> Option<&str> {
        match self {
            Error::Write { content, .. } => Some(content.as_str()),
            _ => None,
        }
    }

    // One-line suggestion for the most common hosted-model failures.
    pub fn hint(&self) -> Option<&'static str> {
        let Error::Dispatch(message) = self else {
            return None;
        };
        let message = message.to_lowercase();
        if message.contains("404") {
            Some("check that the deployment exists and its name is correct")
        } else if message.contains("401") || message.contains("unauthorized") {
            Some("check that the API key is correct and still valid")
        } else if message.contains("timeout") || message.contains("timed out") {
            Some("connectivity problem, try again")
        } else {
            None
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Error {
        Error::Dispatch(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_error_keeps_content() {
        let err = Error::Write {
            path: PathBuf::from("/nope/test_x.py"),
            source: io::Error::new(io::ErrorKind::NotFound, "missing dir"),
            content: "import pytest\n".to_string(),
        };
        assert_eq!(err.recovered_content(), Some("import pytest\n"));
        assert!(err.to_string().contains("/nope/test_x.py"));
        assert_eq!(Error::NoFunctionsFound.recovered_content(), None);
    }

    #[test]
    fn dispatch_hints() {
        assert!(Error::Dispatch("status 404 Not Found".into())
            .hint()
            .unwrap()
            .contains("deployment"));
        assert!(Error::Dispatch("401 Unauthorized".into())
            .hint()
            .unwrap()
            .contains("API key"));
        assert!(Error::Dispatch("operation timed out".into()).hint().is_some());
        assert_eq!(Error::Dispatch("boom".into()).hint(), None);
        assert_eq!(Error::NoFunctionsFound.hint(), None);
    }
}
