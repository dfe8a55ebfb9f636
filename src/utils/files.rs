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

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use walkdir::WalkDir;

use super::errors::Error;

const DIVIDER: &str = "--------------------------------------------------";

pub fn read_source(path: &Path) -> Result<String, Error> {
    if !path.exists() {
        return Err(Error::SourceNotFound(path.to_path_buf()));
    }
    let code = fs::read_to_string(path)?;
    info!(path = %path.display(), chars = code.chars().count(), "read source file");
    Ok(code)
}

// module name is the file stem: `pkg/sample_module.py` -> `sample_module`
pub fn module_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub fn default_output_path(module_name: &str) -> PathBuf {
    PathBuf::from(format!("test_{module_name}.py"))
}

/// Writes `content` to `path`, replacing whatever was there.
///
/// When the write fails the content is printed to stdout between dividers and
/// travels back inside `Error::Write`, so it is never lost.
pub fn write_output(content: &str, path: &Path) -> Result<(), Error> {
    match fs::write(path, content) {
        Ok(()) => {
            info!(path = %path.display(), "test file saved");
            Ok(())
        }
        Err(source) => {
            warn!(path = %path.display(), error = %source, "failed to save test file, printing it instead");
            println!("{DIVIDER}");
            println!("{content}");
            println!("{DIVIDER}");
            Err(Error::Write {
                path: path.to_path_buf(),
                source,
                content: content.to_string(),
            })
        }
    }
}

/// Python files directly under `dir` that are not themselves test files.
pub fn list_python_files(dir: &Path) -> Vec<String> {
    let mut files: Vec<String> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .filter(|name| name.ends_with(".py") && !name.starts_with("test_"))
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_and_paths() {
        assert_eq!(module_name(Path::new("pkg/sample_module.py")), "sample_module");
        assert_eq!(module_name(Path::new("calc")), "calc");
        assert_eq!(default_output_path("calc"), PathBuf::from("test_calc.py"));
    }

    #[test]
    fn read_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.py");
        assert!(matches!(read_source(&missing), Err(Error::SourceNotFound(p)) if p == missing));
    }

    #[test]
    fn write_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test_calc.py");
        fs::write(&path, "old content that is longer than the new one").unwrap();

        write_output("import pytest\n", &path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "import pytest\n");
    }

    #[test]
    fn failed_write_keeps_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("test_calc.py");
        let content = "import pytest\n\ndef test_add_success_cases():\n    pass\n".to_string();

        let err = write_output(&content, &path).unwrap_err();
        assert!(matches!(err, Error::Write { .. }));
        assert_eq!(err.recovered_content(), Some(content.as_str()));
        assert!(!path.exists());
    }

    #[test]
    fn lists_candidate_modules() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.py", "a.py", "test_a.py", "notes.txt"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        fs::create_dir(dir.path().join("pkg")).unwrap();
        fs::write(dir.path().join("pkg").join("c.py"), "").unwrap();

        assert_eq!(list_python_files(dir.path()), vec!["a.py", "b.py"]);
    }
}
