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

use std::sync::OnceLock;

use regex::Regex;

// roughly count the tokens in a text.
pub fn count_tokens_rough(text: &str) -> usize {
    text.lines()
        .map(|line| {
            line.split(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
                .filter(|t| !t.is_empty())
                .count()
        })
        .sum()
}

fn test_def_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?m)^[ \t]*(?:async[ \t]+)?def[ \t]+test_\w*").expect("static pattern")
    })
}

/// Size of a generated test suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationStats {
    pub lines: usize,
    pub test_functions: usize,
}

impl GenerationStats {
    pub fn of(content: &str) -> Self {
        Self {
            lines: content.split('\n').count(),
            test_functions: test_def_pattern().find_iter(content).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rough_token_count() {
        assert_eq!(count_tokens_rough("def add(a, b):\n    return a + b"), 7);
        assert_eq!(count_tokens_rough(""), 0);
    }

    #[test]
    fn stats_of_generated_suite() {
        let suite = "import pytest\nfrom calc import add\n\n\
@pytest.mark.parametrize(\"a,b,want\", [(1, 2, 3)])\n\
def test_add_success_cases(a, b, want):\n    assert add(a, b) == want\n\n\
class TestAdd:\n    def test_add_edge_cases(self):\n        assert add(0, 0) == 0\n\n\
def helper_test_data():\n    return []\n";
        let stats = GenerationStats::of(suite);
        assert_eq!(stats.test_functions, 2);
        assert_eq!(stats.lines, 14);
    }
}
