//! Runner units and the one-line protocol they speak.
//!
//! A runner unit is the preamble, the submission and a small driver that
//! evaluates one call expression and prints a single JSON line:
//! `{"status": "ok", "result": ...}` or `{"status": "error", "error": "..."}`.

use crate::engine::ExecutionOutput;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Diagnostics copied into a test outcome are cut to this many characters
pub const MAX_SNIPPET_CHARS: usize = 500;

/// What one execution of a runner unit amounted to
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The call returned and its result was serialized
    Returned(Value),
    Error(String),
    Timeout(String),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum RunnerReply {
    Ok {
        #[serde(default)]
        result: Value,
    },
    Error {
        #[serde(default)]
        error: String,
    },
}

fn is_blank(line: &str) -> bool {
    line.trim_matches([' ', '\t', '\r']).is_empty()
}

fn leading_whitespace(line: &str) -> &str {
    let content = line.trim_start_matches([' ', '\t']);
    &line[..line.len() - content.len()]
}

fn common_prefix<'a>(a: &'a str, b: &str) -> &'a str {
    let len = a
        .bytes()
        .zip(b.bytes())
        .take_while(|(x, y)| x == y)
        .count();
    &a[..len]
}

/// Remove the whitespace prefix shared by every non-blank line.
/// Whitespace-only lines become empty.
pub fn dedent(text: &str) -> String {
    let mut margin: Option<&str> = None;
    for line in text.lines() {
        if is_blank(line) {
            continue;
        }
        let indent = leading_whitespace(line);
        margin = Some(match margin {
            None => indent,
            Some(current) => common_prefix(current, indent),
        });
    }
    let margin_len = margin.map(str::len).unwrap_or(0);

    let mut out = String::with_capacity(text.len());
    for segment in text.split_inclusive('\n') {
        let (line, ending) = match segment.strip_suffix('\n') {
            Some(line) => (line, "\n"),
            None => (segment, ""),
        };
        if !is_blank(line) {
            out.push_str(&line[margin_len..]);
        }
        out.push_str(ending);
    }
    out
}

/// Assemble the self-contained unit executed for one test case
pub fn build_runner_unit(preamble: Option<&str>, submission: &str, call: &str) -> String {
    let mut unit = String::from("import json, sys\n");
    if let Some(preamble) = preamble.filter(|p| !p.trim().is_empty()) {
        unit.push_str(&dedent(preamble));
        unit.push('\n');
    }
    unit.push_str(&dedent(submission));
    unit.push_str("\n\n");
    unit.push_str("try:\n");
    unit.push_str(&format!("    result = {}\n", call.trim()));
    unit.push_str("    print(json.dumps({\"status\": \"ok\", \"result\": result}))\n");
    unit.push_str("except Exception as exc:\n");
    unit.push_str("    print(json.dumps({\"status\": \"error\", \"error\": str(exc)}))\n");
    unit
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn snippet(text: &str) -> String {
    truncate_chars(text, MAX_SNIPPET_CHARS).trim().to_string()
}

/// "5s", "1.5s"
fn format_limit(limit: Duration) -> String {
    format!("{}s", limit.as_millis() as f64 / 1000.0)
}

/// Interpret the raw output of a runner unit
pub fn classify_output(output: &ExecutionOutput, limit: Duration) -> RunOutcome {
    if output.timed_out {
        return RunOutcome::Timeout(format!("Exceeded {} time limit.", format_limit(limit)));
    }

    let stderr = snippet(&output.stderr);
    let raw = output.stdout.trim();
    if raw.is_empty() {
        if stderr.is_empty() {
            return RunOutcome::Error("No output produced.".to_string());
        }
        return RunOutcome::Error(stderr);
    }

    // Submissions may print their own diagnostics; the reply is the last line
    let last_line = raw.lines().filter(|line| !is_blank(line)).last().unwrap_or(raw);

    match serde_json::from_str::<RunnerReply>(last_line) {
        Ok(RunnerReply::Ok { result }) => RunOutcome::Returned(result),
        Ok(RunnerReply::Error { error }) => {
            RunOutcome::Error(truncate_chars(&error, MAX_SNIPPET_CHARS))
        }
        Err(_) if !stderr.is_empty() => RunOutcome::Error(stderr),
        Err(_) => RunOutcome::Error(format!("Could not parse output: {}", snippet(raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_output(stdout: &str, stderr: &str) -> ExecutionOutput {
        ExecutionOutput {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            execution_time_ms: 12,
            timed_out: false,
            exit_code: Some(0),
            runtime_error: false,
        }
    }

    #[test]
    fn test_dedent_removes_common_margin() {
        let code = "    def f():\n        return 1\n  \n    x = f()\n";
        assert_eq!(dedent(code), "def f():\n    return 1\n\nx = f()\n");
    }

    #[test]
    fn test_dedent_keeps_unindented_text() {
        let code = "def f():\n\treturn 1";
        assert_eq!(dedent(code), code);
    }

    #[test]
    fn test_dedent_mixed_tabs_and_spaces_share_nothing() {
        let code = "\tx = 1\n    y = 2\n";
        assert_eq!(dedent(code), code);
    }

    #[test]
    fn test_runner_unit_layout() {
        let unit = build_runner_unit(
            Some("  class TreeNode:\n      pass\n"),
            "    def solve(x):\n        return x\n",
            " solve(3) ",
        );

        assert!(unit.starts_with("import json, sys\n"));
        let preamble_at = unit.find("class TreeNode:").unwrap();
        let solution_at = unit.find("def solve(x):\n    return x").unwrap();
        let driver_at = unit.find("    result = solve(3)\n").unwrap();
        assert!(preamble_at < solution_at && solution_at < driver_at);
        assert!(unit.contains("except Exception as exc:"));
    }

    #[test]
    fn test_runner_unit_without_preamble() {
        let unit = build_runner_unit(None, "def f():\n    return 1\n", "f()");
        assert!(!unit.contains("TreeNode"));
        assert!(unit.contains("result = f()"));
    }

    #[test]
    fn test_classify_ok_reply_uses_last_line() {
        let output = make_output(
            "debugging...\n{\"status\": \"ok\", \"result\": [0, 1]}\n\n",
            "",
        );
        assert_eq!(
            classify_output(&output, Duration::from_secs(5)),
            RunOutcome::Returned(json!([0, 1]))
        );
    }

    #[test]
    fn test_classify_null_result() {
        let output = make_output("{\"status\": \"ok\", \"result\": null}\n", "");
        assert_eq!(
            classify_output(&output, Duration::from_secs(5)),
            RunOutcome::Returned(Value::Null)
        );
    }

    #[test]
    fn test_classify_error_reply() {
        let output = make_output("{\"status\": \"error\", \"error\": \"division by zero\"}\n", "");
        assert_eq!(
            classify_output(&output, Duration::from_secs(5)),
            RunOutcome::Error("division by zero".to_string())
        );
    }

    #[test]
    fn test_classify_empty_stdout() {
        let silent = make_output("", "");
        assert_eq!(
            classify_output(&silent, Duration::from_secs(5)),
            RunOutcome::Error("No output produced.".to_string())
        );

        let long_trace = "Traceback ".repeat(100);
        let crashed = make_output("  \n", &long_trace);
        match classify_output(&crashed, Duration::from_secs(5)) {
            RunOutcome::Error(message) => {
                assert!(message.starts_with("Traceback"));
                assert!(message.chars().count() <= MAX_SNIPPET_CHARS);
            }
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_unparseable_output() {
        let output = make_output("42\n", "");
        assert_eq!(
            classify_output(&output, Duration::from_secs(5)),
            RunOutcome::Error("Could not parse output: 42".to_string())
        );

        let with_trace = make_output("partial\n", "SyntaxError: bad");
        assert_eq!(
            classify_output(&with_trace, Duration::from_secs(5)),
            RunOutcome::Error("SyntaxError: bad".to_string())
        );
    }

    #[test]
    fn test_classify_timeout_message() {
        let mut output = make_output("", "");
        output.timed_out = true;
        assert_eq!(
            classify_output(&output, Duration::from_secs(5)),
            RunOutcome::Timeout("Exceeded 5s time limit.".to_string())
        );
        assert_eq!(
            classify_output(&output, Duration::from_millis(1500)),
            RunOutcome::Timeout("Exceeded 1.5s time limit.".to_string())
        );
    }
}
