//! Regression corpus runner
//!
//! A corpus is a text file of examples evaluated in order by one shared
//! interpreter:
//!
//! ```text
//! ; comment
//! >>> (define (double x)
//! ...   (* 2 x))
//! <lambda double>
//! >>> (double 21)
//! 42
//! >>> (car 5)
//! !! TypeError
//! ```
//!
//! The line after the source is the expected printed result, or `!! Kind`
//! when evaluation must fail with that [`ErrorKind`](crate::ErrorKind).

use crate::interpreter::Interpreter;

/// The corpus shipped with the crate
pub const BUNDLED: &str = include_str!("../corpus/psil.test");

/// One example from a corpus file
#[derive(Debug, Clone, PartialEq)]
pub struct Example {
    /// Line of the `>>>` prompt (1-indexed)
    pub line: usize,
    /// Source text, continuation lines joined with newlines
    pub source: String,
    /// Expected printed result or `!! Kind`
    pub expected: String,
}

/// An example whose outcome differed from the expectation
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub example: Example,
    pub actual: String,
}

/// Outcome of running a corpus
#[derive(Debug, Default)]
pub struct CorpusReport {
    pub passed: usize,
    pub failures: Vec<Failure>,
}

impl CorpusReport {
    pub fn total(&self) -> usize {
        self.passed + self.failures.len()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Splits corpus text into examples
pub fn parse_corpus(text: &str) -> Vec<Example> {
    let mut examples = Vec::new();
    let mut current: Option<Example> = None;
    let mut in_source = false;

    for (index, line) in text.lines().enumerate() {
        if let Some(source) = line.strip_prefix(">>>") {
            examples.extend(current.take());
            current = Some(Example {
                line: index + 1,
                source: source.trim_start().to_string(),
                expected: String::new(),
            });
            in_source = true;
            continue;
        }

        let Some(example) = current.as_mut() else {
            continue;
        };

        if in_source {
            if let Some(more) = line.strip_prefix("...") {
                example.source.push('\n');
                example.source.push_str(more.strip_prefix(' ').unwrap_or(more));
                continue;
            }
            in_source = false;
        }

        if line.trim().is_empty() || line.starts_with(';') {
            examples.extend(current.take());
            continue;
        }

        if !example.expected.is_empty() {
            example.expected.push('\n');
        }
        example.expected.push_str(line.trim_end());
    }

    examples.extend(current);
    examples
}

/// Evaluates one example and renders its outcome the way corpora spell it
pub fn render_outcome(interpreter: &mut Interpreter, source: &str) -> String {
    match interpreter.eval_str(source) {
        Ok(value) => value.to_string(),
        Err(err) => format!("!! {}", err.kind().name()),
    }
}

/// Runs every example in `text` against a fresh interpreter
pub fn run_corpus(text: &str) -> CorpusReport {
    run_corpus_with(&mut Interpreter::new(), text)
}

/// Runs every example in `text` against `interpreter`
pub fn run_corpus_with(interpreter: &mut Interpreter, text: &str) -> CorpusReport {
    let mut report = CorpusReport::default();

    for example in parse_corpus(text) {
        let actual = render_outcome(interpreter, &example.source);
        if actual == example.expected {
            report.passed += 1;
        } else {
            tracing::debug!(line = example.line, %actual, expected = %example.expected, "corpus mismatch");
            report.failures.push(Failure { example, actual });
        }
    }

    report
}

/// Runs the bundled corpus
pub fn run_bundled() -> CorpusReport {
    run_corpus(BUNDLED)
}
