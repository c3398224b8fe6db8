//! Correctness verdicts for agent output

/// Verdict produced for one execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub correct: bool,
    pub reason: String,
}

impl Evaluation {
    fn incorrect(reason: impl Into<String>) -> Self {
        Self {
            correct: false,
            reason: reason.into(),
        }
    }
}

/// Turns raw agent output into a verdict; must be a pure function of its inputs
pub trait Evaluator {
    fn evaluate(&self, output: &str, expected: &str, execution_succeeded: bool) -> Evaluation;
}

/// Correct when the expected answer appears anywhere in the output, ignoring case
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringEvaluator;

impl Evaluator for SubstringEvaluator {
    fn evaluate(&self, output: &str, expected: &str, execution_succeeded: bool) -> Evaluation {
        if !execution_succeeded {
            return Evaluation::incorrect("Agent execution failed");
        }

        if output.trim().is_empty() {
            return Evaluation::incorrect("Agent produced no output");
        }

        if output.to_lowercase().contains(&expected.to_lowercase()) {
            return Evaluation {
                correct: true,
                reason: "Expected answer found in output".to_string(),
            };
        }

        Evaluation::incorrect(format!(
            "Output does not match expected answer (expected: {})",
            expected
        ))
    }
}
