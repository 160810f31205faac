use std::{collections::BTreeMap, fmt};

use crate::scenario::IterationReport;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CheckTally {
    pub passes: usize,
    pub fails: usize,
}

/// Aggregated results of a run, in the spirit of the end-of-test check list
/// load testing tools print.
#[derive(Clone, Debug, Default)]
pub struct Summary {
    pub iterations: usize,
    pub passed: usize,
    pub failed: usize,
    pub checks: BTreeMap<&'static str, CheckTally>,
    /// Only failed iterations are kept; passing ones are just counted.
    pub failures: Vec<IterationReport>,
}

impl Summary {
    pub fn record(&mut self, report: IterationReport) {
        self.iterations += 1;
        let passed = report.is_passed();
        if passed {
            self.passed += 1;
        } else {
            self.failed += 1;
        }

        for check in report.checks.iter() {
            let tally = self.checks.entry(check.name).or_default();
            if check.is_passed() {
                tally.passes += 1;
            } else {
                tally.fails += 1;
            }
        }

        if !passed {
            self.failures.push(report);
        }
    }

    pub fn is_success(&self) -> bool {
        self.iterations > 0 && self.failed == 0
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "█ upsert")?;
        for (name, tally) in self.checks.iter() {
            let mark = if tally.fails == 0 { '✓' } else { '✗' };
            writeln!(
                f,
                "  {} {}: ✓ {} / ✗ {}",
                mark, name, tally.passes, tally.fails
            )?;
        }
        write!(
            f,
            "iterations: {} ({} passed, {} failed)",
            self.iterations, self.passed, self.failed
        )
    }
}
