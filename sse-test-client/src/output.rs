use colored::*;

#[derive(Debug, Clone)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub details: String,
}

impl TestResult {
    pub fn pass(name: &str, details: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            details: details.into(),
        }
    }

    pub fn fail(name: &str, details: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            details: details.into(),
        }
    }
}

pub fn print_test_summary(results: &[TestResult]) {
    for result in results {
        let marker = if result.passed {
            "✓ PASS".green().bold()
        } else {
            "✗ FAIL".red().bold()
        };
        println!("{} {} — {}", marker, result.name.bright_white(), result.details);
    }

    let passed = results.iter().filter(|r| r.passed).count();
    println!(
        "\n{} {}/{} scenarios passed",
        "Summary:".bright_white().bold(),
        passed,
        results.len()
    );
}
