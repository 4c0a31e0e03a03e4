use std::path::Path;

use stable_softmax::config::{parse_config, validate_config};
use stable_softmax::error::Severity;
use tracing::warn;

pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = parse_config(path)?;
    let violations = validate_config(&config);

    let errors: Vec<_> = violations
        .iter()
        .filter(|v| v.severity == Severity::Error)
        .collect();
    let warnings: Vec<_> = violations
        .iter()
        .filter(|v| v.severity == Severity::Warning)
        .collect();

    for v in &violations {
        if v.severity == Severity::Warning {
            warn!(rule = %v.rule, location = ?v.location, "{}", v.message);
        }
        println!("{v}");
    }

    println!(
        "\n{} error(s), {} warning(s)",
        errors.len(),
        warnings.len()
    );

    if errors.is_empty() {
        println!(
            "{} (opset {}, {}) is valid.",
            config.operator,
            config.effective_opset(),
            config.dtype
        );
        Ok(())
    } else {
        Err(format!(
            "Configuration has {} validation error(s)",
            errors.len()
        )
        .into())
    }
}
