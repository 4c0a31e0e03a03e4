use crate::config::types::OperatorConfig;
use crate::error::{Severity, Violation};
use crate::registry::{KernelRegistry, OpKind};

/// Validate a parsed configuration against the built-in registry.
///
/// Returns a list of violations. If any violation has
/// [`Severity::Error`], the configuration must not be run.
pub fn validate_config(config: &OperatorConfig) -> Vec<Violation> {
    let mut violations = Vec::new();

    validate_opset(config, &mut violations);
    validate_dropout(config, &mut violations);
    validate_log_flag(config, &mut violations);

    violations
}

fn validate_opset(config: &OperatorConfig, violations: &mut Vec<Violation>) {
    let opset = config.effective_opset();
    if opset == 0 {
        violations.push(Violation {
            severity: Severity::Error,
            rule: "CONFIG-001".to_string(),
            message: "opset must be at least 1".to_string(),
            location: Some("opset".to_string()),
        });
        return;
    }

    if let Err(e) = KernelRegistry::builtin().resolve(config.operator, opset, config.dtype) {
        violations.push(Violation {
            severity: Severity::Error,
            rule: "CONFIG-005".to_string(),
            message: e.to_string(),
            location: Some("opset".to_string()),
        });
    }
}

fn validate_dropout(config: &OperatorConfig, violations: &mut Vec<Violation>) {
    let Some(dropout) = &config.dropout else {
        if config.is_fused() {
            violations.push(Violation {
                severity: Severity::Warning,
                rule: "CONFIG-007".to_string(),
                message: "no dropout block; the fused operator will run with ratio 0".to_string(),
                location: Some("dropout".to_string()),
            });
        }
        return;
    };

    if !config.is_fused() {
        violations.push(Violation {
            severity: Severity::Warning,
            rule: "CONFIG-004".to_string(),
            message: format!("dropout block is ignored by {}", config.operator),
            location: Some("dropout".to_string()),
        });
        return;
    }

    if !(0.0..1.0).contains(&dropout.ratio) {
        violations.push(Violation {
            severity: Severity::Error,
            rule: "CONFIG-002".to_string(),
            message: format!("dropout.ratio must be in [0, 1), got {}", dropout.ratio),
            location: Some("dropout.ratio".to_string()),
        });
    }

    if dropout.seed.is_none() {
        violations.push(Violation {
            severity: Severity::Info,
            rule: "CONFIG-006".to_string(),
            message: "no dropout.seed; draws come from the process-wide generator".to_string(),
            location: Some("dropout.seed".to_string()),
        });
    }
}

fn validate_log_flag(config: &OperatorConfig, violations: &mut Vec<Violation>) {
    if !config.log_softmax {
        return;
    }
    match config.operator {
        OpKind::Softmax => violations.push(Violation {
            severity: Severity::Error,
            rule: "CONFIG-003".to_string(),
            message: "log_softmax: true conflicts with operator softmax; use operator log_softmax"
                .to_string(),
            location: Some("log_softmax".to_string()),
        }),
        OpKind::LogSoftmax => violations.push(Violation {
            severity: Severity::Info,
            rule: "CONFIG-008".to_string(),
            message: "log_softmax flag is implied by operator log_softmax".to_string(),
            location: Some("log_softmax".to_string()),
        }),
        OpKind::AdditiveMaskSoftmaxDropout => {}
    }
}
