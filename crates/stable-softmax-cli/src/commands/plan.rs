use std::path::Path;

use stable_softmax::config::parse_config;
use stable_softmax::registry::KernelRegistry;

pub fn run(path: &Path, shape: &[usize]) -> Result<(), Box<dyn std::error::Error>> {
    let config = parse_config(path)?;
    let registry = KernelRegistry::builtin();
    let def = registry.resolve(config.operator, config.effective_opset(), config.dtype)?;

    println!(
        "Operator: {} ({}, versions {})",
        def.op, def.domain, def.versions
    );
    println!("Shape: {shape:?}");

    let plan = if config.is_fused() {
        config.build_fused()?.plan(shape, config.dtype)?
    } else {
        config.build_softmax()?.plan(shape, config.dtype)?
    };

    match plan {
        Some(plan) => println!("{plan}"),
        None => println!("Empty input: nothing to compute."),
    }
    Ok(())
}
