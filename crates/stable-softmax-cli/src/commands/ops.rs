use stable_softmax::registry::KernelRegistry;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let registry = KernelRegistry::builtin();

    println!(
        "{:<28} {:<14} {:<9} {:<12} {:<20} masks",
        "operator", "domain", "versions", "semantics", "dtypes"
    );
    for def in registry.kernels() {
        let dtypes: Vec<String> = def.dtypes.iter().map(ToString::to_string).collect();
        let masks: Vec<String> = def.mask_widths.iter().map(ToString::to_string).collect();
        println!(
            "{:<28} {:<14} {:<9} {:<12} {:<20} {}",
            def.op.name(),
            def.domain,
            def.versions.to_string(),
            format!("{:?}", def.semantics),
            dtypes.join(","),
            if masks.is_empty() { "-".to_string() } else { masks.join(",") }
        );
    }
    println!("\n{} kernel(s) registered", registry.kernels().len());
    Ok(())
}
