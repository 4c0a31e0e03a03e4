use std::path::Path;

use half::{bf16, f16};
use serde::Serialize;
use stable_softmax::config::{OperatorConfig, load_tensor, parse_config, validate_config};
use stable_softmax::dtype::{DataType, Element};
use stable_softmax::error::Severity;
use stable_softmax::kernels::{MaskElement, MaskWidth, StrategyOverride};
use stable_softmax::tensor::{HeapAllocator, Tensor, TensorFile};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "unknown format '{other}', expected 'text' or 'json'"
            )),
        }
    }
}

/// Values of one output tensor.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Values {
    Float(Vec<f64>),
    Flag(Vec<u64>),
}

#[derive(Debug, Serialize)]
struct NamedOutput {
    name: &'static str,
    values: Values,
}

#[derive(Debug, Serialize)]
struct RunReport {
    operator: String,
    dtype: DataType,
    shape: Vec<usize>,
    outputs: Vec<NamedOutput>,
}

pub fn run(
    config_path: &Path,
    input_path: &Path,
    mask_path: Option<&Path>,
    format: OutputFormat,
    strategy: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = parse_config(config_path)?;
    let errors = validate_config(&config)
        .into_iter()
        .filter(|v| v.severity == Severity::Error)
        .count();
    if errors > 0 {
        return Err(format!(
            "Configuration has {errors} validation error(s); run `ssx validate` for details"
        )
        .into());
    }
    if let Some(s) = strategy {
        config.strategy = s.parse::<StrategyOverride>()?;
    }
    if mask_path.is_some() && !config.is_fused() {
        return Err(format!("--mask only applies to the fused operator, not {}", config.operator).into());
    }

    let input = load_tensor(input_path)?;
    let additive_mask = match mask_path {
        Some(p) => Some(to_f32(load_tensor(p)?.data)),
        None => None,
    };
    info!(
        operator = %config.operator,
        dtype = %config.dtype,
        shape = ?input.shape,
        "running operator"
    );

    let report = match config.dtype {
        DataType::F32 => execute::<f32>(&config, input, additive_mask.as_deref())?,
        DataType::F64 => execute::<f64>(&config, input, additive_mask.as_deref())?,
        DataType::F16 => execute::<f16>(&config, input, additive_mask.as_deref())?,
        DataType::Bf16 => execute::<bf16>(&config, input, additive_mask.as_deref())?,
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_text(&report),
    }
    Ok(())
}

#[allow(clippy::cast_possible_truncation)]
fn to_f32(data: Vec<f64>) -> Vec<f32> {
    data.into_iter().map(|v| v as f32).collect()
}

fn floats<T: Element>(tensor: &Tensor<T>) -> Values {
    Values::Float(tensor.as_slice().iter().map(|v| v.to_f64()).collect())
}

fn flags<M: MaskElement>(tensor: &Tensor<M>) -> Values {
    Values::Flag(tensor.as_slice().iter().map(|m| u64::from(m.is_kept())).collect())
}

fn execute<T: Element>(
    config: &OperatorConfig,
    file: TensorFile,
    additive_mask: Option<&[f32]>,
) -> Result<RunReport, Box<dyn std::error::Error>> {
    let input: Tensor<T> = file.into_tensor()?;
    let shape = input.shape().to_vec();
    let outputs = if config.is_fused() {
        match config.mask_width() {
            MaskWidth::U8 => execute_fused::<T, u8>(config, &input, additive_mask)?,
            MaskWidth::U16 => execute_fused::<T, u16>(config, &input, additive_mask)?,
            MaskWidth::U32 => execute_fused::<T, u32>(config, &input, additive_mask)?,
            MaskWidth::U64 => execute_fused::<T, u64>(config, &input, additive_mask)?,
        }
    } else {
        let out = config.build_softmax()?.compute(&input, &HeapAllocator)?;
        vec![NamedOutput {
            name: "output",
            values: floats(&out),
        }]
    };
    Ok(RunReport {
        operator: config.operator.to_string(),
        dtype: config.dtype,
        shape,
        outputs,
    })
}

fn execute_fused<T: Element, M: MaskElement>(
    config: &OperatorConfig,
    input: &Tensor<T>,
    additive_mask: Option<&[f32]>,
) -> Result<Vec<NamedOutput>, Box<dyn std::error::Error>> {
    let op = config.build_fused()?;
    let out = op.compute::<T, M, _>(input, additive_mask, &HeapAllocator)?;
    Ok(vec![
        NamedOutput {
            name: "softmax",
            values: floats(&out.softmax),
        },
        NamedOutput {
            name: "dropped",
            values: floats(&out.dropped),
        },
        NamedOutput {
            name: "mask",
            values: flags(&out.mask),
        },
    ])
}

fn print_text(report: &RunReport) {
    println!(
        "{} ({}) shape {:?}",
        report.operator, report.dtype, report.shape
    );
    let width = report.shape.last().copied().unwrap_or(1).max(1);
    for output in &report.outputs {
        println!("\n{}:", output.name);
        match &output.values {
            Values::Float(v) => {
                for row in v.chunks(width) {
                    let cells: Vec<String> = row.iter().map(|x| format!("{x:>10.6}")).collect();
                    println!("  {}", cells.join(" "));
                }
            }
            Values::Flag(v) => {
                for row in v.chunks(width) {
                    let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
                    println!("  {}", cells.join(" "));
                }
            }
        }
    }
}
