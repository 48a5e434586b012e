use diffusion_sim_core::config::SimConfig;
use diffusion_sim_core::scenario::{self, DemoOptions};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

/// Minimal PyO3 module exposing diffusion-sim-core to Python.
#[pyfunction]
fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Run the three-substance demo and return its report as a JSON string.
#[pyfunction]
#[pyo3(signature = (steps = 2000, seed = 42, cells_per_type = 100, config_json = None))]
fn run_demo(
    steps: u64,
    seed: u64,
    cells_per_type: usize,
    config_json: Option<&str>,
) -> PyResult<String> {
    let mut config = match config_json {
        Some(json) => SimConfig::from_json_str(json)
            .map_err(|e| PyValueError::new_err(format!("invalid config JSON: {e}")))?,
        None => SimConfig::default(),
    };
    config.seed = seed;
    let options = DemoOptions {
        cells_per_type,
        ..DemoOptions::default()
    };
    let report = scenario::run_reference_demo(config, &options, steps)
        .map_err(|e| PyRuntimeError::new_err(e.to_string()))?;
    serde_json::to_string(&report).map_err(|e| PyRuntimeError::new_err(e.to_string()))
}

#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(version, m)?)?;
    m.add_function(wrap_pyfunction!(run_demo, m)?)?;
    Ok(())
}
