use numpy::{PyArray1, PyReadonlyArray1};
use pyo3::prelude::*;
use pyo3::types::PyDict;

use pasture_core::soil::ZoneUptake;
use pasture_core::species::fluxes::{DailyOutputs, DailyOutputsSeries};
use pasture_core::species::params::Parameters;
use pasture_core::PastureError;

/// Map a core error onto a Python `ValueError`.
pub fn to_py_err(err: PastureError) -> PyErr {
    pyo3::exceptions::PyValueError::new_err(err.to_string())
}

/// Validate that a numpy array is C-contiguous and return its slice.
pub fn contiguous_slice<'py>(arr: &'py PyReadonlyArray1<'py, f64>) -> PyResult<&'py [f64]> {
    arr.as_slice().map_err(|_| {
        pyo3::exceptions::PyValueError::new_err("array must be C-contiguous")
    })
}

/// Validate length + contiguity of a numpy array.
pub fn checked_slice<'py>(
    arr: &'py PyReadonlyArray1<'py, f64>,
    expected_len: usize,
    name: &str,
) -> PyResult<&'py [f64]> {
    let slice = contiguous_slice(arr)?;
    if slice.len() != expected_len {
        return Err(pyo3::exceptions::PyValueError::new_err(format!(
            "{} must have {} elements, got {}",
            name, expected_len, slice.len()
        )));
    }
    Ok(slice)
}

/// Parameters from a JSON document, or the defaults.
pub fn parse_params(json: Option<&str>) -> PyResult<Parameters> {
    match json {
        Some(text) => Parameters::from_json(text).map_err(to_py_err),
        None => Ok(Parameters::default()),
    }
}

/// One numpy array per output column.
pub fn series_to_dict<'py>(py: Python<'py>, series: &DailyOutputsSeries) -> PyResult<Bound<'py, PyDict>> {
    let dict = PyDict::new(py);
    for (name, column) in series.columns() {
        dict.set_item(name, PyArray1::from_slice(py, column))?;
    }
    Ok(dict)
}

/// One float per output of a single day.
pub fn outputs_to_dict<'py>(py: Python<'py>, outputs: &DailyOutputs) -> PyResult<Bound<'py, PyDict>> {
    let mut series = DailyOutputsSeries::with_capacity(1);
    series.push(outputs);
    let dict = PyDict::new(py);
    for (name, column) in series.columns() {
        dict.set_item(name, column[0])?;
    }
    Ok(dict)
}

/// Per-layer uptake of the first zone as numpy arrays.
pub fn uptake_to_dict<'py>(py: Python<'py>, uptake: &[ZoneUptake]) -> PyResult<Bound<'py, PyDict>> {
    let dict = PyDict::new(py);
    if let Some(zone) = uptake.first() {
        dict.set_item("water", PyArray1::from_slice(py, &zone.water))?;
        dict.set_item("no3", PyArray1::from_slice(py, &zone.no3))?;
        dict.set_item("nh4", PyArray1::from_slice(py, &zone.nh4))?;
    }
    Ok(dict)
}
