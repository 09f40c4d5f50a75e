use numpy::{PyArray1, PyReadonlyArray1};
use pyo3::prelude::*;
use pyo3::types::PyDict;

use crate::convert::{
    checked_slice, contiguous_slice, outputs_to_dict, parse_params, series_to_dict, to_py_err, uptake_to_dict,
};
use pasture_core::forcing::{Weather, WeatherSeries};
use pasture_core::soil::{SoilLayer, SoilZone};
use pasture_core::species::constants::STATE_SIZE;
use pasture_core::species::params::Parameters;
use pasture_core::species::run;
use pasture_core::species::state::State;
use pasture_core::traits::ModelState;

/// Soil layers of a single zone, one array per property.
#[derive(FromPyObject)]
struct SoilArrays<'py> {
    #[pyo3(item)]
    thickness: PyReadonlyArray1<'py, f64>,
    #[pyo3(item)]
    sw: PyReadonlyArray1<'py, f64>,
    #[pyo3(item)]
    ll: PyReadonlyArray1<'py, f64>,
    #[pyo3(item)]
    dul: PyReadonlyArray1<'py, f64>,
    #[pyo3(item)]
    sat: PyReadonlyArray1<'py, f64>,
    #[pyo3(item)]
    kl: PyReadonlyArray1<'py, f64>,
    #[pyo3(item)]
    ksat: PyReadonlyArray1<'py, f64>,
    #[pyo3(item)]
    no3: PyReadonlyArray1<'py, f64>,
    #[pyo3(item)]
    nh4: PyReadonlyArray1<'py, f64>,
}

impl SoilArrays<'_> {
    fn to_zone(&self) -> PyResult<SoilZone> {
        let thickness = contiguous_slice(&self.thickness)?;
        let n = thickness.len();
        let sw = checked_slice(&self.sw, n, "soil['sw']")?;
        let ll = checked_slice(&self.ll, n, "soil['ll']")?;
        let dul = checked_slice(&self.dul, n, "soil['dul']")?;
        let sat = checked_slice(&self.sat, n, "soil['sat']")?;
        let kl = checked_slice(&self.kl, n, "soil['kl']")?;
        let ksat = checked_slice(&self.ksat, n, "soil['ksat']")?;
        let no3 = checked_slice(&self.no3, n, "soil['no3']")?;
        let nh4 = checked_slice(&self.nh4, n, "soil['nh4']")?;
        let layers = (0..n)
            .map(|i| SoilLayer {
                thickness: thickness[i],
                sw: sw[i],
                ll: ll[i],
                dul: dul[i],
                sat: sat[i],
                kl: kl[i],
                ksat: ksat[i],
                no3: no3[i],
                nh4: nh4[i],
            })
            .collect();
        let zone = SoilZone::new("field", layers);
        zone.validate().map_err(to_py_err)?;
        Ok(zone)
    }
}

fn soil_to_dict<'py>(py: Python<'py>, zone: &SoilZone) -> PyResult<Bound<'py, PyDict>> {
    let dict = PyDict::new(py);
    let column = |f: fn(&SoilLayer) -> f64| -> Vec<f64> { zone.layers.iter().map(f).collect() };
    dict.set_item("sw", PyArray1::from_vec(py, column(|l| l.sw)))?;
    dict.set_item("no3", PyArray1::from_vec(py, column(|l| l.no3)))?;
    dict.set_item("nh4", PyArray1::from_vec(py, column(|l| l.nh4)))?;
    Ok(dict)
}

fn load_state(arr: &PyReadonlyArray1<'_, f64>, params: &Parameters) -> PyResult<State> {
    let slice = checked_slice(arr, STATE_SIZE, "state")?;
    State::from_array(slice, params).map_err(to_py_err)
}

/// Initial state of a species as a flat array.
#[pyfunction]
#[pyo3(name = "initial_state", signature = (params=None))]
fn pasture_initial_state<'py>(py: Python<'py>, params: Option<&str>) -> PyResult<Bound<'py, PyArray1<f64>>> {
    let p = parse_params(params)?;
    Ok(PyArray1::from_vec(py, State::initialize(&p).to_vec()))
}

/// Run the pasture over a weather series on one soil zone.
///
/// `soil` is a dict of per-layer arrays (thickness, sw, ll, dul, sat, kl,
/// ksat, no3, nh4). Returns (outputs, final_state, final_soil).
#[pyfunction]
#[allow(clippy::too_many_arguments)]
#[pyo3(name = "run", signature = (
    max_t,
    min_t,
    radiation,
    co2,
    day_length,
    water_demand,
    soil,
    start_day_of_year=1,
    params=None,
    initial_state=None,
))]
fn pasture_run<'py>(
    py: Python<'py>,
    max_t: PyReadonlyArray1<'py, f64>,
    min_t: PyReadonlyArray1<'py, f64>,
    radiation: PyReadonlyArray1<'py, f64>,
    co2: PyReadonlyArray1<'py, f64>,
    day_length: PyReadonlyArray1<'py, f64>,
    water_demand: PyReadonlyArray1<'py, f64>,
    soil: SoilArrays<'py>,
    start_day_of_year: u32,
    params: Option<&str>,
    initial_state: Option<PyReadonlyArray1<'py, f64>>,
) -> PyResult<(Bound<'py, PyDict>, Bound<'py, PyArray1<f64>>, Bound<'py, PyDict>)> {
    let p = parse_params(params)?;
    let n = contiguous_slice(&max_t)?.len();
    let weather = WeatherSeries::new(
        start_day_of_year,
        contiguous_slice(&max_t)?.to_vec(),
        checked_slice(&min_t, n, "min_t")?.to_vec(),
        checked_slice(&radiation, n, "radiation")?.to_vec(),
        checked_slice(&co2, n, "co2")?.to_vec(),
        checked_slice(&day_length, n, "day_length")?.to_vec(),
        checked_slice(&water_demand, n, "water_demand")?.to_vec(),
    )
    .map_err(to_py_err)?;
    let zones = vec![soil.to_zone()?];
    let state = match &initial_state {
        Some(arr) => Some(load_state(arr, &p)?),
        None => None,
    };

    let (outputs, final_state, final_zones) = run::run(&p, &weather, &zones, state.as_ref()).map_err(to_py_err)?;

    let outputs = series_to_dict(py, &outputs)?;
    let state_out = PyArray1::from_vec(py, final_state.to_vec());
    let soil_out = match final_zones.first() {
        Some(zone) => soil_to_dict(py, zone)?,
        None => PyDict::new(py),
    };
    Ok((outputs, state_out, soil_out))
}

/// Advance the pasture one day.
///
/// Returns (new_state, outputs, uptake) where uptake holds the per-layer
/// water, NO3 and NH4 taken from the soil.
#[pyfunction]
#[allow(clippy::too_many_arguments)]
#[pyo3(name = "step", signature = (
    state,
    day_of_year,
    max_t,
    min_t,
    radiation,
    co2,
    day_length,
    water_demand,
    soil,
    params=None,
))]
fn pasture_step<'py>(
    py: Python<'py>,
    state: PyReadonlyArray1<'py, f64>,
    day_of_year: u32,
    max_t: f64,
    min_t: f64,
    radiation: f64,
    co2: f64,
    day_length: f64,
    water_demand: f64,
    soil: SoilArrays<'py>,
    params: Option<&str>,
) -> PyResult<(Bound<'py, PyArray1<f64>>, Bound<'py, PyDict>, Bound<'py, PyDict>)> {
    let p = parse_params(params)?;
    let s = load_state(&state, &p)?;
    let zones = vec![soil.to_zone()?];
    let weather = Weather {
        day_of_year,
        max_t,
        min_t,
        radiation,
        co2,
        day_length,
        water_demand,
        intercepted_radiation: None,
    };

    let (new_state, report) = run::step(&s, &p, &weather, &zones, None).map_err(to_py_err)?;

    let state_out = PyArray1::from_vec(py, new_state.to_vec());
    let outputs = outputs_to_dict(py, &report.outputs)?;
    let uptake = uptake_to_dict(py, &report.uptake)?;
    Ok((state_out, outputs, uptake))
}

pub fn register(parent: &Bound<'_, PyModule>) -> PyResult<()> {
    let py = parent.py();
    let m = PyModule::new(py, "pasture")?;
    m.add_function(wrap_pyfunction!(pasture_run, &m)?)?;
    m.add_function(wrap_pyfunction!(pasture_step, &m)?)?;
    m.add_function(wrap_pyfunction!(pasture_initial_state, &m)?)?;
    m.add("STATE_SIZE", STATE_SIZE)?;
    parent.add_submodule(&m)?;
    Ok(())
}
