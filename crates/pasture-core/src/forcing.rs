//! Daily weather snapshots and validated weather series.
use crate::error::{PastureError, Result};

/// One day of weather plus the water demand handed over by the canopy
/// energy balance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weather {
    /// Day of year, 1-366.
    pub day_of_year: u32,
    /// Maximum air temperature [oC].
    pub max_t: f64,
    /// Minimum air temperature [oC].
    pub min_t: f64,
    /// Incoming solar radiation [MJ/m2/d].
    pub radiation: f64,
    /// Atmospheric CO2 concentration [ppm].
    pub co2: f64,
    /// Day length [h].
    pub day_length: f64,
    /// Potential plant water demand [mm].
    pub water_demand: f64,
    /// Radiation intercepted by this plant [MJ/m2/d]. Derived from green cover
    /// when absent.
    pub intercepted_radiation: Option<f64>,
}

impl Weather {
    pub fn mean_t(&self) -> f64 {
        0.5 * (self.max_t + self.min_t)
    }

    /// Daytime-weighted temperature, closer to the maximum.
    pub fn daytime_t(&self) -> f64 {
        0.75 * self.max_t + 0.25 * self.min_t
    }

    /// Reject missing or non-finite inputs.
    pub fn validate(&self) -> Result<()> {
        let day = self.day_of_year;
        let checks: [(&'static str, f64); 6] = [
            ("max_t", self.max_t),
            ("min_t", self.min_t),
            ("radiation", self.radiation),
            ("co2", self.co2),
            ("day_length", self.day_length),
            ("water_demand", self.water_demand),
        ];
        for (what, value) in checks {
            if !value.is_finite() {
                return Err(PastureError::MissingInput { what, day });
            }
        }
        if let Some(radn) = self.intercepted_radiation {
            if !radn.is_finite() {
                return Err(PastureError::MissingInput {
                    what: "intercepted_radiation",
                    day,
                });
            }
        }
        if !(1..=366).contains(&day) {
            return Err(PastureError::InvalidConfig(format!(
                "day_of_year {day} outside 1-366"
            )));
        }
        if self.min_t > self.max_t {
            return Err(PastureError::InvalidConfig(format!(
                "min_t {} above max_t {} on day {day}",
                self.min_t, self.max_t
            )));
        }
        Ok(())
    }
}

/// Column-oriented weather over consecutive days.
///
/// All columns must have the same length. Missing values (NaN) are rejected.
#[derive(Debug, Clone)]
pub struct WeatherSeries {
    pub start_day_of_year: u32,
    pub max_t: Vec<f64>,
    pub min_t: Vec<f64>,
    pub radiation: Vec<f64>,
    pub co2: Vec<f64>,
    pub day_length: Vec<f64>,
    pub water_demand: Vec<f64>,
}

impl WeatherSeries {
    pub fn new(
        start_day_of_year: u32,
        max_t: Vec<f64>,
        min_t: Vec<f64>,
        radiation: Vec<f64>,
        co2: Vec<f64>,
        day_length: Vec<f64>,
        water_demand: Vec<f64>,
    ) -> Result<Self> {
        if max_t.is_empty() {
            return Err(PastureError::InvalidConfig("weather series is empty".to_string()));
        }
        if !(1..=366).contains(&start_day_of_year) {
            return Err(PastureError::InvalidConfig(format!(
                "start_day_of_year {start_day_of_year} outside 1-366"
            )));
        }
        let n = max_t.len();
        let columns: [(&'static str, &Vec<f64>); 6] = [
            ("max_t", &max_t),
            ("min_t", &min_t),
            ("radiation", &radiation),
            ("co2", &co2),
            ("day_length", &day_length),
            ("water_demand", &water_demand),
        ];
        for (name, column) in columns {
            if column.len() != n {
                return Err(PastureError::LengthMismatch {
                    what: format!("weather column {name}"),
                    expected: n,
                    actual: column.len(),
                });
            }
            if let Some(i) = column.iter().position(|v| !v.is_finite()) {
                return Err(PastureError::MissingInput {
                    what: name,
                    day: day_of_year_at(start_day_of_year, i),
                });
            }
        }
        Ok(Self {
            start_day_of_year,
            max_t,
            min_t,
            radiation,
            co2,
            day_length,
            water_demand,
        })
    }

    pub fn len(&self) -> usize {
        self.max_t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.max_t.is_empty()
    }

    /// Weather for the `i`-th day of the series.
    pub fn day(&self, i: usize) -> Weather {
        Weather {
            day_of_year: day_of_year_at(self.start_day_of_year, i),
            max_t: self.max_t[i],
            min_t: self.min_t[i],
            radiation: self.radiation[i],
            co2: self.co2[i],
            day_length: self.day_length[i],
            water_demand: self.water_demand[i],
            intercepted_radiation: None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Weather> + '_ {
        (0..self.len()).map(move |i| self.day(i))
    }
}

/// Day of year `offset` days after `start`, on a 365-day calendar.
pub fn day_of_year_at(start: u32, offset: usize) -> u32 {
    ((start as usize - 1 + offset) % 365) as u32 + 1
}
