use pasture_macros::DailyOutputs;

#[derive(Debug, Clone, Copy, DailyOutputs)]
#[outputs(series_name = "SoilExchange")]
pub struct SoilExchangeDay {
    pub water_uptake: f64,
    pub nitrate_uptake: f64,
}

fn main() {
    let mut series = SoilExchange::with_capacity(2);
    series.push(&SoilExchangeDay {
        water_uptake: 2.5,
        nitrate_uptake: 0.4,
    });
    assert_eq!(series.len(), 1);
    assert_eq!(series.water_uptake, vec![2.5]);
    assert_eq!(SoilExchangeDay::field_names(), &["water_uptake", "nitrate_uptake"]);
}
