use pasture_macros::DailyOutputs;

#[derive(DailyOutputs)]
pub struct BadOutputs {
    pub litter_dm: f64,
    pub day: u32,
}

fn main() {}
