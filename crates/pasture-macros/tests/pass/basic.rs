use pasture_macros::DailyOutputs;

#[derive(Debug, Clone, Copy, DailyOutputs)]
pub struct GrowthOutputs {
    pub gross_photosynthesis: f64,
    pub actual_growth: f64,
    pub litter_dm: f64,
}

fn main() {
    let day = GrowthOutputs {
        gross_photosynthesis: 42.0,
        actual_growth: 61.5,
        litter_dm: 3.25,
    };
    let mut series = GrowthOutputsSeries::with_capacity(365);
    assert!(series.is_empty());
    series.push(&day);
    series.push(&day);
    assert_eq!(series.len(), 2);
    assert_eq!(series.column("litter_dm"), Some(&[3.25, 3.25][..]));
    assert_eq!(series.column("root_residue_dm"), None);
    let names: Vec<&str> = series.columns().iter().map(|(n, _)| *n).collect();
    assert_eq!(names, GrowthOutputs::field_names());
    assert_eq!(
        GrowthOutputs::field_names(),
        &["gross_photosynthesis", "actual_growth", "litter_dm"]
    );
}
