use tabled::Tabled;

#[derive(Tabled)]
pub struct RecordRow {
    pub scenario: String,
    pub outcome: String,
    #[tabled(display = "float2")]
    pub duration_s: f64,
}

fn float2(n: &f64) -> String {
    format!("{:.2}", n)
}
