/// Which analyzer produced a stored report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReportKind {
    Dataset,
    Fairness,
    Intersectional,
    Mitigation,
    Privacy,
    Model,
    Explanation,
    Budget,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Dataset => "dataset",
            ReportKind::Fairness => "fairness",
            ReportKind::Intersectional => "intersectional",
            ReportKind::Mitigation => "mitigation",
            ReportKind::Privacy => "privacy",
            ReportKind::Model => "model",
            ReportKind::Explanation => "explanation",
            ReportKind::Budget => "budget",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "dataset" => Some(ReportKind::Dataset),
            "fairness" => Some(ReportKind::Fairness),
            "intersectional" => Some(ReportKind::Intersectional),
            "mitigation" => Some(ReportKind::Mitigation),
            "privacy" => Some(ReportKind::Privacy),
            "model" => Some(ReportKind::Model),
            "explanation" => Some(ReportKind::Explanation),
            "budget" => Some(ReportKind::Budget),
            _ => None,
        }
    }
}
