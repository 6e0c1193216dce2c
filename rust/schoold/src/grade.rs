use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

/// Letter grade bands, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Grade {
    APlus,
    A,
    BPlus,
    B,
    C,
    D,
    F,
}

/// Inclusive lower bounds, evaluated top-down.
const THRESHOLDS: [(f64, Grade); 6] = [
    (90.0, Grade::APlus),
    (80.0, Grade::A),
    (70.0, Grade::BPlus),
    (60.0, Grade::B),
    (50.0, Grade::C),
    (40.0, Grade::D),
];

/// Maps a percentage to its grade band. Total over every f64: values outside
/// 0..=100 are not clamped and NaN lands in `F`.
pub fn grade_of(percentage: f64) -> Grade {
    THRESHOLDS
        .iter()
        .find(|(min, _)| percentage >= *min)
        .map(|(_, g)| *g)
        .unwrap_or(Grade::F)
}

impl Grade {
    pub fn label(self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }

    /// Display tag the front end styles the badge with.
    pub fn tier(self) -> &'static str {
        match self {
            Grade::APlus => "grade-A-plus",
            Grade::A => "grade-A",
            Grade::BPlus => "grade-B-plus",
            Grade::B => "grade-B",
            Grade::C => "grade-C",
            Grade::D => "grade-D",
            Grade::F => "grade-F",
        }
    }

    pub fn is_pass(self) -> bool {
        self != Grade::F
    }
}

impl Serialize for Grade {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Grade", 2)?;
        s.serialize_field("label", self.label())?;
        s.serialize_field("tier", self.tier())?;
        s.end()
    }
}
