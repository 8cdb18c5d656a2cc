use std::fmt;

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamType {
    Technical,
    #[serde(rename = "Non-Technical")]
    NonTechnical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub gpa: f64,
    pub attendance: f64,
    pub backlogs: u32,
    pub internships: u32,
    pub internship_duration: u32,
    pub leadership_skill: u32,
    pub communication_skill: u32,
    pub teamwork_ability: u32,
    pub problem_solving_ability: u32,
    pub job_applications_sent: u32,
    pub interviews_attended: u32,
    pub major_projects_completed: u32,
    pub mock_interviews: u32,
    pub competitions: u32,
    pub volunteer_experience: u32,
    pub career_counseling: u32,
    pub gender: Gender,
    pub stream_type: StreamType,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub label: u8,
    pub probability: f64,
}

impl Prediction {
    pub fn is_placed(&self) -> bool {
        self.label == 1
    }
}

impl Serialize for Prediction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.label, self.probability).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Prediction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (label, probability) = <(u8, f64)>::deserialize(deserializer)?;
        if label > 1 {
            return Err(de::Error::custom(format!("label must be 0 or 1, got {label}")));
        }
        if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
            return Err(de::Error::custom(format!(
                "probability must be within [0, 1], got {probability}"
            )));
        }
        Ok(Self { label, probability })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredictionResult {
    entries: Vec<(String, Prediction)>,
}

impl PredictionResult {
    pub fn insert(&mut self, model: impl Into<String>, prediction: Prediction) -> Result<(), String> {
        let model = model.into();
        if self.entries.iter().any(|(name, _)| *name == model) {
            return Err(format!("duplicate model `{model}`"));
        }
        self.entries.push((model, prediction));
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Prediction)> {
        self.entries.iter().map(|(name, prediction)| (name.as_str(), prediction))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for PredictionResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (model, prediction) in &self.entries {
            map.serialize_entry(model, prediction)?;
        }
        map.end()
    }
}

struct PredictionResultVisitor;

impl<'de> Visitor<'de> for PredictionResultVisitor {
    type Value = PredictionResult;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an object mapping model names to [label, probability]")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut result = PredictionResult::default();
        while let Some((model, prediction)) = access.next_entry::<String, Prediction>()? {
            result.insert(model, prediction).map_err(de::Error::custom)?;
        }
        Ok(result)
    }
}

impl<'de> Deserialize<'de> for PredictionResult {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(PredictionResultVisitor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Placed {
    Yes,
    No,
}

impl fmt::Display for Placed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placed::Yes => f.pad("Yes"),
            Placed::No => f.pad("No"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayRow {
    pub model: String,
    pub placed: Placed,
    pub probability_percent: u8,
}
