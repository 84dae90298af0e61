//! The crop recommendation form.
//!
//! Three choice fields whose choices are the encoder's category values. A
//! submission is normalized (trimmed, lower-cased) and then checked for
//! membership; only a fully valid form produces a [`CropQuery`].

use crop_learning::{CategoryOrdering, CropQuery, Dimension, normalize};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One selectable value and its display label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Choice {
    pub value: &'static str,
    pub label: String,
}

/// A form field restricted to a fixed list of choices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChoiceField {
    pub name: &'static str,
    pub label: &'static str,
    pub choices: Vec<Choice>,
}

impl ChoiceField {
    fn for_dimension(ordering: &CategoryOrdering, dimension: Dimension) -> Self {
        Self {
            name: dimension.column_name(),
            label: field_label(dimension),
            choices: ordering
                .values(dimension)
                .iter()
                .map(|&value| Choice {
                    value,
                    label: title_case(value),
                })
                .collect(),
        }
    }
}

fn field_label(dimension: Dimension) -> &'static str {
    match dimension {
        Dimension::SoilType => "Soil Type",
        Dimension::Season => "Season",
        Dimension::RainfallLevel => "Rainfall Level",
    }
}

/// The three choice fields, in form order.
pub fn choice_fields(ordering: &CategoryOrdering) -> Vec<ChoiceField> {
    ordering
        .dimensions()
        .map(|(dimension, _)| ChoiceField::for_dimension(ordering, dimension))
        .collect()
}

/// Upper-case every letter that follows a non-letter and lower-case the rest,
/// so "rice-paddy" becomes "Rice-Paddy" and "farmer's maize" "Farmer'S Maize".
pub fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut after_letter = false;
    for c in value.chars() {
        if after_letter {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        after_letter = c.is_alphabetic();
    }
    out
}

/// Field name to error messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// Raw submitted values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CropRecommendationForm {
    pub soil_type: String,
    pub season: String,
    pub rainfall_level: String,
}

impl CropRecommendationForm {
    pub fn new(
        soil_type: impl Into<String>,
        season: impl Into<String>,
        rainfall_level: impl Into<String>,
    ) -> Self {
        Self {
            soil_type: soil_type.into(),
            season: season.into(),
            rainfall_level: rainfall_level.into(),
        }
    }

    fn raw(&self, dimension: Dimension) -> &str {
        match dimension {
            Dimension::SoilType => &self.soil_type,
            Dimension::Season => &self.season,
            Dimension::RainfallLevel => &self.rainfall_level,
        }
    }

    /// Validate every field against `ordering`.
    ///
    /// All fields are checked, so a form with several bad values reports each.
    pub fn validate(&self, ordering: &CategoryOrdering) -> Result<CropQuery, FormErrors> {
        let mut errors = FormErrors::default();
        for dimension in Dimension::ALL {
            let raw = self.raw(dimension);
            let value = normalize(raw);
            if value.is_empty() {
                errors.add(dimension.column_name(), "This field is required.");
            } else if !ordering.contains(dimension, &value) {
                errors.add(
                    dimension.column_name(),
                    format!("Select a valid choice. {raw} is not one of the available choices."),
                );
            }
        }

        if errors.is_empty() {
            Ok(CropQuery::new(
                &self.soil_type,
                &self.season,
                &self.rainfall_level,
            ))
        } else {
            Err(errors)
        }
    }
}
