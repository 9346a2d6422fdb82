use serde::{Deserialize, Deserializer, Serialize};

use super::require;
use crate::error::ApiError;

/// How a diary record category is visualised.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RecordType {
    #[serde(rename = "GRAPH")]
    Graph,
    #[serde(rename = "PHOTO")]
    Photo,
}

/// A diary record category owned by exactly one pet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Record {
    #[serde(rename = "recordId")]
    pub record_id: i64,
    pub title: String,
    #[serde(rename = "recordType")]
    pub record_type: RecordType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(rename = "categoryColor", skip_serializing_if = "Option::is_none")]
    pub category_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoticon: Option<String>,
}

/// A record category that has not been created on the server yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordDraft {
    pub title: String,
    #[serde(rename = "recordType")]
    pub record_type: RecordType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(rename = "categoryColor", skip_serializing_if = "Option::is_none")]
    pub category_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoticon: Option<String>,
}

impl RecordDraft {
    pub fn graph(title: &str, unit: &str) -> Self {
        Self {
            title: title.to_string(),
            record_type: RecordType::Graph,
            unit: Some(unit.to_string()),
            value: None,
            category_color: None,
            emoticon: None,
        }
    }

    pub fn photo(title: &str) -> Self {
        Self {
            title: title.to_string(),
            record_type: RecordType::Photo,
            unit: None,
            value: None,
            category_color: None,
            emoticon: None,
        }
    }

    /// A unit only makes sense on a graph record.
    pub fn validate(&self) -> Result<(), ApiError> {
        require("record title", &self.title)?;
        if self.record_type == RecordType::Photo && self.unit.is_some() {
            return Err(ApiError::validation("unit is only valid for GRAPH records"));
        }
        Ok(())
    }
}

/// A pet profile that has not been persisted yet. It has no id, so nothing
/// can refer to it until the server assigns one.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PetDraft {
    pub pet_name: String,
    pub species: String,
    #[serde(rename = "pet_registration_number", default)]
    pub registration_number: String,
    #[serde(default)]
    pub date_of_birth: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub breed: String,
    #[serde(default)]
    pub neutering: String,
    #[serde(rename = "imageUrl", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl PetDraft {
    pub fn validate(&self) -> Result<(), ApiError> {
        require("pet name", &self.pet_name)?;
        require("species", &self.species)
    }

    /// Promote the draft to a persisted pet once the server assigned `pet_id`.
    pub fn into_pet(self, pet_id: i64) -> Pet {
        Pet {
            pet_id,
            pet_name: self.pet_name,
            species: self.species,
            registration_number: self.registration_number,
            date_of_birth: self.date_of_birth,
            gender: self.gender,
            breed: self.breed,
            neutering: self.neutering,
            image_url: self.image_url,
            records: Vec::new(),
        }
    }
}

/// A persisted pet with its diary record categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pet {
    #[serde(rename = "petId")]
    pub pet_id: i64,
    pub pet_name: String,
    #[serde(default)]
    pub species: String,
    #[serde(rename = "pet_registration_number", default)]
    pub registration_number: String,
    #[serde(default)]
    pub date_of_birth: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub breed: String,
    #[serde(default)]
    pub neutering: String,
    #[serde(rename = "imageUrl", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub records: Vec<Record>,
}

/// Response of `POST /users/pets`; only the assigned id is relied upon.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PetCreated {
    #[serde(rename = "petId")]
    pub pet_id: i64,
}

/// Partial pet edit sent with `PATCH /users/pets/:id`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PetUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pet_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub species: Option<String>,
    #[serde(rename = "pet_registration_number", skip_serializing_if = "Option::is_none")]
    pub registration_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neutering: Option<String>,
    #[serde(rename = "imageUrl", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl PetUpdate {
    pub fn validate(&self) -> Result<(), ApiError> {
        if let Some(name) = &self.pet_name {
            require("pet name", name)?;
        }
        if let Some(species) = &self.species {
            require("species", species)?;
        }
        Ok(())
    }

    /// Merge the patch into `pet`. Records are never touched.
    pub fn apply_to(&self, pet: &mut Pet) {
        let fields = [
            (&self.pet_name, &mut pet.pet_name),
            (&self.species, &mut pet.species),
            (&self.registration_number, &mut pet.registration_number),
            (&self.date_of_birth, &mut pet.date_of_birth),
            (&self.gender, &mut pet.gender),
            (&self.breed, &mut pet.breed),
            (&self.neutering, &mut pet.neutering),
        ];
        for (patch, target) in fields {
            if let Some(value) = patch {
                *target = value.clone();
            }
        }
        if let Some(url) = &self.image_url {
            pet.image_url = Some(url.clone());
        }
    }
}

/// One measurement of a graph record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphPoint {
    #[serde(rename = "graphDataId", skip_serializing_if = "Option::is_none")]
    pub graph_data_id: Option<i64>,
    #[serde(rename = "recordId", skip_serializing_if = "Option::is_none")]
    pub record_id: Option<i64>,
    #[serde(deserialize_with = "number_or_string")]
    pub graph_data: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// One photo entry of a photo record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhotoEntry {
    #[serde(rename = "photoDataId", skip_serializing_if = "Option::is_none")]
    pub photo_data_id: Option<i64>,
    #[serde(rename = "recordId", skip_serializing_if = "Option::is_none")]
    pub record_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_time: Option<String>,
    #[serde(rename = "photoUrl", skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Body of `GET /records/graph/:id`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GraphHistory {
    #[serde(rename = "graphDataList", default)]
    pub points: Vec<GraphPoint>,
}

/// Body of `GET /records/photo/:id`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhotoHistory {
    #[serde(rename = "photoDataList", default)]
    pub entries: Vec<PhotoEntry>,
}

/// Body of `PATCH /records/graph/:recordId/:dataId`. `graph_time` is sent as
/// `null` when cleared.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphPointUpdate {
    pub graph_data: f64,
    pub graph_time: Option<String>,
}

/// The server sends graph values either as JSON numbers or numeric strings.
fn number_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pet_uses_server_field_names() {
        let raw = r#"{"petId":42,"pet_name":"Rex","species":"dog","pet_registration_number":"R-1","neutering":"Y"}"#;
        let pet: Pet = serde_json::from_str(raw).unwrap();
        assert_eq!(pet.pet_id, 42);
        assert_eq!(pet.registration_number, "R-1");
        assert!(pet.records.is_empty());
        assert!(pet.image_url.is_none());
    }

    #[test]
    fn pet_without_id_is_rejected() {
        let raw = r#"{"pet_name":"Rex","species":"dog"}"#;
        assert!(serde_json::from_str::<Pet>(raw).is_err());
    }

    #[test]
    fn draft_serializes_without_id() {
        let draft = PetDraft {
            pet_name: "Rex".to_string(),
            species: "dog".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_value(&draft).unwrap();
        assert!(json.get("petId").is_none());
        assert_eq!(json["pet_registration_number"], "");
    }

    #[test]
    fn draft_requires_name_and_species() {
        let mut draft = PetDraft {
            pet_name: "Rex".to_string(),
            ..Default::default()
        };
        assert!(matches!(draft.validate(), Err(ApiError::Validation(_))));
        draft.species = "dog".to_string();
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn photo_record_rejects_unit() {
        let mut draft = RecordDraft::photo("Walks");
        assert!(draft.validate().is_ok());
        draft.unit = Some("kg".to_string());
        assert!(matches!(draft.validate(), Err(ApiError::Validation(_))));
        assert!(RecordDraft::graph("Weight", "kg").validate().is_ok());
    }

    #[test]
    fn record_type_wire_names() {
        let rec: Record =
            serde_json::from_str(r#"{"recordId":1,"title":"Weight","recordType":"GRAPH","unit":"kg"}"#)
                .unwrap();
        assert_eq!(rec.record_type, RecordType::Graph);
        assert_eq!(serde_json::to_value(RecordType::Photo).unwrap(), "PHOTO");
    }

    #[test]
    fn pet_update_keeps_records() {
        let mut pet = PetDraft {
            pet_name: "Rex".to_string(),
            species: "dog".to_string(),
            ..Default::default()
        }
        .into_pet(1);
        pet.records.push(Record {
            record_id: 9,
            title: "Weight".to_string(),
            record_type: RecordType::Graph,
            unit: Some("kg".to_string()),
            value: None,
            category_color: None,
            date: None,
            emoticon: None,
        });
        let update = PetUpdate {
            breed: Some("beagle".to_string()),
            ..Default::default()
        };
        update.apply_to(&mut pet);
        assert_eq!(pet.breed, "beagle");
        assert_eq!(pet.pet_name, "Rex");
        assert_eq!(pet.records.len(), 1);
    }

    #[test]
    fn graph_point_accepts_string_values() {
        let point: GraphPoint =
            serde_json::from_str(r#"{"graphDataId":3,"graph_data":"4.5","graph_date":"2025-01-02"}"#)
                .unwrap();
        assert_eq!(point.graph_data, 4.5);
        let point: GraphPoint = serde_json::from_str(r#"{"graph_data":7}"#).unwrap();
        assert_eq!(point.graph_data, 7.0);
    }
}
