//! Typed patient feature snapshot for the CKD reference dataset

use crate::error::CkdResult;
use crate::feature_extractor::FeatureRecord;
use serde::{Deserialize, Serialize};

/// One patient's features, named as in the CKD reference dataset columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PatientSnapshot {
    // Demographics
    pub age: i32,
    /// 0 = male, 1 = female
    pub gender: i32,
    pub ethnicity: i32,
    pub socioeconomic_status: i32,
    pub education_level: i32,

    // Lifestyle
    #[serde(rename = "BMI")]
    pub bmi: f64,
    pub smoking: i32,
    pub alcohol_consumption: f64,
    pub physical_activity: f64,
    pub diet_quality: f64,
    pub sleep_quality: f64,

    // Medical history
    pub family_history_kidney_disease: i32,
    pub family_history_hypertension: i32,
    pub family_history_diabetes: i32,
    pub previous_acute_kidney_injury: i32,
    pub urinary_tract_infections: i32,

    // Clinical measurements
    #[serde(rename = "SystolicBP")]
    pub systolic_bp: f64,
    #[serde(rename = "DiastolicBP")]
    pub diastolic_bp: f64,
    pub fasting_blood_sugar: f64,
    #[serde(rename = "HbA1c")]
    pub hba1c: f64,
    pub serum_creatinine: f64,
    #[serde(rename = "BUNLevels")]
    pub bun_levels: f64,
    /// Glomerular filtration rate (mL/min/1.73m²)
    #[serde(rename = "GFR")]
    pub gfr: f64,
    pub protein_in_urine: f64,
    /// Albumin-to-creatinine ratio (mg/g)
    #[serde(rename = "ACR")]
    pub acr: f64,
    pub serum_electrolytes_sodium: f64,
    pub serum_electrolytes_potassium: f64,
    pub serum_electrolytes_calcium: f64,
    pub serum_electrolytes_phosphorus: f64,
    pub hemoglobin_levels: f64,
    pub cholesterol_total: f64,
    #[serde(rename = "CholesterolLDL")]
    pub cholesterol_ldl: f64,
    #[serde(rename = "CholesterolHDL")]
    pub cholesterol_hdl: f64,
    pub cholesterol_triglycerides: f64,

    // Medications
    #[serde(rename = "ACEInhibitors")]
    pub ace_inhibitors: i32,
    pub diuretics: i32,
    #[serde(rename = "NSAIDsUse")]
    pub nsaids_use: f64,
    pub statins: i32,
    pub antidiabetic_medications: i32,

    // Symptoms and quality of life
    pub edema: i32,
    pub fatigue_levels: f64,
    pub nausea_vomiting: f64,
    pub muscle_cramps: f64,
    pub itching: f64,
    pub quality_of_life_score: f64,

    // Environment and care
    pub heavy_metals_exposure: i32,
    pub occupational_exposure_chemicals: i32,
    pub water_quality: i32,
    pub medical_checkups_frequency: f64,
    pub medication_adherence: f64,
    pub health_literacy: f64,
    pub doctor_in_charge: i32,
}

impl PatientSnapshot {
    /// Example patient used as the regression fixture for trained bundles
    pub fn reference() -> Self {
        Self {
            age: 45,
            gender: 1,
            ethnicity: 0,
            socioeconomic_status: 2,
            education_level: 1,
            bmi: 27.5,
            smoking: 0,
            alcohol_consumption: 1.0,
            physical_activity: 2.0,
            diet_quality: 3.0,
            sleep_quality: 2.0,
            family_history_kidney_disease: 0,
            family_history_hypertension: 1,
            family_history_diabetes: 0,
            previous_acute_kidney_injury: 0,
            urinary_tract_infections: 0,
            systolic_bp: 130.0,
            diastolic_bp: 85.0,
            fasting_blood_sugar: 100.0,
            hba1c: 5.6,
            serum_creatinine: 1.0,
            bun_levels: 15.0,
            gfr: 90.0,
            protein_in_urine: 0.0,
            acr: 10.0,
            serum_electrolytes_sodium: 140.0,
            serum_electrolytes_potassium: 4.0,
            serum_electrolytes_calcium: 9.0,
            serum_electrolytes_phosphorus: 3.5,
            hemoglobin_levels: 14.0,
            cholesterol_total: 180.0,
            cholesterol_ldl: 100.0,
            cholesterol_hdl: 50.0,
            cholesterol_triglycerides: 120.0,
            ace_inhibitors: 0,
            diuretics: 0,
            nsaids_use: 0.0,
            statins: 0,
            antidiabetic_medications: 0,
            edema: 0,
            fatigue_levels: 1.0,
            nausea_vomiting: 0.0,
            muscle_cramps: 0.0,
            itching: 0.0,
            quality_of_life_score: 80.0,
            heavy_metals_exposure: 0,
            occupational_exposure_chemicals: 0,
            water_quality: 1,
            medical_checkups_frequency: 2.0,
            medication_adherence: 1.0,
            health_literacy: 2.0,
            doctor_in_charge: 1,
        }
    }

    /// Flatten into a record keyed by dataset column names
    pub fn to_record(&self) -> CkdResult<FeatureRecord> {
        let value = serde_json::to_value(self)?;
        Ok(serde_json::from_value(value)?)
    }

    /// Dataset column names covered by the snapshot, sorted
    pub fn feature_names() -> Vec<String> {
        match serde_json::to_value(Self::reference()) {
            Ok(serde_json::Value::Object(map)) => map.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }
}
