use serde::{Deserialize, Serialize};

use super::availability::WeeklySchedule;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Professional {
    pub name: String,
    #[serde(alias = "type")]
    pub service_type: String,
    pub city: String,
    #[serde(default)]
    pub working_days: Vec<String>,
    #[serde(default)]
    pub working_hours: Option<String>,
    #[serde(default)]
    pub certification: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub years_experience: Option<u32>,
    #[serde(default)]
    pub default_time: Option<String>,
}

impl Professional {
    pub fn schedule(&self) -> WeeklySchedule {
        WeeklySchedule::new(&self.working_days, self.default_time.as_deref())
    }

    pub fn listing_line(&self) -> String {
        let rating = self
            .rating
            .map(|r| format!("{r:.1}"))
            .unwrap_or_else(|| "N/A".to_string());
        let experience = self
            .years_experience
            .map(|y| y.to_string())
            .unwrap_or_else(|| "N/A".to_string());
        format!(
            "- {} ({}) | Available: {} | Experience: {} years | Rating: {}",
            self.name,
            self.certification.as_deref().unwrap_or("N/A"),
            self.schedule().to_human_readable(),
            experience,
            rating,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_seed_shape() {
        let json = r#"{"name":"Dr. Raj Sharma","type":"Cardiologist","city":"Delhi","working_days":["Monday","Wednesday","Friday"],"working_hours":"10:00-16:00","certification":"MD Cardiology","rating":4.6,"years_experience":12}"#;
        let prof: Professional = serde_json::from_str(json).unwrap();
        assert_eq!(prof.service_type, "Cardiologist");
        assert_eq!(prof.working_days.len(), 3);
        assert_eq!(prof.default_time, None);
    }

    #[test]
    fn test_listing_line() {
        let prof = Professional {
            name: "Dr. Meera Joshi".to_string(),
            service_type: "Cardiologist".to_string(),
            city: "Pune".to_string(),
            working_days: vec!["Friday".to_string(), "Monday".to_string()],
            working_hours: Some("10:00-16:00".to_string()),
            certification: Some("MD Cardiology".to_string()),
            rating: Some(4.5),
            years_experience: None,
            default_time: None,
        };
        assert_eq!(
            prof.listing_line(),
            "- Dr. Meera Joshi (MD Cardiology) | Available: Monday, Friday | Experience: N/A years | Rating: 4.5"
        );
    }
}
