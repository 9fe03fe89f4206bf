//! NVD CVE JSON 1.1 feed types.
//!
//! Only the parts of the schema that a converted Snyk advisory can fill in
//! are modelled. See: https://csrc.nist.gov/schema/nvd/feed/1.1/

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Date format used by NVD feeds, e.g. `2021-03-04T10:15Z`.
pub const NVD_DATE_FORMAT: &str = "%Y-%m-%dT%H:%MZ";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NvdFeed {
    #[serde(rename = "CVE_data_type")]
    pub data_type: String,
    #[serde(rename = "CVE_data_format")]
    pub data_format: String,
    #[serde(rename = "CVE_data_version")]
    pub data_version: String,
    #[serde(rename = "CVE_data_numberOfCVEs")]
    pub number_of_cves: String,
    #[serde(rename = "CVE_data_timestamp")]
    pub timestamp: String,
    #[serde(rename = "CVE_Items")]
    pub items: Vec<NvdCveItem>,
}

impl NvdFeed {
    /// Wraps items into a feed, ordered by CVE id.
    pub fn new(mut items: Vec<NvdCveItem>) -> Self {
        items.sort_by(|a, b| a.cve.meta.id.cmp(&b.cve.meta.id));
        Self {
            data_type: "CVE".to_string(),
            data_format: "MITRE".to_string(),
            data_version: "4.0".to_string(),
            number_of_cves: items.len().to_string(),
            timestamp: Utc::now().format(NVD_DATE_FORMAT).to_string(),
            items,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NvdCveItem {
    pub cve: Cve,
    pub configurations: Configurations,
    pub impact: Impact,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cve {
    pub data_type: String,
    pub data_format: String,
    pub data_version: String,
    #[serde(rename = "CVE_data_meta")]
    pub meta: CveMeta,
    pub problemtype: ProblemType,
    pub references: References,
    pub description: Description,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CveMeta {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "ASSIGNER")]
    pub assigner: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProblemType {
    pub problemtype_data: Vec<ProblemTypeData>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProblemTypeData {
    pub description: Vec<LangString>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LangString {
    pub lang: String,
    pub value: String,
}

impl LangString {
    pub fn english(value: impl Into<String>) -> Self {
        Self {
            lang: "en".to_string(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct References {
    pub reference_data: Vec<Reference>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub url: String,
    pub name: String,
    pub refsource: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Description {
    pub description_data: Vec<LangString>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configurations {
    #[serde(rename = "CVE_data_version")]
    pub data_version: String,
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub operator: String,
    pub cpe_match: Vec<CpeMatch>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpeMatch {
    pub vulnerable: bool,
    #[serde(rename = "cpe23Uri")]
    pub cpe23_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_start_including: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_start_excluding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_end_including: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_end_excluding: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Impact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_metric_v3: Option<BaseMetricV3>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseMetricV3 {
    #[serde(rename = "cvssV3")]
    pub cvss_v3: CvssV3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CvssV3 {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_string: Option<String>,
    pub base_score: f64,
    pub base_severity: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str) -> NvdCveItem {
        NvdCveItem {
            cve: Cve {
                data_type: "CVE".to_string(),
                data_format: "MITRE".to_string(),
                data_version: "4.0".to_string(),
                meta: CveMeta {
                    id: id.to_string(),
                    assigner: "security@snyk.io".to_string(),
                },
                problemtype: ProblemType::default(),
                references: References::default(),
                description: Description::default(),
            },
            configurations: Configurations {
                data_version: "4.0".to_string(),
                nodes: Vec::new(),
            },
            impact: Impact::default(),
            published_date: None,
            last_modified_date: None,
        }
    }

    #[test]
    fn test_feed_sorts_and_counts_items() {
        let feed = NvdFeed::new(vec![item("SNYK-B"), item("SNYK-A")]);

        assert_eq!(feed.number_of_cves, "2");
        assert_eq!(feed.items[0].cve.meta.id, "SNYK-A");
        assert_eq!(feed.items[1].cve.meta.id, "SNYK-B");
    }

    #[test]
    fn test_feed_field_names() {
        let json = serde_json::to_value(NvdFeed::new(vec![item("SNYK-A")])).unwrap();

        assert_eq!(json["CVE_data_type"], "CVE");
        assert_eq!(json["CVE_Items"][0]["cve"]["CVE_data_meta"]["ID"], "SNYK-A");
        assert!(json["CVE_Items"][0].get("publishedDate").is_none());
        assert!(json["CVE_Items"][0]["impact"].get("baseMetricV3").is_none());
    }
}
