use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use super::nvd::*;
use super::Convertible;
use crate::error::{Error, Result};

const ASSIGNER: &str = "security@snyk.io";

/// A single Snyk vulnerability advisory.
///
/// Only `language` is required; everything else defaults when absent.
/// Fields this type does not know about are kept in [`Advisory::extra`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Advisory {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub language: String,
    #[serde(default)]
    pub package_name: String,
    #[serde(default)]
    pub package_manager: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub cvss_score: Option<f64>,
    #[serde(default, rename = "CVSSv3")]
    pub cvss_v3: String,
    #[serde(default)]
    pub identifiers: Identifiers,
    #[serde(default)]
    pub references: Vec<AdvisoryReference>,
    #[serde(default)]
    pub vulnerable_versions: Vec<String>,
    #[serde(default)]
    pub publication_time: Option<String>,
    #[serde(default)]
    pub modification_time: Option<String>,
    #[serde(default)]
    pub disclosure_time: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Identifiers {
    #[serde(default, rename = "CVE")]
    pub cve: Vec<String>,
    #[serde(default, rename = "CWE")]
    pub cwe: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdvisoryReference {
    #[serde(default)]
    pub title: String,
    pub url: String,
}

impl Convertible for Advisory {
    fn convert(&self) -> Result<NvdCveItem> {
        if self.id.is_empty() {
            return Err(Error::convert(
                "",
                format!("{} advisory has no id", self.language),
            ));
        }

        Ok(NvdCveItem {
            cve: Cve {
                data_type: "CVE".to_string(),
                data_format: "MITRE".to_string(),
                data_version: "4.0".to_string(),
                meta: CveMeta {
                    id: self.id.clone(),
                    assigner: ASSIGNER.to_string(),
                },
                problemtype: self.problem_type(),
                references: self.nvd_references(),
                description: self.nvd_description(),
            },
            configurations: Configurations {
                data_version: "4.0".to_string(),
                nodes: self.configuration_nodes(),
            },
            impact: self.impact(),
            published_date: self
                .publication_time
                .as_deref()
                .or(self.disclosure_time.as_deref())
                .and_then(nvd_date),
            last_modified_date: self.modification_time.as_deref().and_then(nvd_date),
        })
    }
}

impl Advisory {
    fn nvd_description(&self) -> Description {
        let text: Vec<&str> = [self.title.trim(), self.description.trim()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect();

        let mut description = Description::default();
        if !text.is_empty() {
            description
                .description_data
                .push(LangString::english(text.join("\n\n")));
        }
        description
    }

    fn problem_type(&self) -> ProblemType {
        ProblemType {
            problemtype_data: vec![ProblemTypeData {
                description: self
                    .identifiers
                    .cwe
                    .iter()
                    .map(LangString::english)
                    .collect(),
            }],
        }
    }

    fn nvd_references(&self) -> References {
        let mut reference_data: Vec<Reference> = self
            .references
            .iter()
            .filter(|r| !r.url.is_empty())
            .map(|r| Reference {
                url: r.url.clone(),
                name: if r.title.is_empty() {
                    r.url.clone()
                } else {
                    r.title.clone()
                },
                refsource: "MISC".to_string(),
            })
            .collect();

        reference_data.extend(self.identifiers.cve.iter().map(|cve| Reference {
            url: format!("https://nvd.nist.gov/vuln/detail/{}", cve),
            name: cve.clone(),
            refsource: "CVE".to_string(),
        }));

        References { reference_data }
    }

    fn impact(&self) -> Impact {
        if self.cvss_v3.is_empty() && self.cvss_score.is_none() {
            return Impact::default();
        }

        let base_score = self.cvss_score.unwrap_or(0.0);
        let base_severity = if self.severity.is_empty() {
            severity_from_score(base_score).to_string()
        } else {
            self.severity.to_uppercase()
        };

        Impact {
            base_metric_v3: Some(BaseMetricV3 {
                cvss_v3: CvssV3 {
                    version: cvss_version(&self.cvss_v3).to_string(),
                    vector_string: Some(self.cvss_v3.clone()).filter(|v| !v.is_empty()),
                    base_score,
                    base_severity,
                },
            }),
        }
    }

    fn configuration_nodes(&self) -> Vec<Node> {
        if self.package_name.is_empty() {
            return Vec::new();
        }

        let (vendor, product) = vendor_and_product(&self.package_name);
        let target_sw = if self.language.is_empty() {
            "*".to_string()
        } else {
            escape_cpe(&self.language)
        };

        let ranges: Vec<VersionRange> = if self.vulnerable_versions.is_empty() {
            vec![VersionRange::default()]
        } else {
            self.vulnerable_versions
                .iter()
                .filter_map(|raw| match VersionRange::parse(raw) {
                    Ok(range) => Some(range),
                    Err(reason) => {
                        warn!("{}: skipping version range '{}': {}", self.id, raw, reason);
                        None
                    }
                })
                .collect()
        };

        let cpe_match: Vec<CpeMatch> = ranges
            .into_iter()
            .map(|range| range.into_cpe_match(&vendor, &product, &target_sw))
            .collect();

        if cpe_match.is_empty() {
            return Vec::new();
        }

        vec![Node {
            operator: "OR".to_string(),
            cpe_match,
        }]
    }
}

/// Maps a CVSS v3 base score onto the NVD severity bands.
pub fn severity_from_score(score: f64) -> &'static str {
    match score {
        s if s >= 9.0 => "CRITICAL",
        s if s >= 7.0 => "HIGH",
        s if s >= 4.0 => "MEDIUM",
        s if s > 0.0 => "LOW",
        _ => "NONE",
    }
}

/// Reads the CVSS version from a `CVSS:3.1/...` vector, defaulting to 3.0.
fn cvss_version(vector: &str) -> &str {
    vector
        .strip_prefix("CVSS:")
        .and_then(|rest| rest.split('/').next())
        .filter(|version| !version.is_empty())
        .unwrap_or("3.0")
}

fn nvd_date(rfc3339: &str) -> Option<String> {
    let parsed = DateTime::parse_from_rfc3339(rfc3339).ok()?;
    Some(parsed.with_timezone(&Utc).format(NVD_DATE_FORMAT).to_string())
}

/// Splits a package name into CPE vendor and product.
///
/// Handles npm scopes (`@scope/name`), maven coordinates (`group:artifact`)
/// and path-like module names (`github.com/owner/repo`).
fn vendor_and_product(package_name: &str) -> (String, String) {
    let (vendor, product) = if let Some((scope, name)) = package_name
        .strip_prefix('@')
        .and_then(|scoped| scoped.split_once('/'))
    {
        (scope, name)
    } else if let Some((group, artifact)) = package_name.split_once(':') {
        (group, artifact)
    } else if let Some((path, name)) = package_name.rsplit_once('/') {
        (path.rsplit('/').next().unwrap_or(path), name)
    } else {
        (package_name, package_name)
    };

    (escape_cpe(vendor), escape_cpe(product))
}

/// Escapes a value for a CPE 2.3 formatted string component.
fn escape_cpe(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.to_lowercase().chars() {
        if !(c.is_alphanumeric() || matches!(c, '_' | '-' | '.')) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Bounds parsed from one Snyk vulnerable-version expression.
#[derive(Debug, Default, PartialEq, Eq)]
struct VersionRange {
    exact: Option<String>,
    start_including: Option<String>,
    start_excluding: Option<String>,
    end_including: Option<String>,
    end_excluding: Option<String>,
}

impl VersionRange {
    /// Accepts semver-style comparator lists (`>=1.0.0 <1.2.3`), maven
    /// intervals (`[1.0,2.0)`), exact versions and `*`.
    fn parse(raw: &str) -> std::result::Result<Self, String> {
        let raw = raw.trim();
        if raw.is_empty() || raw == "*" {
            return Ok(Self::default());
        }
        if raw.starts_with('[') || raw.starts_with('(') {
            return Self::parse_interval(raw);
        }

        let mut range = Self::default();
        for part in raw.split(|c: char| c == ' ' || c == ',').filter(|p| !p.is_empty()) {
            if let Some(v) = part.strip_prefix(">=") {
                range.start_including = Some(v.to_string());
            } else if let Some(v) = part.strip_prefix("<=") {
                range.end_including = Some(v.to_string());
            } else if let Some(v) = part.strip_prefix('>') {
                range.start_excluding = Some(v.to_string());
            } else if let Some(v) = part.strip_prefix('<') {
                range.end_excluding = Some(v.to_string());
            } else if part == "*" {
                continue;
            } else {
                let exact = part.strip_prefix('=').unwrap_or(part);
                if exact.is_empty() || !exact.starts_with(|c: char| c.is_ascii_alphanumeric()) {
                    return Err(format!("unsupported comparator '{}'", part));
                }
                range.exact = Some(exact.to_string());
            }
        }

        if range.exact.is_some() && range.has_bounds() {
            return Err("exact version mixed with bounds".to_string());
        }
        Ok(range)
    }

    fn parse_interval(raw: &str) -> std::result::Result<Self, String> {
        let inclusive_start = raw.starts_with('[');
        let inclusive_end = match raw.chars().last() {
            Some(']') => true,
            Some(')') => false,
            _ => return Err("unterminated interval".to_string()),
        };
        let inner = &raw[1..raw.len() - 1];

        let mut range = Self::default();
        match inner.split_once(',') {
            Some((start, end)) => {
                let (start, end) = (start.trim(), end.trim());
                if !start.is_empty() {
                    if inclusive_start {
                        range.start_including = Some(start.to_string());
                    } else {
                        range.start_excluding = Some(start.to_string());
                    }
                }
                if !end.is_empty() {
                    if inclusive_end {
                        range.end_including = Some(end.to_string());
                    } else {
                        range.end_excluding = Some(end.to_string());
                    }
                }
            }
            None if inclusive_start && inclusive_end && !inner.trim().is_empty() => {
                range.exact = Some(inner.trim().to_string());
            }
            None => return Err("interval without separator".to_string()),
        }
        Ok(range)
    }

    fn has_bounds(&self) -> bool {
        self.start_including.is_some()
            || self.start_excluding.is_some()
            || self.end_including.is_some()
            || self.end_excluding.is_some()
    }

    fn into_cpe_match(self, vendor: &str, product: &str, target_sw: &str) -> CpeMatch {
        let version = self
            .exact
            .as_deref()
            .map(escape_cpe)
            .unwrap_or_else(|| "*".to_string());

        CpeMatch {
            vulnerable: true,
            cpe23_uri: format!(
                "cpe:2.3:a:{}:{}:{}:*:*:*:*:{}:*:*",
                vendor, product, version, target_sw
            ),
            version_start_including: self.start_including,
            version_start_excluding: self.start_excluding,
            version_end_including: self.end_including,
            version_end_excluding: self.end_excluding,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Advisory {
        serde_json::from_value(json!({
            "id": "SNYK-JS-LODASH-567746",
            "title": "Prototype Pollution",
            "language": "js",
            "packageName": "lodash",
            "packageManager": "npm",
            "description": "Affected versions are vulnerable.",
            "severity": "high",
            "cvssScore": 7.3,
            "CVSSv3": "CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:L/I:L/A:L",
            "identifiers": { "CVE": ["CVE-2020-8203"], "CWE": ["CWE-400"] },
            "references": [{ "title": "GitHub PR", "url": "https://github.com/lodash/lodash/pull/4759" }],
            "vulnerableVersions": ["<4.17.16"],
            "publicationTime": "2020-04-28T14:32:13.683154Z",
            "modificationTime": "2020-07-09T08:34:04+02:00",
            "socialTrendAlert": false
        }))
        .unwrap()
    }

    #[test]
    fn test_decode_keeps_unknown_fields() {
        let advisory = sample();
        assert_eq!(advisory.extra.get("socialTrendAlert"), Some(&json!(false)));
        assert!(!advisory.extra.contains_key("language"));
    }

    #[test]
    fn test_decode_requires_language() {
        let result: serde_json::Result<Advisory> = serde_json::from_value(json!({ "id": "x" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_rejects_type_mismatch() {
        let result: serde_json::Result<Advisory> =
            serde_json::from_value(json!({ "language": "go", "cvssScore": "high" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_convert_full_advisory() {
        let item = sample().convert().unwrap();

        assert_eq!(item.cve.meta.id, "SNYK-JS-LODASH-567746");
        assert_eq!(item.cve.meta.assigner, "security@snyk.io");
        assert_eq!(
            item.cve.description.description_data[0].value,
            "Prototype Pollution\n\nAffected versions are vulnerable."
        );
        assert_eq!(
            item.cve.problemtype.problemtype_data[0].description,
            vec![LangString::english("CWE-400")]
        );

        let refs = &item.cve.references.reference_data;
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].name, "GitHub PR");
        assert_eq!(refs[1].url, "https://nvd.nist.gov/vuln/detail/CVE-2020-8203");

        let cvss = item.impact.base_metric_v3.unwrap().cvss_v3;
        assert_eq!(cvss.base_score, 7.3);
        assert_eq!(cvss.base_severity, "HIGH");
        assert_eq!(cvss.version, "3.1");
        assert_eq!(
            cvss.vector_string.as_deref(),
            Some("CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:L/I:L/A:L")
        );

        let cpe = &item.configurations.nodes[0].cpe_match[0];
        assert_eq!(cpe.cpe23_uri, "cpe:2.3:a:lodash:lodash:*:*:*:*:*:js:*:*");
        assert_eq!(cpe.version_end_excluding.as_deref(), Some("4.17.16"));

        assert_eq!(item.published_date.as_deref(), Some("2020-04-28T14:32Z"));
        assert_eq!(item.last_modified_date.as_deref(), Some("2020-07-09T06:34Z"));
    }

    #[test]
    fn test_convert_minimal_advisory() {
        let advisory: Advisory =
            serde_json::from_value(json!({ "id": "SNYK-GOLANG-1", "language": "golang" })).unwrap();
        let item = advisory.convert().unwrap();

        assert!(item.cve.description.description_data.is_empty());
        assert!(item.configurations.nodes.is_empty());
        assert!(item.impact.base_metric_v3.is_none());
        assert!(item.published_date.is_none());
    }

    #[test]
    fn test_convert_without_id_fails() {
        let advisory: Advisory = serde_json::from_value(json!({ "language": "go" })).unwrap();
        assert!(matches!(advisory.convert(), Err(Error::Convert { .. })));
    }

    #[test]
    fn test_published_falls_back_to_disclosure() {
        let mut advisory = sample();
        advisory.publication_time = None;
        advisory.disclosure_time = Some("2019-12-31T23:59:59Z".to_string());
        let item = advisory.convert().unwrap();
        assert_eq!(item.published_date.as_deref(), Some("2019-12-31T23:59Z"));
    }

    #[test]
    fn test_severity_derived_from_score() {
        let mut advisory = sample();
        advisory.severity.clear();
        advisory.cvss_score = Some(9.8);
        let cvss = advisory.convert().unwrap().impact.base_metric_v3.unwrap().cvss_v3;
        assert_eq!(cvss.base_severity, "CRITICAL");
    }

    #[test]
    fn test_score_without_vector() {
        let mut advisory = sample();
        advisory.cvss_v3.clear();
        let item = advisory.convert().unwrap();

        let cvss = item.impact.base_metric_v3.as_ref().unwrap().cvss_v3.clone();
        assert_eq!(cvss.version, "3.0");
        assert!(cvss.vector_string.is_none());

        let json = serde_json::to_value(&item).unwrap();
        assert!(json["impact"]["baseMetricV3"]["cvssV3"].get("vectorString").is_none());
    }

    #[test]
    fn test_cvss_version_from_vector() {
        assert_eq!(cvss_version("CVSS:3.1/AV:N/AC:L"), "3.1");
        assert_eq!(cvss_version("CVSS:3.0/AV:N/AC:L"), "3.0");
        assert_eq!(cvss_version("AV:N/AC:L/Au:N"), "3.0");
        assert_eq!(cvss_version(""), "3.0");
    }

    #[test]
    fn test_severity_from_score_bands() {
        assert_eq!(severity_from_score(10.0), "CRITICAL");
        assert_eq!(severity_from_score(7.0), "HIGH");
        assert_eq!(severity_from_score(6.9), "MEDIUM");
        assert_eq!(severity_from_score(0.1), "LOW");
        assert_eq!(severity_from_score(0.0), "NONE");
    }

    #[test]
    fn test_vendor_and_product() {
        assert_eq!(
            vendor_and_product("@babel/core"),
            ("babel".to_string(), "core".to_string())
        );
        assert_eq!(
            vendor_and_product("org.apache.logging.log4j:log4j-core"),
            ("org.apache.logging.log4j".to_string(), "log4j-core".to_string())
        );
        assert_eq!(
            vendor_and_product("github.com/gin-gonic/gin"),
            ("gin-gonic".to_string(), "gin".to_string())
        );
        assert_eq!(
            vendor_and_product("Django"),
            ("django".to_string(), "django".to_string())
        );
    }

    #[test]
    fn test_escape_cpe() {
        assert_eq!(escape_cpe("foo+bar"), "foo\\+bar");
        assert_eq!(escape_cpe("a.b-c_d"), "a.b-c_d");
    }

    #[test]
    fn test_version_range_comparators() {
        let range = VersionRange::parse(">=1.0.0 <1.2.3").unwrap();
        assert_eq!(range.start_including.as_deref(), Some("1.0.0"));
        assert_eq!(range.end_excluding.as_deref(), Some("1.2.3"));

        let range = VersionRange::parse(">1.0, <=2.0").unwrap();
        assert_eq!(range.start_excluding.as_deref(), Some("1.0"));
        assert_eq!(range.end_including.as_deref(), Some("2.0"));

        assert_eq!(VersionRange::parse("*").unwrap(), VersionRange::default());
    }

    #[test]
    fn test_version_range_intervals() {
        let range = VersionRange::parse("[1.0,2.0)").unwrap();
        assert_eq!(range.start_including.as_deref(), Some("1.0"));
        assert_eq!(range.end_excluding.as_deref(), Some("2.0"));

        let range = VersionRange::parse("(,3.1]").unwrap();
        assert!(range.start_including.is_none());
        assert_eq!(range.end_including.as_deref(), Some("3.1"));

        let range = VersionRange::parse("[1.5]").unwrap();
        assert_eq!(range.exact.as_deref(), Some("1.5"));
    }

    #[test]
    fn test_version_range_rejects_garbage() {
        assert!(VersionRange::parse("~>1.0").is_err());
        assert!(VersionRange::parse("1.0 <2.0").is_err());
        assert!(VersionRange::parse("[1.0,2.0").is_err());
    }

    #[test]
    fn test_exact_version_goes_into_cpe() {
        let cpe = VersionRange::parse("=1.2.3")
            .unwrap()
            .into_cpe_match("acme", "widget", "python");
        assert_eq!(cpe.cpe23_uri, "cpe:2.3:a:acme:widget:1.2.3:*:*:*:*:python:*:*");
        assert!(cpe.version_end_excluding.is_none());
    }

    #[test]
    fn test_unparsable_ranges_are_skipped() {
        let mut advisory = sample();
        advisory.vulnerable_versions = vec!["~>1.0".to_string(), "<2.0.0".to_string()];
        let item = advisory.convert().unwrap();
        assert_eq!(item.configurations.nodes[0].cpe_match.len(), 1);
    }
}
