//! Supported industry selectors for the appeal stage.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Industry {
    Tech,
    Finance,
    Healthcare,
    Marketing,
    Sales,
    Education,
    Consulting,
    Manufacturing,
    Legal,
    Retail,
}

impl Industry {
    pub const ALL: [Industry; 10] = [
        Industry::Tech,
        Industry::Finance,
        Industry::Healthcare,
        Industry::Marketing,
        Industry::Sales,
        Industry::Education,
        Industry::Consulting,
        Industry::Manufacturing,
        Industry::Legal,
        Industry::Retail,
    ];

    /// Canonical selector, as accepted on the API.
    pub fn id(self) -> &'static str {
        match self {
            Industry::Tech => "tech",
            Industry::Finance => "finance",
            Industry::Healthcare => "healthcare",
            Industry::Marketing => "marketing",
            Industry::Sales => "sales",
            Industry::Education => "education",
            Industry::Consulting => "consulting",
            Industry::Manufacturing => "manufacturing",
            Industry::Legal => "legal",
            Industry::Retail => "retail",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Industry::Tech => "Technology",
            Industry::Finance => "Finance & Banking",
            Industry::Healthcare => "Healthcare",
            Industry::Marketing => "Marketing",
            Industry::Sales => "Sales",
            Industry::Education => "Education",
            Industry::Consulting => "Consulting",
            Industry::Manufacturing => "Manufacturing & Engineering",
            Industry::Legal => "Legal",
            Industry::Retail => "Retail & E-commerce",
        }
    }

    /// What hiring managers in this industry weigh most. Threaded into the appeal prompt.
    pub fn hiring_focus(self) -> &'static str {
        match self {
            Industry::Tech => {
                "technical depth, shipped systems, scale handled, and measurable engineering impact"
            }
            Industry::Finance => {
                "quantified financial outcomes, risk and compliance awareness, and analytical rigor"
            }
            Industry::Healthcare => {
                "patient outcomes, regulatory compliance (HIPAA and similar), and clinical credentials"
            }
            Industry::Marketing => {
                "campaign results, growth metrics, channel expertise, and brand storytelling"
            }
            Industry::Sales => "quota attainment, revenue generated, pipeline growth, and deal size",
            Industry::Education => {
                "learner outcomes, curriculum design, certifications, and classroom leadership"
            }
            Industry::Consulting => {
                "client impact, problem structuring, engagement leadership, and stakeholder management"
            }
            Industry::Manufacturing => {
                "process improvement, safety record, throughput and yield gains, and lean/six sigma practice"
            }
            Industry::Legal => {
                "matter outcomes, practice area depth, bar admissions, and drafting precision"
            }
            Industry::Retail => {
                "sales per square foot or GMV, customer experience, merchandising, and operations efficiency"
            }
        }
    }
}

impl fmt::Display for Industry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedIndustry(pub String);

impl fmt::Display for UnsupportedIndustry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let supported: Vec<&str> = Industry::ALL.iter().map(|i| i.id()).collect();
        write!(
            f,
            "Unsupported industry '{}'. Supported: {}",
            self.0,
            supported.join(", ")
        )
    }
}

impl std::error::Error for UnsupportedIndustry {}

impl FromStr for Industry {
    type Err = UnsupportedIndustry;

    /// Case-insensitive; `-`, `_` and spaces are interchangeable.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let key: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == '_' || c == ' ' { '-' } else { c })
            .collect();

        let industry = match key.as_str() {
            "tech" | "technology" | "software" | "it" => Industry::Tech,
            "finance" | "banking" | "fintech" => Industry::Finance,
            "healthcare" | "health" | "medical" => Industry::Healthcare,
            "marketing" => Industry::Marketing,
            "sales" => Industry::Sales,
            "education" => Industry::Education,
            "consulting" => Industry::Consulting,
            "manufacturing" | "engineering" => Industry::Manufacturing,
            "legal" | "law" => Industry::Legal,
            "retail" | "ecommerce" | "e-commerce" => Industry::Retail,
            _ => return Err(UnsupportedIndustry(raw.trim().to_string())),
        };
        Ok(industry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_canonical_ids() {
        for industry in Industry::ALL {
            assert_eq!(industry.id().parse::<Industry>(), Ok(industry));
        }
    }

    #[test]
    fn test_parses_aliases_case_insensitively() {
        assert_eq!("Technology".parse::<Industry>(), Ok(Industry::Tech));
        assert_eq!(" FINTECH ".parse::<Industry>(), Ok(Industry::Finance));
        assert_eq!("e_commerce".parse::<Industry>(), Ok(Industry::Retail));
        assert_eq!("E Commerce".parse::<Industry>(), Ok(Industry::Retail));
    }

    #[test]
    fn test_unknown_industry_lists_supported_selectors() {
        let err = "astrology".parse::<Industry>().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("astrology"));
        assert!(message.contains("tech"));
        assert!(message.contains("retail"));
    }

    #[test]
    fn test_every_industry_has_focus_text() {
        for industry in Industry::ALL {
            assert!(!industry.hiring_focus().is_empty());
            assert!(!industry.label().is_empty());
        }
    }
}
