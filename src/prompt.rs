use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer};

const HEADER: &str = "Create a professional hiring post image with the following details:\n";
const CLOSING: &str = "\nDesign a modern, professional hiring post with clear typography, attractive layout, and include \"WE'RE HIRING\" as a prominent header.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AspectRatio {
    Square,
    Portrait,
    Landscape,
    Standard,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait => "9:16",
            AspectRatio::Landscape => "16:9",
            AspectRatio::Standard => "3:4",
        }
    }
}

impl FromStr for AspectRatio {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "1:1" => Ok(AspectRatio::Square),
            "9:16" => Ok(AspectRatio::Portrait),
            "16:9" => Ok(AspectRatio::Landscape),
            "3:4" => Ok(AspectRatio::Standard),
            other => Err(format!("unknown aspect ratio {}", other)),
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One form session's worth of job posting fields. Empty strings are absent fields.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct JobDetails {
    pub title: String,
    pub department: String,
    pub experience: String,
    pub responsibilities: String,
    pub skills: String,
    pub company: String,
    pub location: String,
    pub email: String,
    pub phone: String,
    pub primary_color: String,
    pub secondary_color: String,

    #[serde(deserialize_with = "lenient_aspect_ratio")]
    pub aspect_ratio: Option<AspectRatio>,
}

impl Default for JobDetails {
    fn default() -> Self {
        JobDetails {
            title: String::new(),
            department: String::new(),
            experience: String::new(),
            responsibilities: String::new(),
            skills: String::new(),
            company: String::new(),
            location: String::new(),
            email: String::new(),
            phone: String::new(),
            primary_color: String::new(),
            secondary_color: String::new(),
            aspect_ratio: Some(AspectRatio::Square),
        }
    }
}

// Empty means the form default, anything unrecognized means "keep the input image's ratio".
fn lenient_aspect_ratio<'de, D>(deserializer: D) -> Result<Option<AspectRatio>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(match raw.as_deref() {
        None | Some("") => Some(AspectRatio::Square),
        Some(value) => value.parse().ok(),
    })
}

pub enum PromptSource<'a> {
    Structured(&'a JobDetails),
    FreeText(&'a str),
}

pub fn build_prompt(source: PromptSource<'_>) -> String {
    match source {
        PromptSource::FreeText(text) => text.to_string(),
        PromptSource::Structured(details) => structured_prompt(details),
    }
}

fn structured_prompt(details: &JobDetails) -> String {
    let mut prompt = String::from(HEADER);

    let contact = [details.email.as_str(), details.phone.as_str()]
        .into_iter()
        .filter(|value| !value.is_empty())
        .collect::<Vec<_>>()
        .join(" | ");

    let lines = [
        ("Job Title", details.title.as_str()),
        ("Company", details.company.as_str()),
        ("Location", details.location.as_str()),
        ("Department", details.department.as_str()),
        ("Experience Required", details.experience.as_str()),
        ("Responsibilities", details.responsibilities.as_str()),
        ("Required Skills", details.skills.as_str()),
        ("Contact", contact.as_str()),
    ];

    for (label, value) in lines {
        if !value.is_empty() {
            prompt.push_str(&format!("{}: {}\n", label, value));
        }
    }

    prompt.push_str(CLOSING);

    if !details.primary_color.is_empty() && !details.secondary_color.is_empty() {
        prompt.push_str(&format!(
            " Use colors: primary {}, secondary {}.",
            details.primary_color, details.secondary_color
        ));
    }

    prompt
}
