//! Typed model of a Chrome DevTools Recorder export.
//!
//! A recording is read once and never mutated. Only `change` steps carry a
//! value the rotation rewrites; every other attribute is passive payload that
//! must survive a parse/serialize cycle untouched, so unknown keys land in
//! [`Step::extra`].

use crate::errors::BuilderError;
use crate::runtime::FileSystem;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

pub type SelectorGroup = Vec<String>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub title: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Recording {
    pub fn change_steps(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(|step| step.is_change())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    #[serde(rename = "type")]
    pub step_type: StepType,
    #[serde(
        default,
        deserialize_with = "deserialize_selector_groups",
        skip_serializing_if = "Option::is_none"
    )]
    pub selectors: Option<Vec<SelectorGroup>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Viewport, url, assertedEvents, offsets and anything else the recorder emits.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Step {
    pub fn change(selectors: Vec<SelectorGroup>, value: impl Into<String>) -> Self {
        Self {
            step_type: StepType::Change,
            selectors: Some(selectors),
            value: Some(value.into()),
            extra: Map::new(),
        }
    }

    /// Selector groups, empty when the step carries none.
    pub fn selectors(&self) -> &[SelectorGroup] {
        self.selectors.as_deref().unwrap_or_default()
    }

    pub fn is_change(&self) -> bool {
        self.step_type == StepType::Change
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StepType {
    SetViewport,
    Navigate,
    Click,
    DoubleClick,
    Change,
    KeyDown,
    KeyUp,
    Scroll,
    Hover,
    Close,
    WaitForElement,
    WaitForExpression,
    EmulateNetworkConditions,
    CustomStep,
    Other(String),
}

impl StepType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::SetViewport => "setViewport",
            Self::Navigate => "navigate",
            Self::Click => "click",
            Self::DoubleClick => "doubleClick",
            Self::Change => "change",
            Self::KeyDown => "keyDown",
            Self::KeyUp => "keyUp",
            Self::Scroll => "scroll",
            Self::Hover => "hover",
            Self::Close => "close",
            Self::WaitForElement => "waitForElement",
            Self::WaitForExpression => "waitForExpression",
            Self::EmulateNetworkConditions => "emulateNetworkConditions",
            Self::CustomStep => "customStep",
            Self::Other(raw) => raw.as_str(),
        }
    }
}

impl From<String> for StepType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "setViewport" => Self::SetViewport,
            "navigate" => Self::Navigate,
            "click" => Self::Click,
            "doubleClick" => Self::DoubleClick,
            "change" => Self::Change,
            "keyDown" => Self::KeyDown,
            "keyUp" => Self::KeyUp,
            "scroll" => Self::Scroll,
            "hover" => Self::Hover,
            "close" => Self::Close,
            "waitForElement" => Self::WaitForElement,
            "waitForExpression" => Self::WaitForExpression,
            "emulateNetworkConditions" => Self::EmulateNetworkConditions,
            "customStep" => Self::CustomStep,
            _ => Self::Other(value),
        }
    }
}

impl From<StepType> for String {
    fn from(value: StepType) -> Self {
        match value {
            StepType::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

// A group that is not a list of strings becomes an empty group, and a
// `selectors` value that is not a list becomes no groups, rather than a parse
// failure. A present key stays present on the way back out.
fn deserialize_selector_groups<'de, D>(
    deserializer: D,
) -> Result<Option<Vec<SelectorGroup>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Array(raw) = Value::deserialize(deserializer)? else {
        return Ok(Some(Vec::new()));
    };
    Ok(Some(
        raw.into_iter()
        .map(|group| match group {
            Value::Array(members) => {
                let strings = members
                    .iter()
                    .map(|member| member.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>();
                strings.unwrap_or_default()
            }
            _ => Vec::new(),
        })
        .collect(),
    ))
}

pub fn parse_recording(text: &str) -> Result<Recording, BuilderError> {
    serde_json::from_str(text).map_err(|e| BuilderError::RecordingParse(e.to_string()))
}

pub fn read_recording(fs: &dyn FileSystem, path: &Path) -> Result<Recording, BuilderError> {
    let text = fs.read_to_string(path)?;
    parse_recording(&text)
}
