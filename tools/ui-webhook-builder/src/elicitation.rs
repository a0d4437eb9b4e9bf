//! Operator-driven mapping of recorded `change` steps onto rotation fields.
//!
//! Fields are walked in [`Field::ALL`] order. Each field re-prompts until the
//! operator picks "Done"; every picked step leaves the shared pool, so no
//! step can end up under two fields. Required fields never offer "Done"
//! before their first assignment.

use crate::errors::BuilderError;
use crate::fields::{Field, FieldMapping};
use crate::logging::append_run_log;
use crate::prompt::{MenuChoice, SelectOption, SelectPrompt, SplashScreen, DONE_LABEL};
use crate::recording::Step;
use crate::runtime::{Prompter, Terminal};
use crate::step_identity::{identify, step_label, StepKey};
use serde_json::json;

pub const SPLASH_TITLE: &str = "Akeyless UI Webhook Builder";
pub const SPLASH_PROCEED_LABEL: &str = "Start Mapping";

const SPLASH_BODY: &str = "Welcome to the Akeyless UI Webhook Builder!

This tool will guide you through mapping input fields from your recording captured using
the Chrome DevTools Recorder to the necessary credential rotation fields needed for the Akeyless Custom Rotator.

Important Rules:
1. There are three required fields: Input Username, Input Password, and New Password.
2. Each required field can be mapped to one or more input fields from your recording.
3. Multiple mappings for a field are useful for processes with double authentication or similar scenarios.
4. There is an optional 'Required Static Input' field for any additional static inputs needed in the rotation process.
5. If there are no duplicate fields to map, you can select 'Done' to move to the next field.

Mapping Process:
- For each field, you'll be presented with a list of available input fields from your recording.
- Select the appropriate input(s) for each field.
- If you've selected all necessary inputs for a field, choose 'Done' to move to the next field.
- For required fields, you must select at least one input before you can choose 'Done'.

Output Files:
1. custom_logic.sh - The bash script for credential rotation
2. payload.json - The initial payload for the rotation process

Let's begin the mapping process!";

#[derive(Debug, Clone, PartialEq)]
pub enum ElicitationOutcome {
    Completed(FieldMapping),
    Cancelled,
}

/// Unassigned `change` steps, in recording order.
///
/// Steps sharing a selector list share a key; only the first such step is
/// offered.
#[derive(Debug, Clone, Default)]
pub struct AvailableSteps {
    entries: Vec<(StepKey, Step)>,
}

impl AvailableSteps {
    pub fn from_steps<'a>(steps: impl IntoIterator<Item = &'a Step>) -> Self {
        let mut pool = Self::default();
        for step in steps {
            let Some(key) = identify(step) else {
                continue;
            };
            if pool.contains(&key) {
                continue;
            }
            pool.entries.push((key, step.clone()));
        }
        pool
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &StepKey) -> bool {
        self.entries.iter().any(|(candidate, _)| candidate == key)
    }

    pub fn take(&mut self, key: &StepKey) -> Option<Step> {
        let index = self
            .entries
            .iter()
            .position(|(candidate, _)| candidate == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StepKey, &Step)> {
        self.entries.iter().map(|(key, step)| (key, step))
    }
}

pub fn splash_screen() -> SplashScreen {
    SplashScreen {
        title: SPLASH_TITLE.to_string(),
        body: SPLASH_BODY.to_string(),
        proceed_label: SPLASH_PROCEED_LABEL.to_string(),
    }
}

pub fn prompt_title(field: Field, selections: usize) -> String {
    let suffix = if field.is_required() && selections == 0 {
        " (required)"
    } else {
        " (select another or choose 'Done' if no duplicate fields are left to map for this input)"
    };
    format!("Select a step for {}{suffix}", field.as_str())
}

pub fn required_notice(field: Field) -> String {
    format!(
        "{} is required. Please select at least one step.",
        field.as_str()
    )
}

/// Options for one prompt round: every available step, then "Done" unless
/// the field is required and still empty. "Done" is pre-selected once the
/// field has an assignment.
pub fn build_prompt(
    field: Field,
    available: &AvailableSteps,
    selections: usize,
    notice: Option<String>,
) -> SelectPrompt {
    let mut options = available
        .iter()
        .map(|(key, step)| SelectOption {
            label: step_label(step),
            choice: MenuChoice::Step(key.clone()),
        })
        .collect::<Vec<_>>();

    let mut default = None;
    if !field.is_required() || selections > 0 {
        options.push(SelectOption {
            label: DONE_LABEL.to_string(),
            choice: MenuChoice::Done,
        });
        if selections > 0 {
            default = Some(options.len() - 1);
        }
    }

    SelectPrompt {
        title: prompt_title(field, selections),
        notice,
        options,
        default,
    }
}

/// Cancellation from the prompter becomes [`ElicitationOutcome::Cancelled`];
/// any other prompt failure is returned as an error.
pub fn elicit(
    prompter: &dyn Prompter,
    terminal: &dyn Terminal,
    steps: &[Step],
) -> Result<ElicitationOutcome, BuilderError> {
    match elicit_mapping(prompter, terminal, steps) {
        Ok(mapping) => Ok(ElicitationOutcome::Completed(mapping)),
        Err(BuilderError::Cancelled) => {
            append_run_log("info", "elicitation.cancelled", json!({}));
            Ok(ElicitationOutcome::Cancelled)
        }
        Err(error) => Err(error),
    }
}

fn elicit_mapping(
    prompter: &dyn Prompter,
    terminal: &dyn Terminal,
    steps: &[Step],
) -> Result<FieldMapping, BuilderError> {
    prompter.splash(&splash_screen())?;

    let mut available = AvailableSteps::from_steps(steps);
    append_run_log(
        "info",
        "elicitation.started",
        json!({ "change_steps": available.len() }),
    );

    let mut mapping = FieldMapping::new();
    for field in Field::REQUIRED {
        select_for_field(prompter, terminal, &mut available, &mut mapping, field)?;
    }

    if available.is_empty() {
        append_run_log(
            "debug",
            "elicitation.optional.skipped",
            json!({ "reason": "no_available_steps" }),
        );
    } else {
        for field in Field::OPTIONAL {
            select_for_field(prompter, terminal, &mut available, &mut mapping, field)?;
            if available.is_empty() {
                break;
            }
        }
    }

    append_run_log(
        "info",
        "elicitation.completed",
        json!({
            "assignments": Field::ALL
                .iter()
                .map(|field| (field.as_str(), mapping.count(*field)))
                .collect::<std::collections::BTreeMap<_, _>>(),
            "unassigned": available.len(),
        }),
    );
    Ok(mapping)
}

fn select_for_field(
    prompter: &dyn Prompter,
    terminal: &dyn Terminal,
    available: &mut AvailableSteps,
    mapping: &mut FieldMapping,
    field: Field,
) -> Result<(), BuilderError> {
    let mut notice = None;
    loop {
        let selections = mapping.count(field);
        if field.is_required() && selections == 0 && available.is_empty() {
            append_run_log(
                "error",
                "elicitation.required.exhausted",
                json!({ "field": field.as_str() }),
            );
            return Err(BuilderError::Prompt(format!(
                "no change steps left to map to {}",
                field.as_str()
            )));
        }
        let prompt = build_prompt(field, available, selections, notice.take());
        match prompter.select(&prompt)? {
            MenuChoice::Done if field.is_required() && selections == 0 => {
                let message = required_notice(field);
                terminal.write_line(&message)?;
                append_run_log(
                    "warn",
                    "elicitation.required.rejected_done",
                    json!({ "field": field.as_str() }),
                );
                notice = Some(message);
            }
            MenuChoice::Done => {
                append_run_log(
                    "info",
                    "elicitation.field.completed",
                    json!({ "field": field.as_str(), "steps": selections }),
                );
                return Ok(());
            }
            MenuChoice::Step(key) => match available.take(&key) {
                Some(step) => {
                    append_run_log(
                        "info",
                        "elicitation.step.assigned",
                        json!({ "field": field.as_str(), "step_key": key.as_str() }),
                    );
                    mapping.assign(field, step);
                }
                None => {
                    append_run_log(
                        "debug",
                        "elicitation.step.unavailable",
                        json!({ "field": field.as_str(), "step_key": key.as_str() }),
                    );
                }
            },
        }
    }
}
