//! Compiles a finished [`FieldMapping`] into the jq rewrite rules of
//! `custom_logic.sh` and splices them into the rotation script template.

use crate::config::GeneratorConfig;
use crate::errors::BuilderError;
use crate::fields::{Field, FieldMapping};
use crate::logging::append_run_log;
use crate::recording::SelectorGroup;
use crate::runtime::FileSystem;
use crate::step_identity::same_selectors;
use serde_json::json;
use std::path::Path;

const CONDITIONS_SLOT: &str = "{{JQ_CONDITIONS}}";
const PASSWORD_LENGTH_SLOT: &str = "{{PASSWORD_LENGTH}}";
const REPLAY_COMMAND_SLOT: &str = "{{REPLAY_COMMAND}}";
const CONDITION_INDENT: &str = "\n            ";

/// Value a matched step receives when the script runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleValue {
    CurrentUsername,
    CurrentPassword,
    NewPassword,
    /// Pass the recorded value through unchanged.
    Original,
}

impl RuleValue {
    pub fn for_field(field: Field) -> Self {
        match field {
            Field::InputUsername => Self::CurrentUsername,
            Field::InputPassword => Self::CurrentPassword,
            Field::NewPassword => Self::NewPassword,
            Field::RequiredStaticInput => Self::Original,
        }
    }

    pub fn as_jq(self) -> &'static str {
        match self {
            Self::CurrentUsername => "$CURRENT_USERNAME",
            Self::CurrentPassword => "$CURRENT_PASSWORD",
            Self::NewPassword => "$NEW_PASSWORD",
            Self::Original => ".value",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRule {
    pub field: Field,
    pub selectors: Vec<SelectorGroup>,
    /// Compact JSON, byte-identical to jq's `.selectors | tostring`.
    pub selectors_json: String,
    pub value: RuleValue,
}

impl MatchRule {
    fn condition(&self) -> Result<String, BuilderError> {
        // The jq program sits inside a single-quoted bash string; jq reads
        // `\u0027` back as the same quote.
        let literal = serde_json::to_string(&self.selectors_json)
            .map_err(|e| BuilderError::Serialize(e.to_string()))?
            .replace('\'', "\\u0027");
        Ok(format!(
            "(.type == \"change\" and (.selectors | tostring) == {literal}) then .value = {}",
            self.value.as_jq()
        ))
    }
}

/// Ordered first-match-wins rule list with an implicit "leave unchanged"
/// fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleChain {
    pub rules: Vec<MatchRule>,
}

impl RuleChain {
    pub fn compile(mapping: &FieldMapping) -> Result<Self, BuilderError> {
        let rules = mapping
            .pairs()
            .map(|(field, step)| {
                let selectors_json = serde_json::to_string(step.selectors())
                    .map_err(|e| BuilderError::Serialize(e.to_string()))?;
                Ok(MatchRule {
                    field,
                    selectors: step.selectors().to_vec(),
                    selectors_json,
                    value: RuleValue::for_field(field),
                })
            })
            .collect::<Result<Vec<_>, BuilderError>>()?;
        Ok(Self { rules })
    }

    /// Indices of rules an earlier rule already matches. Unreachable when the
    /// mapping came from elicitation.
    pub fn shadowed_rules(&self) -> Vec<usize> {
        self.rules
            .iter()
            .enumerate()
            .filter(|(index, rule)| {
                self.rules[..*index]
                    .iter()
                    .any(|earlier| same_selectors(&earlier.selectors, &rule.selectors))
            })
            .map(|(index, _)| index)
            .collect()
    }

    /// One line per rule plus the trailing catch-all. An empty chain is the
    /// jq identity.
    pub fn render_lines(&self) -> Result<Vec<String>, BuilderError> {
        if self.rules.is_empty() {
            return Ok(vec![".".to_string()]);
        }
        let mut lines = Vec::with_capacity(self.rules.len() + 1);
        for (index, rule) in self.rules.iter().enumerate() {
            let keyword = if index == 0 { "if" } else { "elif" };
            lines.push(format!("{keyword} {}", rule.condition()?));
        }
        lines.push("else . end".to_string());
        Ok(lines)
    }

    pub fn render(&self) -> Result<String, BuilderError> {
        Ok(self.render_lines()?.join(CONDITION_INDENT))
    }
}

pub fn render_script(chain: &RuleChain, generator: &GeneratorConfig) -> Result<String, BuilderError> {
    let conditions = chain.render()?;
    Ok(SCRIPT_TEMPLATE
        .replace(PASSWORD_LENGTH_SLOT, &generator.password_length.to_string())
        .replace(REPLAY_COMMAND_SLOT, &generator.replay_command)
        .replace(CONDITIONS_SLOT, &conditions))
}

pub fn generate_script(
    mapping: &FieldMapping,
    generator: &GeneratorConfig,
) -> Result<String, BuilderError> {
    let chain = RuleChain::compile(mapping)?;
    for index in chain.shadowed_rules() {
        let rule = &chain.rules[index];
        append_run_log(
            "warn",
            "script.rule.shadowed",
            json!({ "index": index, "field": rule.field.as_str() }),
        );
    }
    append_run_log(
        "info",
        "script.rules.compiled",
        json!({ "rules": chain.rules.len() }),
    );
    render_script(&chain, generator)
}

pub fn write_script(fs: &dyn FileSystem, path: &Path, contents: &str) -> Result<(), BuilderError> {
    if let Some(parent) = path.parent() {
        fs.create_dir_all(parent)?;
    }
    fs.write_string(path, contents)?;
    append_run_log(
        "info",
        "script.written",
        json!({ "path": path.display().to_string(), "bytes": contents.len() }),
    );
    Ok(())
}

const SCRIPT_TEMPLATE: &str = r#"#!/bin/bash

# The Rotated Secret Payload should look like this (the order of the fields is not important):
# {
#   "username": "my-username",
#   "password": "my-password",
#   "recording": {
#     "title": "Recording 5/3/2024 at 3:23:34 PM",
#     "steps": [
#       // ... (all the steps from the recording)
#    ]
#   }
# }
# For more information, visit https://docs.akeyless.io/docs/create-a-custom-rotated-secret

function run_rotate() {
    PAYLOAD=$(echo "$*" | base64 -d)
    PAYLOAD_VALUE=$(echo "$PAYLOAD" | jq -r .payload)

    # Extract current credentials
    CURRENT_USERNAME=$(echo "$PAYLOAD_VALUE" | jq -r .username)
    CURRENT_PASSWORD=$(echo "$PAYLOAD_VALUE" | jq -r .password)

    # Generate new password
    NEW_PASSWORD=$(dd bs=1000 count=1 if=/dev/urandom status=none | tr -dc '[:alnum:]' | head -c {{PASSWORD_LENGTH}})

    # Use jq to update the recording JSON
    UPDATED_RECORDING=$(echo "$PAYLOAD_VALUE" | jq --arg CURRENT_USERNAME "$CURRENT_USERNAME" \
                                                  --arg CURRENT_PASSWORD "$CURRENT_PASSWORD" \
                                                  --arg NEW_PASSWORD "$NEW_PASSWORD" '
        .recording.steps |= map(
            {{JQ_CONDITIONS}}
        )
    ')

    # Execute the updated recording using puppeteer-replay
    echo "$UPDATED_RECORDING" | jq -r .recording > updated_recording.json
    {{REPLAY_COMMAND}} updated_recording.json

    # Prepare the new payload
    NEW_PAYLOAD=$(echo "$UPDATED_RECORDING" | jq -r --arg NEW_PASSWORD "$NEW_PASSWORD" '{
        username: .username,
        password: $NEW_PASSWORD,
        recording: .recording
    }')

    # Format the payload as required by Akeyless
    PAYLOAD_JSON=$(echo -n "$NEW_PAYLOAD" | jq -Rsa . | sed -e 's/\\n//g' -e 's/\\t//g')
    PAYLOAD_JSON=$(echo -n "{ \"payload\": $PAYLOAD_JSON }")

    # Output the formatted payload
    echo -n "$PAYLOAD_JSON"
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::Step;

    fn change(selectors: &[&[&str]], value: &str) -> Step {
        Step::change(
            selectors
                .iter()
                .map(|group| group.iter().map(|s| s.to_string()).collect())
                .collect(),
            value,
        )
    }

    fn sample_mapping() -> FieldMapping {
        let mut mapping = FieldMapping::new();
        mapping.assign(Field::InputUsername, change(&[&["#user"]], "alice"));
        mapping.assign(Field::InputPassword, change(&[&["#pass"]], "s3cret"));
        mapping.assign(Field::NewPassword, change(&[&["#newpass"]], "n3wpass"));
        mapping.assign(Field::NewPassword, change(&[&["#confirm"]], "n3wpass"));
        mapping.assign(Field::RequiredStaticInput, change(&[&["#tenant"]], "acme"));
        mapping
    }

    #[test]
    fn one_rule_per_pair_plus_catch_all() {
        let chain = RuleChain::compile(&sample_mapping()).expect("compile");
        assert_eq!(chain.rules.len(), 5);
        let lines = chain.render_lines().expect("render");
        assert_eq!(lines.len(), 6);
        assert!(lines[0].starts_with("if "));
        assert!(lines[1..5].iter().all(|line| line.starts_with("elif ")));
        assert_eq!(lines[5], "else . end");
    }

    #[test]
    fn rule_values_follow_field_roles() {
        let chain = RuleChain::compile(&sample_mapping()).expect("compile");
        let values = chain.rules.iter().map(|rule| rule.value).collect::<Vec<_>>();
        assert_eq!(
            values,
            vec![
                RuleValue::CurrentUsername,
                RuleValue::CurrentPassword,
                RuleValue::NewPassword,
                RuleValue::NewPassword,
                RuleValue::Original,
            ]
        );
        let lines = chain.render_lines().expect("render");
        assert!(lines[0].ends_with(".value = $CURRENT_USERNAME"));
        assert!(lines[4].ends_with(".value = .value"));
    }

    #[test]
    fn selectors_are_embedded_as_escaped_compact_json() {
        let mut mapping = FieldMapping::new();
        mapping.assign(
            Field::InputUsername,
            change(&[&["#user"], &["xpath///*[@id=\"user\"]"]], "alice"),
        );
        let chain = RuleChain::compile(&mapping).expect("compile");
        assert_eq!(
            chain.rules[0].selectors_json,
            r##"[["#user"],["xpath///*[@id=\"user\"]"]]"##
        );
        let line = &chain.render_lines().expect("render")[0];
        assert_eq!(
            line,
            r##"if (.type == "change" and (.selectors | tostring) == "[[\"#user\"],[\"xpath///*[@id=\\\"user\\\"]\"]]") then .value = $CURRENT_USERNAME"##
        );
    }

    fn jq_program(script: &str) -> &str {
        let start = script
            .find("--arg NEW_PASSWORD \"$NEW_PASSWORD\" '")
            .expect("jq program start");
        let rest = &script[start..];
        let open = rest.find('\'').expect("opening quote") + 1;
        let close = rest[open..].find("\n    ')").expect("closing quote");
        &rest[open..open + close]
    }

    #[test]
    fn single_quotes_in_selectors_stay_inside_the_bash_quoted_program() {
        let mut mapping = FieldMapping::new();
        mapping.assign(
            Field::InputUsername,
            change(&[&["aria/User's name"], &["xpath///*[@id='user']"]], "alice"),
        );
        let chain = RuleChain::compile(&mapping).expect("compile");
        assert_eq!(
            chain.rules[0].selectors_json,
            r#"[["aria/User's name"],["xpath///*[@id='user']"]]"#
        );
        let line = &chain.render_lines().expect("render")[0];
        assert!(!line.contains('\''));
        assert!(line.contains(r"aria/User\u0027s name"));
        assert!(line.contains(r"@id=\u0027user\u0027]"));

        let script = generate_script(&mapping, &GeneratorConfig::default()).expect("script");
        let program = jq_program(&script);
        assert!(program.contains("$CURRENT_USERNAME"));
        assert!(program.contains("else . end"));
        assert!(!program.contains('\''));
    }

    #[test]
    fn script_with_quoted_selectors_passes_bash_syntax_check() {
        let Ok(version) = std::process::Command::new("bash").arg("--version").output() else {
            return;
        };
        if !version.status.success() {
            return;
        }
        let mut mapping = FieldMapping::new();
        mapping.assign(Field::InputUsername, change(&[&["aria/User's name"]], "alice"));
        mapping.assign(Field::InputPassword, change(&[&["xpath///*[@id='pw']"]], "s3cret"));
        let script = generate_script(&mapping, &GeneratorConfig::default()).expect("script");

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("custom_logic.sh");
        std::fs::write(&path, script).expect("write script");
        let status = std::process::Command::new("bash")
            .arg("-n")
            .arg(&path)
            .status()
            .expect("bash -n");
        assert!(status.success());
    }

    #[test]
    fn duplicate_selectors_are_reported_as_shadowed() {
        let mut mapping = FieldMapping::new();
        mapping.assign(Field::InputUsername, change(&[&["#same"]], "a"));
        mapping.assign(Field::InputPassword, change(&[&["#other"]], "b"));
        mapping.assign(Field::NewPassword, change(&[&["#same"]], "c"));
        let chain = RuleChain::compile(&mapping).expect("compile");
        assert_eq!(chain.shadowed_rules(), vec![2]);
        assert!(RuleChain::compile(&sample_mapping())
            .expect("compile")
            .shadowed_rules()
            .is_empty());
    }

    #[test]
    fn empty_chain_renders_identity() {
        let chain = RuleChain::compile(&FieldMapping::new()).expect("compile");
        assert_eq!(chain.render().expect("render"), ".");
    }

    #[test]
    fn script_splices_conditions_and_generator_settings() {
        let generator = GeneratorConfig {
            password_length: 20,
            replay_command: "npx @puppeteer/replay --headless".to_string(),
        };
        let script = generate_script(&sample_mapping(), &generator).expect("script");
        assert!(script.starts_with("#!/bin/bash\n"));
        assert!(script.contains("head -c 20)"));
        assert!(script.contains("npx @puppeteer/replay --headless updated_recording.json"));
        assert!(script.contains(".recording.steps |= map(\n            if (.type == \"change\""));
        assert!(script.contains("\n            else . end\n        )"));
        assert!(!script.contains("{{"));
    }

    #[test]
    fn write_failure_is_fatal() {
        let fs = crate::runtime::FakeFileSystem::default();
        fs.fail_writes_to("/out/custom_logic.sh");
        let err = write_script(&fs, Path::new("/out/custom_logic.sh"), "#!/bin/bash\n")
            .expect_err("must fail");
        assert!(matches!(err, BuilderError::Io(_)));
    }
}
