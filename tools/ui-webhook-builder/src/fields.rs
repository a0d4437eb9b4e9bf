use crate::recording::Step;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Semantic rotation role a recorded step can be mapped onto.
///
/// Declaration order is the elicitation order and the rule-emission order:
/// required fields first, then optional ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    InputUsername,
    InputPassword,
    NewPassword,
    RequiredStaticInput,
}

impl Field {
    pub const REQUIRED: [Field; 3] = [Self::InputUsername, Self::InputPassword, Self::NewPassword];
    pub const OPTIONAL: [Field; 1] = [Self::RequiredStaticInput];
    pub const ALL: [Field; 4] = [
        Self::InputUsername,
        Self::InputPassword,
        Self::NewPassword,
        Self::RequiredStaticInput,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::InputUsername => "inputUsername",
            Self::InputPassword => "inputPassword",
            Self::NewPassword => "newPassword",
            Self::RequiredStaticInput => "requiredStaticInput",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::InputUsername => "Input Username",
            Self::InputPassword => "Input Password",
            Self::NewPassword => "New Password",
            Self::RequiredStaticInput => "Required Static Input",
        }
    }

    pub fn is_required(self) -> bool {
        Self::REQUIRED.contains(&self)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMapping {
    assignments: BTreeMap<Field, Vec<Step>>,
}

impl FieldMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends in selection order. Uniqueness across fields is owned by the
    /// elicitation pool, not by the mapping.
    pub fn assign(&mut self, field: Field, step: Step) {
        self.assignments.entry(field).or_default().push(step);
    }

    pub fn steps_for(&self, field: Field) -> &[Step] {
        self.assignments
            .get(&field)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn first_step(&self, field: Field) -> Option<&Step> {
        self.steps_for(field).first()
    }

    pub fn count(&self, field: Field) -> usize {
        self.steps_for(field).len()
    }

    /// Every (field, step) pair in field order, then assignment order.
    pub fn pairs(&self) -> impl Iterator<Item = (Field, &Step)> {
        self.assignments
            .iter()
            .flat_map(|(field, steps)| steps.iter().map(move |step| (*field, step)))
    }

    pub fn missing_required(&self) -> Vec<Field> {
        Field::REQUIRED
            .into_iter()
            .filter(|field| self.count(*field) == 0)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.values().all(Vec::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::{Field, FieldMapping};
    use crate::recording::Step;

    fn step(selector: &str, value: &str) -> Step {
        Step::change(vec![vec![selector.to_string()]], value)
    }

    #[test]
    fn field_keys_match_wire_contract() {
        assert_eq!(Field::InputUsername.as_str(), "inputUsername");
        assert_eq!(Field::InputPassword.as_str(), "inputPassword");
        assert_eq!(Field::NewPassword.as_str(), "newPassword");
        assert_eq!(Field::RequiredStaticInput.as_str(), "requiredStaticInput");
        assert_eq!(
            serde_json::to_string(&Field::RequiredStaticInput).expect("json"),
            "\"requiredStaticInput\""
        );
    }

    #[test]
    fn required_fields_precede_optional_fields() {
        assert!(Field::REQUIRED.iter().all(|field| field.is_required()));
        assert!(Field::OPTIONAL.iter().all(|field| !field.is_required()));
        let mut sorted = Field::ALL;
        sorted.sort();
        assert_eq!(sorted, Field::ALL);
    }

    #[test]
    fn pairs_follow_field_order_then_selection_order() {
        let mut mapping = FieldMapping::new();
        mapping.assign(Field::NewPassword, step("#new", "n"));
        mapping.assign(Field::InputUsername, step("#u2", "b"));
        mapping.assign(Field::InputUsername, step("#u1", "a"));

        let order = mapping
            .pairs()
            .map(|(field, step)| (field, step.selectors()[0][0].clone()))
            .collect::<Vec<_>>();
        assert_eq!(
            order,
            vec![
                (Field::InputUsername, "#u2".to_string()),
                (Field::InputUsername, "#u1".to_string()),
                (Field::NewPassword, "#new".to_string()),
            ]
        );
    }

    #[test]
    fn missing_required_lists_empty_required_fields() {
        let mut mapping = FieldMapping::new();
        assert!(mapping.is_empty());
        mapping.assign(Field::InputPassword, step("#p", "x"));
        assert_eq!(
            mapping.missing_required(),
            vec![Field::InputUsername, Field::NewPassword]
        );
        assert_eq!(mapping.first_step(Field::InputPassword).map(|s| s.selectors()[0][0].as_str()), Some("#p"));
        assert!(mapping.first_step(Field::RequiredStaticInput).is_none());
    }
}
