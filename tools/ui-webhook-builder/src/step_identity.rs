use crate::recording::{SelectorGroup, Step};
use sha2::{Digest, Sha256};
use std::fmt;

/// Stable identity of a value-changing step, derived from its selectors only.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StepKey(String);

impl StepKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn identify(step: &Step) -> Option<StepKey> {
    if !step.is_change() {
        return None;
    }
    Some(selector_key(step.selectors()))
}

/// Every count and length is framed before its bytes, so `[["ab"],["c"]]` and
/// `[["a"],["bc"]]` never feed the digest the same input.
pub fn selector_key(selectors: &[SelectorGroup]) -> StepKey {
    let mut digest = Sha256::new();
    digest.update((selectors.len() as u64).to_le_bytes());
    for group in selectors {
        digest.update((group.len() as u64).to_le_bytes());
        for selector in group {
            digest.update((selector.len() as u64).to_le_bytes());
            digest.update(selector.as_bytes());
        }
    }
    let bytes = digest.finalize();
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    StepKey(out)
}

pub fn same_selectors(left: &[SelectorGroup], right: &[SelectorGroup]) -> bool {
    left.len() == right.len()
        && left
            .iter()
            .zip(right)
            .all(|(a, b)| a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y))
}

pub fn selector_summary(step: &Step) -> String {
    step.selectors()
        .iter()
        .map(|group| group.first().map(String::as_str).unwrap_or_default())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn step_label(step: &Step) -> String {
    format!(
        "Input Field ID: {} | Selectors: {}",
        step.value.as_deref().unwrap_or_default(),
        selector_summary(step)
    )
}
