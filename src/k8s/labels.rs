use crate::defaults::{FIELD_MANAGER, MANAGED_BY_LABEL};
use std::collections::BTreeMap;

/// Collection of labels used to identify the objects created by the harness.
#[derive(Default)]
pub struct DefaultLabels(BTreeMap<String, String>);

impl DefaultLabels {
    pub fn new() -> Self {
        DefaultLabels(BTreeMap::from([(
            MANAGED_BY_LABEL.to_string(),
            FIELD_MANAGER.to_string(),
        )]))
    }

    pub fn get(&self) -> BTreeMap<String, String> {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels() {
        assert_eq!(
            DefaultLabels::new().get(),
            BTreeMap::from([(MANAGED_BY_LABEL.to_string(), FIELD_MANAGER.to_string())])
        );
    }
}
