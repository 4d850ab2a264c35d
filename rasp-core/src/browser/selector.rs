use crate::config::ExtractionSection;

use super::error::{BrowserError, BrowserResult};

const SECTION_PLACEHOLDER: &str = "{section}";
const ITEM_PLACEHOLDER: &str = "{item}";

/// Positional selector paths for sections and their items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorLayout {
    section_template: String,
    item_template: String,
}

impl SelectorLayout {
    pub fn new(
        section_template: impl Into<String>,
        item_template: impl Into<String>,
    ) -> BrowserResult<Self> {
        let section_template = section_template.into();
        let item_template = item_template.into();
        if !section_template.contains(SECTION_PLACEHOLDER) {
            return Err(BrowserError::Configuration(format!(
                "section template must contain {SECTION_PLACEHOLDER}: {section_template}"
            )));
        }
        if !item_template.contains(ITEM_PLACEHOLDER) {
            return Err(BrowserError::Configuration(format!(
                "item template must contain {ITEM_PLACEHOLDER}: {item_template}"
            )));
        }
        Ok(Self {
            section_template,
            item_template,
        })
    }

    pub fn from_config(config: &ExtractionSection) -> BrowserResult<Self> {
        Self::new(&config.section_template, &config.item_template)
    }

    pub fn section(&self, section: usize) -> String {
        self.section_template
            .replace(SECTION_PLACEHOLDER, &section.to_string())
    }

    pub fn item(&self, section: usize, item: usize) -> String {
        let mut selector = self.section(section);
        selector.push_str(&self.item_template.replace(ITEM_PLACEHOLDER, &item.to_string()));
        selector
    }

    pub fn selector_for(&self, section: usize, item: Option<usize>) -> String {
        match item {
            Some(item) => self.item(section, item),
            None => self.section(section),
        }
    }
}

impl Default for SelectorLayout {
    fn default() -> Self {
        let defaults = ExtractionSection::default();
        Self {
            section_template: defaults.section_template,
            item_template: defaults.item_template,
        }
    }
}
