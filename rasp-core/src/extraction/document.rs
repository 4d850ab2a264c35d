use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    pub index: usize,
    pub slot: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub index: usize,
    pub slot: usize,
    pub items: Vec<Item>,
}

impl Section {
    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}

/// Ordered sections of a rendered page. Never contains an empty section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionDocument {
    sections: Vec<Section>,
}

impl ExtractionDocument {
    pub fn from_sections<I>(sections: I) -> Self
    where
        I: IntoIterator<Item = Section>,
    {
        Self {
            sections: sections
                .into_iter()
                .filter(|section| !section.items.is_empty())
                .collect(),
        }
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    pub fn total_items(&self) -> usize {
        self.sections.iter().map(Section::item_count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}
