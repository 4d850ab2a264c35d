use chrono::{DateTime, Local};

use crate::extraction::{Item, Section};

const RULE_WIDTH: usize = 20;

pub fn section_header(section: &Section) -> String {
    format!(
        "📦 ДЕНЬ #{}\n📚 Занятий: {}\n",
        section.index,
        section.item_count()
    )
}

pub fn item_message(item: &Item) -> String {
    let rule = "─".repeat(RULE_WIDTH);
    format!("🎯 Занятие {}\n{rule}\n{}\n{rule}", item.index, item.text)
}

pub fn summary_message(sections: usize, items: usize, completed_at: DateTime<Local>) -> String {
    format!(
        "✅ Расписание полностью загружено!\n\
         📦 Дней занятий: {sections}\n\
         🎯 Всего занятий: {items}\n\
         🕐 Обновлено: {}\n\n\
         Для обновления нажми '📅 Получить расписание'",
        completed_at.format("%d.%m.%Y %H:%M")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn messages_carry_indices_counts_and_timestamp() {
        let item = Item {
            index: 2,
            slot: 3,
            text: "Физика, ауд. 101".into(),
        };
        let section = Section {
            index: 1,
            slot: 1,
            items: vec![item.clone()],
        };
        assert!(section_header(&section).contains("ДЕНЬ #1"));
        assert!(section_header(&section).contains("Занятий: 1"));
        let rendered = item_message(&item);
        assert!(rendered.starts_with("🎯 Занятие 2\n"));
        assert!(rendered.contains("Физика, ауд. 101"));

        let at = Local.with_ymd_and_hms(2025, 9, 1, 8, 30, 0).unwrap();
        let summary = summary_message(3, 11, at);
        assert!(summary.contains("Дней занятий: 3"));
        assert!(summary.contains("Всего занятий: 11"));
        assert!(summary.contains("01.09.2025 08:30"));
    }
}
