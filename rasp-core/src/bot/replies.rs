use crate::groups::GroupEntry;
use crate::telegram::ReplyKeyboard;

use super::commands::{HELP_BUTTON, REGISTER_BUTTON, SCHEDULE_BUTTON, SELECTION_PREFIX};

const EXAMPLES: &str = "Примеры:\n/reg ИСП-21-1\n/reg 22296\n/reg ПРОГ-20-1";

pub fn main_menu() -> ReplyKeyboard {
    ReplyKeyboard::from_rows([vec![REGISTER_BUTTON], vec![SCHEDULE_BUTTON, HELP_BUTTON]])
}

pub(crate) fn candidate_menu(candidates: &[GroupEntry]) -> ReplyKeyboard {
    ReplyKeyboard::from_rows(
        candidates
            .iter()
            .map(|entry| vec![format!("{SELECTION_PREFIX}{}", entry.label)]),
    )
}

pub(crate) fn greeting() -> String {
    format!(
        "👋 Привет! Я бот для получения расписания занятий.\n\n\
         🎯 ДЛЯ НАЧАЛА РАБОТЫ:\n\n\
         1. Зарегистрируй свою группу:\n/reg название_группы\n\n\
         {EXAMPLES}\n\n\
         2. Получай расписание кнопкой ниже!"
    )
}

pub(crate) fn help() -> String {
    format!(
        "❓ ПОМОЩЬ\n\n\
         🎯 Регистрация:\n/reg название_группы\nили /reg ссылка_на_расписание\n\n\
         {EXAMPLES}\n\n\
         📅 Получить расписание:\nНажми кнопку '{SCHEDULE_BUTTON}'\n\n\
         🔄 Перезапуск: /start"
    )
}

pub(crate) fn register_hint() -> String {
    format!(
        "🎯 Для регистрации отправь команду:\n/reg название_группы\n\n\
         {EXAMPLES}\n\n\
         Просто введи номер или название группы!\n\
         Некоторые группы пишутся в разном регистре."
    )
}

pub(crate) fn register_usage() -> String {
    format!("❌ Использование:\n/reg название_группы\n\n{EXAMPLES}")
}

pub(crate) fn registered(label: &str) -> String {
    format!("✅ Группа зарегистрирована!\n📚 Группа: {label}\n\nТеперь нажми '{SCHEDULE_BUTTON}'!")
}

pub(crate) fn choose_group(shown: usize, total: usize) -> String {
    if total > shown {
        format!("🔍 Найдено {total} групп, показаны первые {shown}:\nВыбери нужную группу или уточни запрос:")
    } else {
        format!("🔍 Найдено {total} групп:\nВыбери нужную группу:")
    }
}

pub(crate) fn not_found(query: &str) -> String {
    format!(
        "❌ Группа '{query}' не найдена.\n\n\
         Попробуй:\n\
         • Проверить написание\n\
         • Использовать номер группы\n\
         • Убедиться, что группа есть в списке"
    )
}

pub(crate) fn invalid_locator(prefix: &str) -> String {
    format!(
        "❌ Неверная ссылка!\nСсылка должна начинаться с:\n{prefix}\n\n\
         Проверь правильность ссылки и попробуй снова."
    )
}

pub(crate) const SELECTION_FAILED: &str = "❌ Ошибка выбора группы. Выбери группу кнопкой или отправь /reg заново.";

pub(crate) fn not_registered() -> String {
    format!("❌ Сначала зарегистрируй свою группу!\nНажми '{REGISTER_BUTTON}'")
}

pub(crate) const FETCHING: &str = "🔄 Получаю расписание...";
pub(crate) const EXTRACTION_FAILED: &str = "❌ Не удалось получить расписание. Попробуй позже.";
pub(crate) const NOTHING_FOUND: &str = "📭 Занятий не найдено. Попробуй позже.";

pub(crate) fn sending(days: usize) -> String {
    format!("✅ Найдено {days} дней с занятиями. Отправляю...")
}

pub(crate) fn delivery_interrupted(sent: usize) -> String {
    format!("❌ Отправка расписания прервана. Доставлено сообщений: {sent}. Попробуй позже.")
}

pub(crate) fn unknown() -> String {
    "Используй кнопки или команды:\n/reg - регистрация группы\n/start - инструкция".to_string()
}
