//! Human-readable texts sent to the chat.
//!
//! Wording matches the messages the bot has always sent, so it is fixed
//! rather than localized.

use courier_common::types::ReviewEvent;

const ACCEPTED: &str = "Работа принята";
const CHANGES_REQUESTED: &str = "К сожалению, в работе нашлись ошибки";

pub const STARTED_MESSAGE: &str = "Бот запущен и отслеживает проверки Devman...";
pub const STOPPED_MESSAGE: &str = "Бот остановлен вручную";
pub const UNAUTHORIZED_MESSAGE: &str =
    "Ошибка авторизации: неверный токен Devman. Бот остановлен.";

/// Render a finished review as a chat message.
pub fn format_review(event: &ReviewEvent) -> String {
    let status = if event.is_negative {
        CHANGES_REQUESTED
    } else {
        ACCEPTED
    };

    format!(
        "Преподаватель проверил работу: \"{}\",\n{}. {}.",
        event.lesson_title, event.lesson_url, status
    )
    .trim()
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(title: &str, url: &str, is_negative: bool) -> ReviewEvent {
        ReviewEvent {
            lesson_title: title.to_string(),
            lesson_url: url.to_string(),
            is_negative,
        }
    }

    #[test]
    fn test_accepted_review() {
        let text = format_review(&event("T", "U", false));
        assert_eq!(
            text,
            "Преподаватель проверил работу: \"T\",\nU. Работа принята."
        );
    }

    #[test]
    fn test_negative_review() {
        let text = format_review(&event("Chat bot", "https://dvmn.org/lesson/1/", true));
        assert!(text.contains(CHANGES_REQUESTED));
        assert!(!text.contains(ACCEPTED));
    }

    #[test]
    fn test_fields_appear_once() {
        let title = "Отправляем уведомления о проверке работ";
        let url = "https://dvmn.org/modules/chat-bots/lesson/devman-bot/";
        for is_negative in [true, false] {
            let text = format_review(&event(title, url, is_negative));
            assert_eq!(text.matches(title).count(), 1);
            assert_eq!(text.matches(url).count(), 1);
        }
    }

    #[test]
    fn test_no_surrounding_whitespace() {
        let text = format_review(&event("  padded  ", "u", false));
        assert_eq!(text, text.trim());
    }
}
