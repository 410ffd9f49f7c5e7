//! Fixed phrases, replies and the greeting carousel.

use chrono::{DateTime, Days};
use chrono_tz::Tz;

use crate::line::{Action, Column, PickerMode};

pub const GREETING_PHRASE: &str = "おはようございます";
pub const SCHEDULE_PHRASE: &str = "シフトを表示してください";
pub const SURVEY_START_PHRASE: &str = "アンケートを開始します";
pub const SURVEY_ANSWER_PHRASE: &str = "アンケートに回答します";

pub const NO_RESULT_TEXT: &str = "該当する結果は見つかりませんでした。";
pub const GENERIC_FAILURE_TEXT: &str = "エラーが発生しました。時間をおいて再度お試しください。";
pub const TEMPLATE_FALLBACK_TEXT: &str =
    "メニューを表示できませんでした。時間をおいて再度お試しください。";

pub const SURVEY_CONFIRM_PROMPT: &str = "アンケートを開始しますか？";
pub const SURVEY_YES_LABEL: &str = "はい";
pub const SURVEY_NO_LABEL: &str = "いいえ";
pub const SURVEY_DECLINE_DATA: &str = "action=survey_decline";

pub const DETAIL_URL: &str = "https://my-service-d6nkubzq2q-uc.a.run.app";

pub const SHIFT_ACCEPTED_PREFIX: &str = "シフトを受け付けました: ";
pub const SHIFT_INPUT_ACK_TEXT: &str = "シフト入力を受け付けました。";
pub const SHIFT_RECORD_FAILED_TEXT: &str =
    "シフトの登録に失敗しました。時間をおいて再度お試しください。";
pub const SURVEY_DECLINED_TEXT: &str = "アンケートをキャンセルしました。";

const COLUMN_TEXT: &str = "下記の中から選択してください。";
const ITEM1_IMAGE: &str = "https://example.com/bot/images/item1.jpg";
const ITEM2_IMAGE: &str = "https://example.com/bot/images/item2.jpg";
const PICKER_WINDOW_DAYS: u64 = 365;

pub fn survey_answer_text() -> String {
    format!("以下のリンクからアンケートに回答してください。\n{}", DETAIL_URL)
}

/// The three role columns shown for the greeting, in display order:
/// part-timers pick a shift date directly, full-time staff go through a
/// postback, managers get the schedule view.
pub fn greeting_columns(now: &DateTime<Tz>) -> Vec<Column> {
    let min = now
        .checked_sub_days(Days::new(PICKER_WINDOW_DAYS))
        .unwrap_or(*now);
    let max = now
        .checked_add_days(Days::new(PICKER_WINDOW_DAYS))
        .unwrap_or(*now);

    vec![
        column(
            ITEM1_IMAGE,
            "アルバイト＆パート",
            Action::DatetimePicker {
                label: "シフト入力".to_string(),
                data: "action=shift_input&item_id=123".to_string(),
                mode: PickerMode::Datetime,
                initial: Some(now.format("%Y-%m-%dT%H:%M").to_string()),
                min: Some(min.format("%Y-%m-%dT00:00").to_string()),
                max: Some(max.format("%Y-%m-%dT23:59").to_string()),
            },
        ),
        column(
            ITEM2_IMAGE,
            "正社員",
            Action::postback("シフト入力", "action=shift_input"),
        ),
        column(
            ITEM1_IMAGE,
            "管理者用",
            Action::message("シフト確認", SCHEDULE_PHRASE),
        ),
    ]
}

fn column(image: &str, title: &str, first: Action) -> Column {
    Column {
        image_url: Some(image.to_string()),
        title: Some(title.to_string()),
        body: COLUMN_TEXT.to_string(),
        actions: vec![
            first,
            Action::message("アンケート開始", SURVEY_START_PHRASE),
            Action::uri("View detail", DETAIL_URL),
        ],
    }
}
