use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup};
use url::Url;

use crate::config::MembershipConfig;

pub const HELP_BUTTON: &str = "Yordam";
pub const ABOUT_BUTTON: &str = "Biz haqimizda";
pub const CHANNEL_BUTTON: &str = "Kanal";
pub const GROUP_BUTTON: &str = "Guruh";
pub const WEBSITE_BUTTON: &str = "Veb sayt";
pub const SITE_LINK_BUTTON: &str = "🔗 Saytga o'tish";
pub const ADMIN_PANEL_BUTTON: &str = "👑 Admin paneli";
pub const ADMIN_STATS_BUTTON: &str = "📊 Admin statistikasi";
pub const ADD_ADMIN_BUTTON: &str = "👤 Admin qo'shish";
pub const REMOVE_ADMIN_BUTTON: &str = "🚫 Adminlikdan olish";
pub const ADMIN_BROADCAST_BUTTON: &str = "📝 Barcha foydalanuvchilarga xabar";
pub const USER_MODE_BUTTON: &str = "👥 Oddiy foydalanuvchi rejimi";

const MENU_LABELS: &[&str] = &[
    HELP_BUTTON,
    ABOUT_BUTTON,
    CHANNEL_BUTTON,
    GROUP_BUTTON,
    WEBSITE_BUTTON,
    SITE_LINK_BUTTON,
    ADMIN_PANEL_BUTTON,
    ADMIN_STATS_BUTTON,
    ADD_ADMIN_BUTTON,
    REMOVE_ADMIN_BUTTON,
    ADMIN_BROADCAST_BUTTON,
    USER_MODE_BUTTON,
];

pub fn is_menu_label(text: &str) -> bool {
    MENU_LABELS.contains(&text)
}

pub fn get_main_keyboard(is_admin: bool) -> KeyboardMarkup {
    let mut rows = vec![
        vec![KeyboardButton::new(HELP_BUTTON), KeyboardButton::new(ABOUT_BUTTON)],
        vec![
            KeyboardButton::new(CHANNEL_BUTTON),
            KeyboardButton::new(GROUP_BUTTON),
            KeyboardButton::new(WEBSITE_BUTTON),
        ],
        vec![KeyboardButton::new(SITE_LINK_BUTTON)],
    ];
    if is_admin {
        rows.push(vec![KeyboardButton::new(ADMIN_PANEL_BUTTON)]);
    }

    let mut keyboard = KeyboardMarkup::new(rows);
    keyboard.resize_keyboard = true;
    keyboard
}

pub fn get_admin_keyboard() -> KeyboardMarkup {
    let mut keyboard = KeyboardMarkup::new([
        vec![KeyboardButton::new(ADMIN_STATS_BUTTON)],
        vec![
            KeyboardButton::new(ADD_ADMIN_BUTTON),
            KeyboardButton::new(REMOVE_ADMIN_BUTTON),
        ],
        vec![KeyboardButton::new(ADMIN_BROADCAST_BUTTON)],
        vec![KeyboardButton::new(USER_MODE_BUTTON)],
    ]);
    keyboard.resize_keyboard = true;
    keyboard
}

/// Join links for both required chats plus a manual re-check button.
pub fn get_membership_keyboard(membership: &MembershipConfig) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new([
        [InlineKeyboardButton::url(
            "Kanalga a'zo bo'lish",
            membership.channel_url.clone(),
        )],
        [InlineKeyboardButton::url(
            "Guruhga a'zo bo'lish",
            membership.group_url.clone(),
        )],
        [InlineKeyboardButton::callback("Tekshirish", "check_membership")],
    ])
}

pub fn get_moderation_keyboard(submission_id: i64) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new([
        vec![
            InlineKeyboardButton::callback("Qabul qilish", format!("approve_{submission_id}")),
            InlineKeyboardButton::callback("Bekor qilish", format!("reject_{submission_id}")),
        ],
        vec![
            InlineKeyboardButton::callback("1 kun", format!("schedule_{submission_id}_1")),
            InlineKeyboardButton::callback("2 kun", format!("schedule_{submission_id}_2")),
            InlineKeyboardButton::callback("3 kun", format!("schedule_{submission_id}_3")),
        ],
    ])
}

/// Like/share affordances attached to every delivered motivation.
pub fn get_reaction_keyboard(submission_id: i64, text: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new([[
        InlineKeyboardButton::callback("👍 Like", format!("like_{submission_id}")),
        InlineKeyboardButton::switch_inline_query("📤 Ulashish", text),
    ]])
}

pub fn get_website_keyboard(url: &Url) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new([[InlineKeyboardButton::url("🌐 Saytga o'tish", url.clone())]])
}
