//! 阅读会话引擎
//! 章节加载、按字数分页、翻页状态机与书签 / 阅读进度同步

pub mod cache;
pub mod events;
pub mod paginator;
pub mod session;

pub use cache::ChapterBodyCache;
pub use events::{map_key, Key, Modifiers, ReaderEvent, ReaderSnapshot, TurnPhase};
pub use paginator::{
    page_count, paginate, word_count, words_per_page, BASE_FONT_SIZE_PX, BASE_WORDS_PER_PAGE,
};
pub use session::{ReaderSession, RecordState, SessionConfig};
