//! Ink&Echoes 阅读端核心
//! 在 /api/v1 后端之上实现分页书籍阅读会话：章节加载、按字数分页、
//! 翻页状态机与书签 / 阅读进度同步；渲染层只消费快照、回送事件

pub mod api;
pub mod models;
pub mod reader;

pub use api::{ApiError, ApiResult, ContentSource, MockContentSource, RestContentSource};
pub use models::{
    Bookmark, BookmarkCreate, BookmarkUpdate, Chapter, ChapterContent, Post, PostContent,
    PostWithContent, ProgressUpdate, ReadingProgress, ReadingStats,
};
pub use reader::{
    map_key, paginate, Key, Modifiers, ReaderEvent, ReaderSession, ReaderSnapshot, RecordState,
    SessionConfig, TurnPhase,
};
