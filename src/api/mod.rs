//! 内容源适配器
//! 统一封装章节、书签与阅读进度的后端接口

mod mock;
mod rest;

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::models::{
    Bookmark, BookmarkCreate, BookmarkUpdate, Chapter, ProgressUpdate, ReadingProgress,
    ReadingStats,
};

pub use mock::MockContentSource;
pub use rest::RestContentSource;

/// 通用异步返回类型，统一封装内容源的异步接口
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 内容源操作错误
#[derive(Debug, Error)]
pub enum ApiError {
    /// 资源不存在；对书签 / 进度查询会在调用处转换为 None
    #[error("资源不存在")]
    NotFound,

    #[error("请求超时")]
    Timeout,

    #[error("服务端返回状态码 {0}")]
    Status(u16),

    #[error("响应解析失败: {0}")]
    Decode(String),

    #[error("请求失败: {0}")]
    Http(#[from] reqwest::Error),

    /// 模拟内容源注入的故障，测试用
    #[error("{0}")]
    Unavailable(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// 内容源接口
/// 纯请求 / 响应，不含本地状态；全部操作可能因网络原因失败
pub trait ContentSource: Send + Sync {
    /// 按 order 升序返回作品的章节列表（不含正文）
    fn list_chapters(&self, post_id: i64) -> BoxFuture<'_, ApiResult<Vec<Chapter>>>;

    /// 返回单个章节及其正文
    fn chapter_with_body(&self, chapter_id: i64) -> BoxFuture<'_, ApiResult<Chapter>>;

    /// 当前用户在该作品上的书签，不存在时返回 None（404 不是错误）
    fn bookmark_for_post(&self, post_id: i64) -> BoxFuture<'_, ApiResult<Option<Bookmark>>>;

    /// 当前用户的全部书签
    fn my_bookmarks(&self) -> BoxFuture<'_, ApiResult<Vec<Bookmark>>>;

    /// 创建书签；后端按 (用户, 作品) upsert，不会产生第二条
    fn create_bookmark(&self, req: BookmarkCreate) -> BoxFuture<'_, ApiResult<Bookmark>>;

    /// 更新书签
    fn update_bookmark(
        &self,
        bookmark_id: i64,
        req: BookmarkUpdate,
    ) -> BoxFuture<'_, ApiResult<Bookmark>>;

    /// 删除书签
    fn delete_bookmark(&self, bookmark_id: i64) -> BoxFuture<'_, ApiResult<()>>;

    /// 当前用户在该作品上的阅读进度，尚未建立时返回 None
    fn progress_for_post(&self, post_id: i64)
        -> BoxFuture<'_, ApiResult<Option<ReadingProgress>>>;

    /// 更新阅读进度；后端按 (用户, 作品) upsert，reading_time_minutes 由后端累加
    fn update_progress(
        &self,
        post_id: i64,
        req: ProgressUpdate,
    ) -> BoxFuture<'_, ApiResult<ReadingProgress>>;

    /// 当前用户的阅读统计概览
    fn reading_stats(&self) -> BoxFuture<'_, ApiResult<ReadingStats>>;
}
