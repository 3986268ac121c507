//! 模拟内容源
//! 无后端联调与状态机测试用；按后端语义维护 (用户, 作品) 单行书签与进度

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{ApiError, ApiResult, BoxFuture, ContentSource};
use crate::models::{
    Bookmark, BookmarkCreate, BookmarkUpdate, Chapter, ProgressUpdate, ReadingProgress,
    ReadingStats,
};

/// 模拟用户 id
const MOCK_USER_ID: i64 = 1;

#[derive(Default)]
struct MockState {
    chapters: Vec<Chapter>,
    bodies: HashMap<i64, String>,
    bookmark: Option<Bookmark>,
    progress: Option<ReadingProgress>,
    next_id: i64,
    /// 上送过的进度请求，按序记录，断言用
    progress_log: Vec<ProgressUpdate>,
}

impl MockState {
    fn alloc_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// 模拟内容源
pub struct MockContentSource {
    state: Mutex<MockState>,
    /// 置位后所有调用都返回错误，模拟后端不可用
    offline: AtomicBool,
    /// 章节正文响应的人为延迟，模拟慢网络
    body_delay: Mutex<Duration>,
}

impl Default for MockContentSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MockContentSource {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            offline: AtomicBool::new(false),
            body_delay: Mutex::new(Duration::ZERO),
        }
    }

    /// 追加一个章节及其正文，返回章节 id
    pub async fn push_chapter(&self, post_id: i64, title: &str, body: &str) -> i64 {
        let mut state = self.state.lock().await;
        let id = state.alloc_id();
        let order = state.chapters.len() as i64 + 1;
        state.chapters.push(Chapter {
            id,
            post_id,
            title: title.to_string(),
            order,
            created_at: Utc::now(),
            updated_at: None,
            content: None,
        });
        state.bodies.insert(id, body.to_string());
        id
    }

    /// 预置一条书签行
    pub async fn seed_bookmark(
        &self,
        post_id: i64,
        chapter_id: Option<i64>,
        page_number: u32,
        touched_at: DateTime<Utc>,
    ) {
        let mut state = self.state.lock().await;
        let id = state.alloc_id();
        state.bookmark = Some(Bookmark {
            id,
            user_id: MOCK_USER_ID,
            post_id,
            chapter_id,
            page_number,
            note: None,
            created_at: touched_at,
            updated_at: Some(touched_at),
        });
    }

    /// 预置一条进度行
    pub async fn seed_progress(
        &self,
        post_id: i64,
        current_page: u32,
        total_pages: u32,
        last_read_at: DateTime<Utc>,
    ) {
        let mut state = self.state.lock().await;
        let id = state.alloc_id();
        let total = total_pages.max(1);
        state.progress = Some(ReadingProgress {
            id,
            user_id: MOCK_USER_ID,
            post_id,
            current_page,
            total_pages: total,
            progress_percentage: current_page as f64 / total as f64 * 100.0,
            reading_time_minutes: 0,
            last_read_at,
            created_at: last_read_at,
            updated_at: Some(last_read_at),
        });
    }

    /// 切换后端可用性
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Relaxed);
    }

    /// 设置章节正文响应延迟
    pub async fn set_body_delay(&self, delay: Duration) {
        *self.body_delay.lock().await = delay;
    }

    /// 当前书签行（至多一条）
    pub async fn bookmark_row(&self) -> Option<Bookmark> {
        self.state.lock().await.bookmark.clone()
    }

    /// 当前进度行（至多一条）
    pub async fn progress_row(&self) -> Option<ReadingProgress> {
        self.state.lock().await.progress.clone()
    }

    /// 已上送的进度请求记录
    pub async fn progress_log(&self) -> Vec<ProgressUpdate> {
        self.state.lock().await.progress_log.clone()
    }

    fn check_online(&self) -> ApiResult<()> {
        if self.offline.load(Ordering::Relaxed) {
            Err(ApiError::Unavailable("模拟后端不可用".to_string()))
        } else {
            Ok(())
        }
    }
}

impl ContentSource for MockContentSource {
    fn list_chapters(&self, post_id: i64) -> BoxFuture<'_, ApiResult<Vec<Chapter>>> {
        Box::pin(async move {
            self.check_online()?;
            let state = self.state.lock().await;
            Ok(state
                .chapters
                .iter()
                .filter(|ch| ch.post_id == post_id)
                .cloned()
                .collect())
        })
    }

    fn chapter_with_body(&self, chapter_id: i64) -> BoxFuture<'_, ApiResult<Chapter>> {
        Box::pin(async move {
            self.check_online()?;
            let delay = *self.body_delay.lock().await;
            if delay > Duration::ZERO {
                tokio::time::sleep(delay).await;
            }
            self.check_online()?;
            let state = self.state.lock().await;
            let mut chapter = state
                .chapters
                .iter()
                .find(|ch| ch.id == chapter_id)
                .cloned()
                .ok_or(ApiError::NotFound)?;
            chapter.content = state.bodies.get(&chapter_id).map(|body| {
                crate::models::ChapterContent { body: body.clone() }
            });
            Ok(chapter)
        })
    }

    fn bookmark_for_post(&self, post_id: i64) -> BoxFuture<'_, ApiResult<Option<Bookmark>>> {
        Box::pin(async move {
            self.check_online()?;
            let state = self.state.lock().await;
            Ok(state
                .bookmark
                .clone()
                .filter(|bm| bm.post_id == post_id))
        })
    }

    fn my_bookmarks(&self) -> BoxFuture<'_, ApiResult<Vec<Bookmark>>> {
        Box::pin(async move {
            self.check_online()?;
            let state = self.state.lock().await;
            Ok(state.bookmark.clone().into_iter().collect())
        })
    }

    fn create_bookmark(&self, req: BookmarkCreate) -> BoxFuture<'_, ApiResult<Bookmark>> {
        Box::pin(async move {
            self.check_online()?;
            let mut state = self.state.lock().await;
            let now = Utc::now();
            // 后端按 (用户, 作品) upsert：已有行时原地覆盖，不产生第二条
            let bookmark = match state.bookmark.take() {
                Some(mut existing) if existing.post_id == req.post_id => {
                    existing.chapter_id = req.chapter_id;
                    existing.page_number = req.page_number;
                    existing.note = req.note;
                    existing.updated_at = Some(now);
                    existing
                }
                _ => {
                    let id = state.alloc_id();
                    Bookmark {
                        id,
                        user_id: MOCK_USER_ID,
                        post_id: req.post_id,
                        chapter_id: req.chapter_id,
                        page_number: req.page_number,
                        note: req.note,
                        created_at: now,
                        updated_at: None,
                    }
                }
            };
            state.bookmark = Some(bookmark.clone());
            Ok(bookmark)
        })
    }

    fn update_bookmark(
        &self,
        bookmark_id: i64,
        req: BookmarkUpdate,
    ) -> BoxFuture<'_, ApiResult<Bookmark>> {
        Box::pin(async move {
            self.check_online()?;
            let mut state = self.state.lock().await;
            let bookmark = state
                .bookmark
                .as_mut()
                .filter(|bm| bm.id == bookmark_id)
                .ok_or(ApiError::NotFound)?;
            if let Some(chapter_id) = req.chapter_id {
                bookmark.chapter_id = Some(chapter_id);
            }
            if let Some(page_number) = req.page_number {
                bookmark.page_number = page_number;
            }
            if let Some(note) = req.note {
                bookmark.note = Some(note);
            }
            bookmark.updated_at = Some(Utc::now());
            Ok(bookmark.clone())
        })
    }

    fn delete_bookmark(&self, bookmark_id: i64) -> BoxFuture<'_, ApiResult<()>> {
        Box::pin(async move {
            self.check_online()?;
            let mut state = self.state.lock().await;
            let matched = state
                .bookmark
                .as_ref()
                .is_some_and(|bm| bm.id == bookmark_id);
            if matched {
                state.bookmark = None;
                Ok(())
            } else {
                Err(ApiError::NotFound)
            }
        })
    }

    fn progress_for_post(
        &self,
        post_id: i64,
    ) -> BoxFuture<'_, ApiResult<Option<ReadingProgress>>> {
        Box::pin(async move {
            self.check_online()?;
            let state = self.state.lock().await;
            Ok(state
                .progress
                .clone()
                .filter(|p| p.post_id == post_id))
        })
    }

    fn update_progress(
        &self,
        post_id: i64,
        req: ProgressUpdate,
    ) -> BoxFuture<'_, ApiResult<ReadingProgress>> {
        Box::pin(async move {
            self.check_online()?;
            let mut state = self.state.lock().await;
            state.progress_log.push(req.clone());
            let now = Utc::now();
            // 后端语义：current/total 取上送值（缺省为 1），百分比重算，分钟数累加
            let current = req.current_page.unwrap_or(1);
            let total = req.total_pages.unwrap_or(1).max(1);
            let minutes = req.reading_time_minutes.unwrap_or(0);
            let progress = match state.progress.take() {
                Some(mut existing) if existing.post_id == post_id => {
                    existing.current_page = current;
                    existing.total_pages = total;
                    existing.progress_percentage = current as f64 / total as f64 * 100.0;
                    existing.reading_time_minutes += minutes;
                    existing.last_read_at = now;
                    existing.updated_at = Some(now);
                    existing
                }
                _ => {
                    let id = state.alloc_id();
                    ReadingProgress {
                        id,
                        user_id: MOCK_USER_ID,
                        post_id,
                        current_page: current,
                        total_pages: total,
                        progress_percentage: current as f64 / total as f64 * 100.0,
                        reading_time_minutes: minutes,
                        last_read_at: now,
                        created_at: now,
                        updated_at: None,
                    }
                }
            };
            state.progress = Some(progress.clone());
            Ok(progress)
        })
    }

    fn reading_stats(&self) -> BoxFuture<'_, ApiResult<ReadingStats>> {
        Box::pin(async move {
            self.check_online()?;
            let state = self.state.lock().await;
            let stats = match &state.progress {
                Some(p) => ReadingStats {
                    total_books_read: 1,
                    total_reading_time_minutes: p.reading_time_minutes,
                    total_pages_read: p.current_page as i64,
                    average_completion: p.progress_percentage,
                },
                None => ReadingStats::default(),
            };
            Ok(stats)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BookmarkCreate;

    #[tokio::test]
    async fn test_create_bookmark_upserts_single_row() {
        let mock = MockContentSource::new();
        let first = mock
            .create_bookmark(BookmarkCreate {
                post_id: 1,
                chapter_id: None,
                page_number: 2,
                note: None,
            })
            .await
            .unwrap();

        // 同一作品再次创建：原地覆盖，id 不变
        let second = mock
            .create_bookmark(BookmarkCreate {
                post_id: 1,
                chapter_id: Some(9),
                page_number: 7,
                note: Some("回头再读".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.page_number, 7);

        let row = mock.bookmark_row().await.unwrap();
        assert_eq!(row.id, first.id);
        assert_eq!(row.chapter_id, Some(9));
        assert_eq!(row.note.as_deref(), Some("回头再读"));
    }

    #[tokio::test]
    async fn test_update_bookmark_patches_fields() {
        let mock = MockContentSource::new();
        let created = mock
            .create_bookmark(BookmarkCreate {
                post_id: 1,
                chapter_id: None,
                page_number: 1,
                note: None,
            })
            .await
            .unwrap();

        let updated = mock
            .update_bookmark(
                created.id,
                BookmarkUpdate {
                    page_number: Some(4),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.page_number, 4);
        assert!(updated.updated_at.is_some());

        // 不存在的 id 返回 NotFound
        let missing = mock
            .update_bookmark(9999, BookmarkUpdate::default())
            .await;
        assert!(matches!(missing, Err(ApiError::NotFound)));
    }

    #[tokio::test]
    async fn test_delete_bookmark_clears_row() {
        let mock = MockContentSource::new();
        let created = mock
            .create_bookmark(BookmarkCreate {
                post_id: 1,
                chapter_id: None,
                page_number: 1,
                note: None,
            })
            .await
            .unwrap();

        mock.delete_bookmark(created.id).await.unwrap();
        assert!(mock.bookmark_row().await.is_none());
        assert!(matches!(
            mock.delete_bookmark(created.id).await,
            Err(ApiError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_update_progress_accumulates_minutes() {
        let mock = MockContentSource::new();
        let first = mock
            .update_progress(
                1,
                ProgressUpdate {
                    current_page: Some(2),
                    total_pages: Some(10),
                    reading_time_minutes: Some(3),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(first.reading_time_minutes, 3);
        assert_eq!(first.progress_percentage, 20.0);

        // 分钟数按后端语义累加
        let second = mock
            .update_progress(
                1,
                ProgressUpdate {
                    current_page: Some(5),
                    total_pages: Some(10),
                    reading_time_minutes: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.reading_time_minutes, 5);
        assert_eq!(second.current_page, 5);
    }

    #[tokio::test]
    async fn test_bookmark_for_post_absence_is_none() {
        let mock = MockContentSource::new();
        // 不存在不是错误，是 None
        assert!(mock.bookmark_for_post(1).await.unwrap().is_none());
        assert!(mock.progress_for_post(1).await.unwrap().is_none());
    }
}
