//! 章节正文缓存
//! 回翻章节时避免重复请求后端；按正文字节数计权淘汰

use std::sync::Arc;

use moka::future::Cache as MokaCache;

/// 默认缓存容量（按正文字节数计）
const DEFAULT_MAX_CACHE_BYTES: u64 = 8 * 1024 * 1024; // 8MB

/// 章节正文缓存，键为章节 id
#[derive(Clone)]
pub struct ChapterBodyCache {
    cache: MokaCache<i64, Arc<String>>,
}

impl ChapterBodyCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_CACHE_BYTES)
    }

    pub fn with_capacity(max_bytes: u64) -> Self {
        let cache = MokaCache::builder()
            .weigher(|_id: &i64, body: &Arc<String>| body.len().min(u32::MAX as usize) as u32)
            .max_capacity(max_bytes)
            .build();
        Self { cache }
    }

    pub async fn get(&self, chapter_id: i64) -> Option<Arc<String>> {
        self.cache.get(&chapter_id).await
    }

    pub async fn put(&self, chapter_id: i64, body: String) -> Arc<String> {
        let body = Arc::new(body);
        self.cache.insert(chapter_id, Arc::clone(&body)).await;
        body
    }

    /// 清空全部缓存
    pub async fn clear(&self) {
        self.cache.invalidate_all();
    }
}

impl Default for ChapterBodyCache {
    fn default() -> Self {
        Self::new()
    }
}
