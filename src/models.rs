use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 作品（文章 / 诗歌 / 书籍），阅读端只读
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub author_id: i64,
    pub author_username: Option<String>,
    pub visibility: String,
    pub content_type: String,
    #[serde(default)]
    pub likes_count: i64,
    #[serde(default)]
    pub claps_count: i64,
    pub cover_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// 作品正文（无章节时的平铺正文）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostContent {
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub cover_image_url: Option<String>,
    pub description: Option<String>,
}

/// 带正文的作品（详情接口返回）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostWithContent {
    #[serde(flatten)]
    pub post: Post,
    pub content: PostContent,
}

/// 章节，order 在作品内唯一并决定阅读顺序
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    pub id: i64,
    pub post_id: i64,
    pub title: String,
    pub order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    /// 列表接口不含正文，单章接口才返回
    pub content: Option<ChapterContent>,
}

/// 章节正文
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChapterContent {
    pub body: String,
}

/// 书签，每个 (用户, 作品) 至多一条，由后端 upsert 保证
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: i64,
    pub user_id: i64,
    pub post_id: i64,
    /// 无章节（平铺正文）时为空
    pub chapter_id: Option<i64>,
    /// 页码从 1 开始
    pub page_number: u32,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Bookmark {
    /// 书签的最近变更时间，用于恢复优先级比较
    pub fn touched_at(&self) -> DateTime<Utc> {
        self.updated_at.unwrap_or(self.created_at)
    }
}

/// 阅读进度，每个 (用户, 作品) 至多一条，阅读期间持续更新
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadingProgress {
    pub id: i64,
    pub user_id: i64,
    pub post_id: i64,
    /// 页码从 1 开始
    pub current_page: u32,
    pub total_pages: u32,
    pub progress_percentage: f64,
    /// 累计阅读分钟数，由后端累加
    pub reading_time_minutes: i64,
    pub last_read_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ReadingProgress {
    /// 进度的最近变更时间，用于恢复优先级比较
    pub fn touched_at(&self) -> DateTime<Utc> {
        self.last_read_at
    }
}

/// 用户阅读统计概览
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReadingStats {
    pub total_books_read: i64,
    pub total_reading_time_minutes: i64,
    pub total_pages_read: i64,
    pub average_completion: f64,
}

/// 创建书签请求体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookmarkCreate {
    pub post_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapter_id: Option<i64>,
    pub page_number: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// 更新书签请求体
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookmarkUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapter_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// 更新阅读进度请求体，未设置的字段不上送
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_percentage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reading_time_minutes: Option<i64>,
}
