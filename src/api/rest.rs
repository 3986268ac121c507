//! REST 内容源
//! 对接 /api/v1 后端，只做请求 / 响应转换，不含业务逻辑

use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{ApiError, ApiResult, BoxFuture, ContentSource};
use crate::models::{
    Bookmark, BookmarkCreate, BookmarkUpdate, Chapter, ProgressUpdate, ReadingProgress,
    ReadingStats,
};

/// 请求超时时间
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// REST 内容源
pub struct RestContentSource {
    client: reqwest::Client,
    base_url: String,
    /// 可选的 Bearer 令牌；会话管理本身在适配器之外
    token: Option<String>,
}

impl RestContentSource {
    /// 创建内容源，base_url 形如 http://localhost:8000
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// 附加 Bearer 令牌
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/api/v1/{}", self.base_url, path);
        let mut builder = self.client.request(method, url);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    /// 发送请求并统一转换错误；超时单独归类，便于上层提示
    async fn send(builder: RequestBuilder) -> ApiResult<Response> {
        builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout
            } else {
                ApiError::Http(e)
            }
        })
    }

    async fn decode<T: DeserializeOwned>(resp: Response) -> ApiResult<T> {
        let status = resp.status();
        if status.is_success() {
            resp.json::<T>()
                .await
                .map_err(|e| ApiError::Decode(e.to_string()))
        } else if status == StatusCode::NOT_FOUND {
            Err(ApiError::NotFound)
        } else {
            Err(ApiError::Status(status.as_u16()))
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let resp = Self::send(self.request(Method::GET, path)).await?;
        Self::decode(resp).await
    }

    /// GET 查询，404 转换为 None
    async fn get_json_opt<T: DeserializeOwned>(&self, path: &str) -> ApiResult<Option<T>> {
        match self.get_json::<T>(path).await {
            Ok(value) => Ok(Some(value)),
            Err(ApiError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn send_json<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        let resp = Self::send(self.request(method, path).json(body)).await?;
        Self::decode(resp).await
    }
}

impl ContentSource for RestContentSource {
    fn list_chapters(&self, post_id: i64) -> BoxFuture<'_, ApiResult<Vec<Chapter>>> {
        Box::pin(async move {
            let mut chapters: Vec<Chapter> =
                self.get_json(&format!("chapters/post/{}", post_id)).await?;
            // 后端按 order 返回，这里再排一次以防万一
            chapters.sort_by_key(|ch| ch.order);
            Ok(chapters)
        })
    }

    fn chapter_with_body(&self, chapter_id: i64) -> BoxFuture<'_, ApiResult<Chapter>> {
        Box::pin(async move { self.get_json(&format!("chapters/{}", chapter_id)).await })
    }

    fn bookmark_for_post(&self, post_id: i64) -> BoxFuture<'_, ApiResult<Option<Bookmark>>> {
        Box::pin(async move { self.get_json_opt(&format!("bookmarks/post/{}", post_id)).await })
    }

    fn my_bookmarks(&self) -> BoxFuture<'_, ApiResult<Vec<Bookmark>>> {
        Box::pin(async move { self.get_json("bookmarks/me").await })
    }

    fn create_bookmark(&self, req: BookmarkCreate) -> BoxFuture<'_, ApiResult<Bookmark>> {
        Box::pin(async move { self.send_json(Method::POST, "bookmarks", &req).await })
    }

    fn update_bookmark(
        &self,
        bookmark_id: i64,
        req: BookmarkUpdate,
    ) -> BoxFuture<'_, ApiResult<Bookmark>> {
        Box::pin(async move {
            self.send_json(Method::PUT, &format!("bookmarks/{}", bookmark_id), &req)
                .await
        })
    }

    fn delete_bookmark(&self, bookmark_id: i64) -> BoxFuture<'_, ApiResult<()>> {
        Box::pin(async move {
            let resp = Self::send(
                self.request(Method::DELETE, &format!("bookmarks/{}", bookmark_id)),
            )
            .await?;
            let status = resp.status();
            if status.is_success() {
                Ok(())
            } else if status == StatusCode::NOT_FOUND {
                Err(ApiError::NotFound)
            } else {
                Err(ApiError::Status(status.as_u16()))
            }
        })
    }

    fn progress_for_post(
        &self,
        post_id: i64,
    ) -> BoxFuture<'_, ApiResult<Option<ReadingProgress>>> {
        Box::pin(async move {
            self.get_json_opt(&format!("reading-progress/post/{}", post_id))
                .await
        })
    }

    fn update_progress(
        &self,
        post_id: i64,
        req: ProgressUpdate,
    ) -> BoxFuture<'_, ApiResult<ReadingProgress>> {
        Box::pin(async move {
            self.send_json(
                Method::PUT,
                &format!("reading-progress/post/{}", post_id),
                &req,
            )
            .await
        })
    }

    fn reading_stats(&self) -> BoxFuture<'_, ApiResult<ReadingStats>> {
        Box::pin(async move { self.get_json("reading-progress/stats").await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash() {
        let source = RestContentSource::new("http://localhost:8000/");
        assert_eq!(source.base_url, "http://localhost:8000");
    }
}
