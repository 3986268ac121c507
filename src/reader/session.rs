//! 阅读会话状态机
//! 持有章节 / 页码 / 翻页 / 书签 / 进度状态，编排内容源与分页器；
//! 所有后端写入都是尽力而为，失败只记日志，不回滚本地导航

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::warn;

use super::cache::ChapterBodyCache;
use super::events::{ReaderEvent, ReaderSnapshot, TurnPhase};
use super::paginator::{self, page_count, paginate, word_count};
use crate::api::ContentSource;
use crate::models::{Bookmark, BookmarkCreate, Chapter, PostWithContent, ProgressUpdate,
    ReadingProgress};

/// 默认正文字体
const DEFAULT_FONT_FAMILY: &str = "'Playfair Display', 'Georgia', serif";

/// 翻页过渡时长
const TURN_DELAY: Duration = Duration::from_millis(300);

/// 页码变化后的进度提交防抖间隔
const COMMIT_DEBOUNCE: Duration = Duration::from_secs(1);

/// 阅读时长结算周期
const ACCRUAL_INTERVAL: Duration = Duration::from_secs(60);

/// 会话参数
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub font_size_px: u32,
    pub font_family: String,
    pub turn_delay: Duration,
    pub commit_debounce: Duration,
    pub accrual_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            font_size_px: paginator::BASE_FONT_SIZE_PX,
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            turn_delay: TURN_DELAY,
            commit_debounce: COMMIT_DEBOUNCE,
            accrual_interval: ACCRUAL_INTERVAL,
        }
    }
}

/// 服务端单行记录（书签 / 进度）的本地视图
/// 「还没查过」和「查过但不存在」是两个不同状态，不能混为一谈
#[derive(Debug, Clone)]
pub enum RecordState<T> {
    Unchecked,
    Missing,
    Loaded(T),
}

impl<T> RecordState<T> {
    pub fn as_loaded(&self) -> Option<&T> {
        match self {
            RecordState::Loaded(value) => Some(value),
            _ => None,
        }
    }
}

/// 会话内部状态，整体由一把锁保护
struct SessionState {
    post_id: i64,
    /// 作品的平铺正文，无章节（或章节列表拉取失败）时使用
    flat_body: String,
    /// None = 章节列表尚未加载成功
    chapters: Option<Vec<Chapter>>,
    chapter_index: Option<usize>,
    /// 当前章节正文，None = 尚未就绪
    body: Option<Arc<String>>,
    /// 正文请求代号；章节切换后迟到的响应按代号丢弃
    body_generation: u64,
    font_size_px: u32,
    font_family: String,
    pages: Vec<String>,
    /// 页内索引，从 0 开始；恒满足 current_page < pages.len()
    current_page: usize,
    turn_phase: TurnPhase,
    bookmark: RecordState<Bookmark>,
    progress: RecordState<ReadingProgress>,
    note_entry_open: bool,
    note_draft: String,
    fullscreen: bool,
    show_toc: bool,
    show_settings: bool,
    /// 章节 id -> 正文字数，推导总页数用
    word_counts: HashMap<i64, usize>,
    /// 恢复阅读位置时待落位的页码，下一次分页完成后消费
    pending_restore_page: Option<usize>,
    load_error: Option<String>,
}

impl SessionState {
    fn active_chapter(&self) -> Option<&Chapter> {
        let index = self.chapter_index?;
        self.chapters.as_ref()?.get(index)
    }

    /// 正文就绪后落页：应用待恢复页码（钳制进界内），否则回到第 0 页
    fn finish_body_load(&mut self, body: Arc<String>) {
        self.pages = paginate(&body, self.font_size_px);
        self.current_page = match self.pending_restore_page.take() {
            Some(page) => page.min(self.pages.len() - 1),
            None => 0,
        };
        self.body = Some(body);
    }

    /// 按当前字号推导全书总页数
    /// 每次上报前都重新计算，绝不缓存旧字号下的结果；
    /// 正文还没拉取过的章节按 1 页计
    fn derived_total_pages(&self) -> u32 {
        match self.chapters.as_deref() {
            Some(chapters) if !chapters.is_empty() => chapters
                .iter()
                .map(|ch| match self.word_counts.get(&ch.id) {
                    Some(wc) => page_count(*wc, self.font_size_px),
                    None => 1,
                })
                .sum(),
            _ => self.pages.len() as u32,
        }
    }
}

/// 阅读会话
/// 由单个阅读视图独占；周期任务归会话所有，close / drop 时确定性回收
pub struct ReaderSession {
    source: Arc<dyn ContentSource>,
    cache: ChapterBodyCache,
    config: SessionConfig,
    state: Arc<Mutex<SessionState>>,
    started_at: Instant,
    accrual_task: StdMutex<Option<JoinHandle<()>>>,
    commit_task: StdMutex<Option<JoinHandle<()>>>,
}

impl ReaderSession {
    pub fn new(
        source: Arc<dyn ContentSource>,
        post_id: i64,
        flat_body: impl Into<String>,
    ) -> Self {
        Self::with_config(source, post_id, flat_body, SessionConfig::default())
    }

    /// 从作品详情构造，平铺正文取作品正文
    pub fn for_post(source: Arc<dyn ContentSource>, post: &PostWithContent) -> Self {
        Self::new(source, post.post.id, post.content.body.clone())
    }

    pub fn with_config(
        source: Arc<dyn ContentSource>,
        post_id: i64,
        flat_body: impl Into<String>,
        config: SessionConfig,
    ) -> Self {
        let state = SessionState {
            post_id,
            flat_body: flat_body.into(),
            chapters: None,
            chapter_index: None,
            body: None,
            body_generation: 0,
            font_size_px: config.font_size_px,
            font_family: config.font_family.clone(),
            // 分页完成前先放一个空页，保证页码索引任何时刻都有效
            pages: vec![String::new()],
            current_page: 0,
            turn_phase: TurnPhase::Idle,
            bookmark: RecordState::Unchecked,
            progress: RecordState::Unchecked,
            note_entry_open: false,
            note_draft: String::new(),
            fullscreen: false,
            show_toc: false,
            show_settings: false,
            word_counts: HashMap::new(),
            pending_restore_page: None,
            load_error: None,
        };
        Self {
            source,
            cache: ChapterBodyCache::new(),
            config,
            state: Arc::new(Mutex::new(state)),
            started_at: Instant::now(),
            accrual_task: StdMutex::new(None),
            commit_task: StdMutex::new(None),
        }
    }

    /// 开始会话：并发拉取章节列表与书签 / 进度，统一落位后再取正文
    /// 三路请求先后到达的竞态在这里被消解：恢复逻辑总是在全部结果就绪后执行一次
    pub async fn start(&self) {
        let post_id = { self.state.lock().await.post_id };
        let (chapters, bookmark, progress) = futures::join!(
            self.source.list_chapters(post_id),
            self.source.bookmark_for_post(post_id),
            self.source.progress_for_post(post_id),
        );

        {
            let mut state = self.state.lock().await;
            match chapters {
                Ok(list) => {
                    if !list.is_empty() {
                        state.chapter_index = Some(0);
                    }
                    state.chapters = Some(list);
                }
                Err(e) => {
                    // 列表拉不下来就退回平铺正文，可见提示但不阻塞阅读
                    warn!(post_id, error = %e, "章节列表加载失败");
                    state.load_error = Some(format!("章节列表加载失败: {}", e));
                }
            }
            match bookmark {
                Ok(Some(bm)) => state.bookmark = RecordState::Loaded(bm),
                Ok(None) => state.bookmark = RecordState::Missing,
                Err(e) => warn!(post_id, error = %e, "书签加载失败"),
            }
            match progress {
                Ok(Some(p)) => state.progress = RecordState::Loaded(p),
                Ok(None) => state.progress = RecordState::Missing,
                Err(e) => warn!(post_id, error = %e, "阅读进度加载失败"),
            }
            Self::apply_restore(&mut state);
        }

        self.reload_body().await;
        self.spawn_accrual();
    }

    /// 恢复上次阅读位置
    /// 书签先落位（章节 + 页码）；进度记录更新时间不早于书签时覆盖页码，
    /// 平局算进度赢——「谁更新谁说了算」，与请求完成顺序无关
    fn apply_restore(state: &mut SessionState) {
        let mut page: Option<usize> = None;
        if let RecordState::Loaded(bm) = &state.bookmark {
            page = Some(bm.page_number.saturating_sub(1) as usize);
            if let (Some(chapter_id), Some(chapters)) = (bm.chapter_id, state.chapters.as_deref())
            {
                if let Some(index) = chapters.iter().position(|ch| ch.id == chapter_id) {
                    state.chapter_index = Some(index);
                }
            }
        }
        if let RecordState::Loaded(p) = &state.progress {
            if p.current_page > 0 {
                let progress_wins = match state.bookmark.as_loaded() {
                    Some(bm) => p.touched_at() >= bm.touched_at(),
                    None => true,
                };
                if progress_wins {
                    page = Some(p.current_page.saturating_sub(1) as usize);
                }
            }
        }
        state.pending_restore_page = page;
    }

    /// 处理视图事件；导航永远不被后台持久化阻塞
    pub async fn handle_event(&self, event: ReaderEvent) {
        match event {
            ReaderEvent::NextPage => self.next_page().await,
            ReaderEvent::PrevPage => self.prev_page().await,
            ReaderEvent::SelectChapter(index) => self.select_chapter(index).await,
            ReaderEvent::SetFontSize(px) => self.set_font_size(px).await,
            ReaderEvent::SetFontFamily(family) => {
                self.state.lock().await.font_family = family;
            }
            ReaderEvent::ToggleBookmark => self.toggle_bookmark().await,
            ReaderEvent::SetBookmarkNote(text) => {
                self.state.lock().await.note_draft = text;
            }
            ReaderEvent::SaveBookmark => self.save_bookmark().await,
            ReaderEvent::CancelBookmarkNote => {
                let mut state = self.state.lock().await;
                state.note_entry_open = false;
                state.note_draft.clear();
            }
            ReaderEvent::ToggleFullscreen => {
                let mut state = self.state.lock().await;
                state.fullscreen = !state.fullscreen;
            }
            ReaderEvent::ToggleToc => {
                let mut state = self.state.lock().await;
                state.show_toc = !state.show_toc;
            }
            ReaderEvent::ToggleSettings => {
                let mut state = self.state.lock().await;
                state.show_settings = !state.show_settings;
            }
            ReaderEvent::CloseOverlays => {
                let mut state = self.state.lock().await;
                state.fullscreen = false;
                state.show_toc = false;
                state.show_settings = false;
            }
        }
    }

    /// 当前状态快照，供视图渲染；随时可取，部分加载也不会出错
    pub async fn snapshot(&self) -> ReaderSnapshot {
        let state = self.state.lock().await;
        ReaderSnapshot {
            chapters_loaded: state.chapters.is_some(),
            chapter_titles: state
                .chapters
                .as_deref()
                .map(|chapters| chapters.iter().map(|ch| ch.title.clone()).collect())
                .unwrap_or_default(),
            chapter_index: state.chapter_index,
            chapter_title: state.active_chapter().map(|ch| ch.title.clone()),
            body_loaded: state.body.is_some(),
            page_text: state
                .pages
                .get(state.current_page)
                .cloned()
                .unwrap_or_default(),
            page_number: state.current_page as u32 + 1,
            page_total: state.pages.len() as u32,
            total_pages: state.derived_total_pages(),
            turn_phase: state.turn_phase,
            bookmarked: state.bookmark.as_loaded().is_some(),
            note_entry_open: state.note_entry_open,
            note_draft: state.note_draft.clone(),
            progress_percentage: state.progress.as_loaded().map(|p| p.progress_percentage),
            reading_time_minutes: state.progress.as_loaded().map(|p| p.reading_time_minutes),
            font_size_px: state.font_size_px,
            font_family: state.font_family.clone(),
            fullscreen: state.fullscreen,
            show_toc: state.show_toc,
            show_settings: state.show_settings,
            load_error: state.load_error.clone(),
        }
    }

    /// 结束会话，回收周期任务与未触发的防抖任务
    pub fn close(&self) {
        for slot in [&self.accrual_task, &self.commit_task] {
            if let Ok(mut guard) = slot.lock() {
                if let Some(task) = guard.take() {
                    task.abort();
                }
            }
        }
    }

    // ====================== 翻页与章节切换 ======================

    async fn next_page(&self) {
        enum Step {
            Turn,
            Chapter(usize),
            Stay,
        }
        let step = {
            let mut state = self.state.lock().await;
            if state.turn_phase != TurnPhase::Idle {
                Step::Stay
            } else if state.current_page + 1 < state.pages.len() {
                state.turn_phase = TurnPhase::Turning;
                Step::Turn
            } else {
                // 本章最后一页：有下一章就整章前进，否则原地不动
                match (state.chapter_index, state.chapters.as_deref()) {
                    (Some(index), Some(chapters)) if index + 1 < chapters.len() => {
                        Step::Chapter(index + 1)
                    }
                    _ => Step::Stay,
                }
            }
        };
        match step {
            Step::Turn => {
                tokio::time::sleep(self.config.turn_delay).await;
                {
                    let mut state = self.state.lock().await;
                    let last = state.pages.len() - 1;
                    state.current_page = (state.current_page + 1).min(last);
                    state.turn_phase = TurnPhase::Idle;
                }
                self.arm_commit();
            }
            Step::Chapter(index) => self.jump_to_chapter(index).await,
            Step::Stay => {}
        }
    }

    async fn prev_page(&self) {
        enum Step {
            Turn,
            Chapter(usize),
            Stay,
        }
        let step = {
            let mut state = self.state.lock().await;
            if state.turn_phase != TurnPhase::Idle {
                Step::Stay
            } else if state.current_page > 0 {
                state.turn_phase = TurnPhase::Turning;
                Step::Turn
            } else {
                // 回退跨章后落在上一章第 0 页
                match state.chapter_index {
                    Some(index) if index > 0 => Step::Chapter(index - 1),
                    _ => Step::Stay,
                }
            }
        };
        match step {
            Step::Turn => {
                tokio::time::sleep(self.config.turn_delay).await;
                {
                    let mut state = self.state.lock().await;
                    state.current_page = state.current_page.saturating_sub(1);
                    state.turn_phase = TurnPhase::Idle;
                }
                self.arm_commit();
            }
            Step::Chapter(index) => self.jump_to_chapter(index).await,
            Step::Stay => {}
        }
    }

    async fn select_chapter(&self, index: usize) {
        {
            let mut state = self.state.lock().await;
            state.show_toc = false;
        }
        self.jump_to_chapter(index).await;
    }

    async fn jump_to_chapter(&self, index: usize) {
        {
            let mut state = self.state.lock().await;
            let Some(chapters) = state.chapters.as_deref() else {
                return;
            };
            if index >= chapters.len() {
                return;
            }
            state.chapter_index = Some(index);
            state.pending_restore_page = None;
        }
        self.reload_body().await;
        self.arm_commit();
    }

    /// 字号变化：当前正文立即按新字号重排，页码钳制进新的页数范围
    async fn set_font_size(&self, px: u32) {
        {
            let mut state = self.state.lock().await;
            if px == 0 || state.font_size_px == px {
                return;
            }
            state.font_size_px = px;
            if let Some(body) = state.body.clone() {
                state.pages = paginate(&body, px);
                let last = state.pages.len() - 1;
                state.current_page = state.current_page.min(last);
            }
        }
        self.arm_commit();
    }

    // ====================== 正文加载 ======================

    /// 解析当前章节并加载正文、重新分页
    /// 每次调用递增代号；加载期间章节再次切换时，旧响应到达后直接丢弃
    async fn reload_body(&self) {
        let (generation, target) = {
            let mut state = self.state.lock().await;
            state.body_generation += 1;
            let target = state.active_chapter().map(|ch| ch.id);
            if target.is_some() {
                state.body = None;
            }
            (state.body_generation, target)
        };

        let Some(chapter_id) = target else {
            // 平铺正文模式：正文就在本地，直接分页
            let mut state = self.state.lock().await;
            if state.body_generation == generation {
                let body = Arc::new(state.flat_body.clone());
                state.finish_body_load(body);
            }
            return;
        };

        // 缓存优先，回翻章节不再请求后端
        if let Some(body) = self.cache.get(chapter_id).await {
            let mut state = self.state.lock().await;
            if state.body_generation == generation {
                state.word_counts.insert(chapter_id, word_count(&body));
                state.finish_body_load(body);
                state.load_error = None;
            }
            return;
        }

        match self.source.chapter_with_body(chapter_id).await {
            Ok(chapter) => {
                let text = chapter.content.map(|c| c.body).unwrap_or_default();
                let body = self.cache.put(chapter_id, text).await;
                let mut state = self.state.lock().await;
                if state.body_generation != generation {
                    return; // 章节已切换，丢弃迟到的正文
                }
                state.word_counts.insert(chapter_id, word_count(&body));
                state.finish_body_load(body);
                state.load_error = None;
            }
            Err(e) => {
                warn!(chapter_id, error = %e, "章节正文加载失败");
                let mut state = self.state.lock().await;
                if state.body_generation == generation {
                    state.load_error = Some(format!("章节正文加载失败: {}", e));
                }
            }
        }
    }

    // ====================== 书签 ======================

    /// 书签开关：已有书签则删除；没有则进入备注录入，保存时才真正创建
    async fn toggle_bookmark(&self) {
        let existing = {
            let mut state = self.state.lock().await;
            let id = state.bookmark.as_loaded().map(|bm| bm.id);
            if id.is_none() {
                state.note_entry_open = true;
            }
            id
        };
        let Some(bookmark_id) = existing else {
            return;
        };
        match self.source.delete_bookmark(bookmark_id).await {
            Ok(()) => {
                self.state.lock().await.bookmark = RecordState::Missing;
            }
            Err(e) => warn!(bookmark_id, error = %e, "书签删除失败"),
        }
    }

    /// 从备注录入确认创建书签，携带当前章节与 1 起页码
    async fn save_bookmark(&self) {
        let req = {
            let state = self.state.lock().await;
            if state.bookmark.as_loaded().is_some() {
                // 备注录入与已存在的书签互斥，到这里说明状态已经过期
                return;
            }
            BookmarkCreate {
                post_id: state.post_id,
                chapter_id: state.active_chapter().map(|ch| ch.id),
                page_number: state.current_page as u32 + 1,
                note: if state.note_draft.trim().is_empty() {
                    None
                } else {
                    Some(state.note_draft.clone())
                },
            }
        };
        match self.source.create_bookmark(req).await {
            Ok(bookmark) => {
                let mut state = self.state.lock().await;
                state.bookmark = RecordState::Loaded(bookmark);
                state.note_entry_open = false;
                state.note_draft.clear();
            }
            Err(e) => warn!(error = %e, "书签保存失败"),
        }
    }

    // ====================== 进度同步 ======================

    /// 页码（或字号）变化后按防抖间隔提交一次进度；期间再次变化会重置计时
    fn arm_commit(&self) {
        let state = Arc::clone(&self.state);
        let source = Arc::clone(&self.source);
        let delay = self.config.commit_debounce;
        let Ok(mut slot) = self.commit_task.lock() else {
            return;
        };
        if let Some(task) = slot.take() {
            task.abort();
        }
        *slot = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            push_page_commit(&state, source.as_ref()).await;
        }));
    }

    /// 启动阅读时长结算任务：每个周期把会话累计分钟数上报一次
    fn spawn_accrual(&self) {
        let state = Arc::clone(&self.state);
        let source = Arc::clone(&self.source);
        let period = self.config.accrual_interval;
        let started_at = self.started_at;
        let Ok(mut slot) = self.accrual_task.lock() else {
            return;
        };
        if let Some(task) = slot.take() {
            task.abort();
        }
        *slot = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(started_at + period, period);
            loop {
                ticker.tick().await;
                let payload = {
                    let s = state.lock().await;
                    if s.progress.as_loaded().is_none() {
                        // 进度记录不存在时不结算
                        None
                    } else {
                        let minutes = started_at.elapsed().as_secs() / 60;
                        if minutes == 0 {
                            None
                        } else {
                            let total = s.derived_total_pages().max(1);
                            Some((
                                s.post_id,
                                ProgressUpdate {
                                    current_page: Some(s.current_page as u32 + 1),
                                    total_pages: Some(total),
                                    progress_percentage: None,
                                    reading_time_minutes: Some(minutes as i64),
                                },
                            ))
                        }
                    }
                };
                let Some((post_id, req)) = payload else {
                    continue;
                };
                match source.update_progress(post_id, req).await {
                    Ok(progress) => {
                        state.lock().await.progress = RecordState::Loaded(progress);
                    }
                    Err(e) => warn!(post_id, error = %e, "阅读时长上报失败"),
                }
            }
        }));
    }
}

impl Drop for ReaderSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// 推导总页数并上报当前页；进度记录不存在或请求失败时静默跳过
async fn push_page_commit(state: &Arc<Mutex<SessionState>>, source: &dyn ContentSource) {
    let payload = {
        let s = state.lock().await;
        if s.progress.as_loaded().is_none() {
            None
        } else {
            let total = s.derived_total_pages().max(1);
            let current = s.current_page as u32 + 1;
            Some((
                s.post_id,
                ProgressUpdate {
                    current_page: Some(current),
                    total_pages: Some(total),
                    progress_percentage: Some(current as f64 / total as f64 * 100.0),
                    reading_time_minutes: None,
                },
            ))
        }
    };
    let Some((post_id, req)) = payload else {
        return;
    };
    match source.update_progress(post_id, req).await {
        Ok(progress) => {
            state.lock().await.progress = RecordState::Loaded(progress);
        }
        Err(e) => warn!(post_id, error = %e, "阅读进度上报失败"),
    }
}
