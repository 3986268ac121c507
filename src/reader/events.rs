//! 阅读视图事件约定
//! 视图只消费 ReaderSnapshot、只产生 ReaderEvent，算法细节全部留在会话内

use serde::{Deserialize, Serialize};

/// 视图发往会话的用户意图
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReaderEvent {
    NextPage,
    PrevPage,
    /// 跳转到指定章节（列表下标）
    SelectChapter(usize),
    /// 调整字号（像素），会触发重新分页
    SetFontSize(u32),
    SetFontFamily(String),
    /// 有书签则删除；无书签则进入备注录入
    ToggleBookmark,
    SetBookmarkNote(String),
    /// 从备注录入确认创建书签
    SaveBookmark,
    CancelBookmarkNote,
    ToggleFullscreen,
    ToggleToc,
    ToggleSettings,
    /// Esc：关闭全屏 / 目录 / 设置
    CloseOverlays,
}

/// 键盘按键（视图层转译自平台事件）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowRight,
    ArrowLeft,
    Escape,
    Char(char),
}

/// 修饰键状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub ctrl: bool,
    pub meta: bool,
}

/// 键盘映射：右方向键翻下页，左方向键翻上页，Esc 关闭浮层，ctrl/cmd+F 切全屏
pub fn map_key(key: Key, modifiers: Modifiers) -> Option<ReaderEvent> {
    match key {
        Key::ArrowRight => Some(ReaderEvent::NextPage),
        Key::ArrowLeft => Some(ReaderEvent::PrevPage),
        Key::Escape => Some(ReaderEvent::CloseOverlays),
        Key::Char('f') | Key::Char('F') if modifiers.ctrl || modifiers.meta => {
            Some(ReaderEvent::ToggleFullscreen)
        }
        Key::Char(_) => None,
    }
}

/// 翻页过渡阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnPhase {
    Idle,
    Turning,
}

/// 会话状态快照，视图按此渲染
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderSnapshot {
    /// 章节列表是否已经拉取成功
    pub chapters_loaded: bool,
    pub chapter_titles: Vec<String>,
    pub chapter_index: Option<usize>,
    /// 当前章节标题；平铺正文模式为空
    pub chapter_title: Option<String>,
    /// 当前章节正文是否已就绪
    pub body_loaded: bool,
    /// 当前页文本
    pub page_text: String,
    /// 页码从 1 开始
    pub page_number: u32,
    /// 当前章节（或平铺正文）的页数
    pub page_total: u32,
    /// 按当前字号推导的全书总页数
    pub total_pages: u32,
    pub turn_phase: TurnPhase,
    pub bookmarked: bool,
    pub note_entry_open: bool,
    pub note_draft: String,
    /// 最近一次进度记录的完成百分比
    pub progress_percentage: Option<f64>,
    /// 最近一次进度记录的累计阅读分钟数
    pub reading_time_minutes: Option<i64>,
    pub font_size_px: u32,
    pub font_family: String,
    pub fullscreen: bool,
    pub show_toc: bool,
    pub show_settings: bool,
    /// 章节列表或正文加载失败时的可见提示；不阻塞已有页面
    pub load_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arrow_keys_turn_pages() {
        assert_eq!(
            map_key(Key::ArrowRight, Modifiers::default()),
            Some(ReaderEvent::NextPage)
        );
        assert_eq!(
            map_key(Key::ArrowLeft, Modifiers::default()),
            Some(ReaderEvent::PrevPage)
        );
    }

    #[test]
    fn test_escape_closes_overlays() {
        assert_eq!(
            map_key(Key::Escape, Modifiers::default()),
            Some(ReaderEvent::CloseOverlays)
        );
    }

    #[test]
    fn test_fullscreen_needs_modifier() {
        assert_eq!(map_key(Key::Char('f'), Modifiers::default()), None);
        let ctrl = Modifiers {
            ctrl: true,
            meta: false,
        };
        let meta = Modifiers {
            ctrl: false,
            meta: true,
        };
        assert_eq!(
            map_key(Key::Char('f'), ctrl),
            Some(ReaderEvent::ToggleFullscreen)
        );
        assert_eq!(
            map_key(Key::Char('F'), meta),
            Some(ReaderEvent::ToggleFullscreen)
        );
    }
}
