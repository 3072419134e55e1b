use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{Message, ProviderKind, Role};

/** \brief 清空会话后的提示。 */
pub const CLEARED_NOTICE: &str = "Chat history cleared!";

/**
 * \brief 按时间顺序的消息日志，只能追加或整体清空。
 */
#[derive(Debug, Clone, Default)]
pub struct ConversationLog {
    messages: Vec<Message>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /**
     * \brief 惰性遍历，可 clone 后重新开始，不产生副作用。
     */
    pub fn transcript(&self) -> Transcript<'_> {
        Transcript {
            inner: self.messages.iter(),
        }
    }
}

/**
 * \brief 渲染用的一条记录。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TranscriptEntry<'a> {
    pub role: Role,
    pub label: &'static str,
    pub text: &'a str,
}

#[derive(Debug, Clone)]
pub struct Transcript<'a> {
    inner: std::slice::Iter<'a, Message>,
}

impl<'a> Iterator for Transcript<'a> {
    type Item = TranscriptEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|msg| TranscriptEntry {
            role: msg.role(),
            label: msg.label(),
            text: msg.text(),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Transcript<'_> {}

/**
 * \brief 单个用户会话：独占自己的日志与当前选中的 Provider。
 */
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    created_at: OffsetDateTime,
    provider: ProviderKind,
    log: ConversationLog,
}

impl Session {
    pub fn new(provider: ProviderKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: OffsetDateTime::now_utc(),
            provider,
            log: ConversationLog::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    pub(crate) fn log_mut(&mut self) -> &mut ConversationLog {
        &mut self.log
    }

    /**
     * \brief 切换 Provider，已有消息保持不变。
     */
    pub fn select_provider(&mut self, provider: ProviderKind) {
        if self.provider != provider {
            tracing::info!(
                session = %self.id,
                from = self.provider.slug(),
                to = provider.slug(),
                "provider selected"
            );
        }
        self.provider = provider;
    }

    /**
     * \brief 清空日志并返回提示文本，可重复调用。
     */
    pub fn clear(&mut self) -> &'static str {
        let dropped = self.log.len();
        self.log.clear();
        tracing::info!(session = %self.id, dropped, "conversation cleared");
        CLEARED_NOTICE
    }

    pub fn transcript(&self) -> Transcript<'_> {
        self.log.transcript()
    }
}

pub type SharedSession = Arc<Mutex<Session>>;

#[derive(Debug)]
struct StoreEntry {
    session: SharedSession,
    last_used: Instant,
}

/**
 * \brief 服务端会话表。每个会话单独加锁，一个会话的慢请求不会阻塞其他会话。
 *
 * 浏览器关闭时页面会主动删除会话；未能删除的由 sweep_idle 按空闲时长回收。
 */
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<Uuid, StoreEntry>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: Session) -> (Uuid, SharedSession) {
        let id = session.id();
        let shared = Arc::new(Mutex::new(session));
        self.sessions.insert(
            id,
            StoreEntry {
                session: shared.clone(),
                last_used: Instant::now(),
            },
        );
        (id, shared)
    }

    /** \brief 取出会话并刷新最近使用时间。 */
    pub fn get(&self, id: &Uuid) -> Option<SharedSession> {
        self.sessions.get_mut(id).map(|mut entry| {
            entry.last_used = Instant::now();
            entry.session.clone()
        })
    }

    /** \brief 会话结束，日志随之销毁。 */
    pub fn remove(&self, id: &Uuid) -> bool {
        self.sessions.remove(id).is_some()
    }

    /**
     * \brief 回收空闲超过 ttl 的会话，返回回收数量。正在处理请求的会话不回收。
     */
    pub fn sweep_idle(&self, ttl: Duration) -> usize {
        self.sweep_idle_at(Instant::now(), ttl)
    }

    fn sweep_idle_at(&self, now: Instant, ttl: Duration) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, entry| {
            let in_use = Arc::strong_count(&entry.session) > 1;
            in_use || now.saturating_duration_since(entry.last_used) < ttl
        });
        let swept = before.saturating_sub(self.sessions.len());
        if swept > 0 {
            tracing::info!(swept, remaining = self.sessions.len(), "idle sessions swept");
        }
        swept
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
