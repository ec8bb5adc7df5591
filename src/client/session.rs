//! 流式会话管理器
//!
//! 同一时刻最多一个活跃会话：
//!
//! - `send` 在同一把锁内取消旧会话并建立新会话
//! - 会话任务写入状态前在锁内核对会话编号，过期会话的结果直接丢弃
//! - 每个 chunk 边界和每个解码项之后都检查取消
//!
//! 状态通过 `tokio::sync::watch` 发布，订阅者只能读取快照。

use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::client::framing::FramedItem;
use crate::client::languages;
use crate::client::state::{SessionPhase, SessionSnapshot, TranslationRequest};
use crate::client::transport::TranslationTransport;
use crate::config::{ClientConfig, TransformationMode};
use crate::models::{Token, STREAM_END_MARKER, STREAM_ERROR_MARKER};

/// 翻译模式下字面量 Token 的 kind
pub const TRANSLATE_KIND: &str = "translate";

/// 一行负载的解释结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadOutcome {
    End,
    Error,
    Token(Token),
}

/// 按模式解释一行负载
///
/// 标记优先。respell 模式下无法解码的行视为错误。
pub fn interpret_payload(payload: &str, mode: TransformationMode) -> PayloadOutcome {
    if payload == STREAM_END_MARKER {
        return PayloadOutcome::End;
    }
    if payload == STREAM_ERROR_MARKER {
        return PayloadOutcome::Error;
    }

    match mode {
        TransformationMode::Translate => {
            PayloadOutcome::Token(Token::literal(TRANSLATE_KIND, payload))
        }
        TransformationMode::Respell => match Token::from_wire_line(payload) {
            Ok(token) => PayloadOutcome::Token(token),
            Err(e) => {
                tracing::warn!("[SESSION] Token 解码失败: {}", e);
                PayloadOutcome::Error
            }
        },
    }
}

/// 活跃会话
struct ActiveSession {
    id: u64,
    cancel: CancellationToken,
}

/// 锁内状态
struct SessionInner {
    next_id: u64,
    active: Option<ActiveSession>,
    snapshot: SessionSnapshot,
}

/// 会话任务对状态的一次更新
enum SessionUpdate {
    Append(Token),
    Completed,
    Failed,
}

/// 管理器与会话任务共享的部分
struct Shared {
    inner: Mutex<SessionInner>,
    state_tx: watch::Sender<SessionSnapshot>,
}

impl Shared {
    fn publish(&self, inner: &SessionInner) {
        self.state_tx.send_replace(inner.snapshot.clone());
    }

    /// 应用会话任务的更新
    ///
    /// 返回 false 表示该会话已不是活跃会话，任务应当退出。
    fn apply(&self, session_id: u64, update: SessionUpdate) -> bool {
        let mut inner = self.inner.lock();
        let is_live = inner
            .active
            .as_ref()
            .is_some_and(|active| active.id == session_id && !active.cancel.is_cancelled());
        if !is_live {
            return false;
        }

        let keep_running = match update {
            SessionUpdate::Append(token) => {
                inner.snapshot.tokens.push(token);
                if inner.snapshot.phase == SessionPhase::Sending {
                    inner.snapshot.phase = SessionPhase::Streaming;
                }
                true
            }
            SessionUpdate::Completed => {
                tracing::info!(
                    session_id,
                    tokens = inner.snapshot.tokens.len(),
                    "[SESSION] 会话完成"
                );
                inner.active = None;
                inner.snapshot.phase = SessionPhase::Idle;
                inner.snapshot.session_id = None;
                false
            }
            SessionUpdate::Failed => {
                tracing::warn!(
                    session_id,
                    tokens = inner.snapshot.tokens.len(),
                    "[SESSION] 会话以错误结束"
                );
                inner.active = None;
                inner.snapshot.phase = SessionPhase::Idle;
                inner.snapshot.session_id = None;
                inner.snapshot.has_error = true;
                false
            }
        };

        self.publish(&inner);
        keep_running
    }
}

/// 流式会话管理器
///
/// `send` / `repeat` 需要在 tokio 运行时中调用。
pub struct StreamSessionManager {
    shared: Arc<Shared>,
    transport: Arc<dyn TranslationTransport>,
}

impl StreamSessionManager {
    /// 创建管理器，语言和模式取自客户端配置
    pub fn new(transport: Arc<dyn TranslationTransport>, config: &ClientConfig) -> Self {
        let snapshot = SessionSnapshot {
            source_language: config.source_language.clone(),
            target_language: config.target_language.clone(),
            mode: config.mode,
            ..SessionSnapshot::default()
        };
        let (state_tx, _) = watch::channel(snapshot.clone());

        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(SessionInner {
                    next_id: 1,
                    active: None,
                    snapshot,
                }),
                state_tx,
            }),
            transport,
        }
    }

    /// 订阅状态变化
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.state_tx.subscribe()
    }

    /// 当前状态快照
    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.inner.lock().snapshot.clone()
    }

    /// 以当前语言选择发送一次翻译，返回会话编号
    pub fn send(&self, input: impl Into<String>) -> u64 {
        let mut inner = self.shared.inner.lock();
        let request = TranslationRequest::new(
            inner.snapshot.source_language.clone(),
            inner.snapshot.target_language.clone(),
            input,
        );
        self.start_locked(&mut inner, request)
    }

    /// 重发上一次请求（使用当时的语言），没有上一次请求时返回 None
    pub fn repeat(&self) -> Option<u64> {
        let mut inner = self.shared.inner.lock();
        let request = inner.snapshot.last_translation.clone()?;
        Some(self.start_locked(&mut inner, request))
    }

    /// 停止当前会话，不视为错误
    pub fn stop(&self) {
        let mut inner = self.shared.inner.lock();
        if let Some(active) = inner.active.take() {
            tracing::info!(session_id = active.id, "[SESSION] 停止会话");
            active.cancel.cancel();
        }
        inner.snapshot.phase = SessionPhase::Idle;
        inner.snapshot.session_id = None;
        inner.snapshot.has_error = false;
        self.shared.publish(&inner);
    }

    /// 取消会话并清空 Token、错误和上一次请求
    pub fn reset(&self) {
        let mut inner = self.shared.inner.lock();
        if let Some(active) = inner.active.take() {
            active.cancel.cancel();
        }
        inner.snapshot.phase = SessionPhase::Idle;
        inner.snapshot.session_id = None;
        inner.snapshot.tokens.clear();
        inner.snapshot.has_error = false;
        inner.snapshot.last_translation = None;
        self.shared.publish(&inner);
    }

    /// 设置语言对
    pub fn set_languages(&self, source: impl Into<String>, target: impl Into<String>) {
        let mut inner = self.shared.inner.lock();
        inner.snapshot.source_language = source.into();
        inner.snapshot.target_language = target.into();
        self.shared.publish(&inner);
    }

    /// 按目录下标设置语言对
    pub fn select_languages(&self, source_index: usize, target_index: usize) {
        self.set_languages(
            languages::source_language(source_index),
            languages::target_language(target_index),
        );
    }

    /// 设置转换模式（下一次发送生效）
    pub fn set_mode(&self, mode: TransformationMode) {
        let mut inner = self.shared.inner.lock();
        inner.snapshot.mode = mode;
        self.shared.publish(&inner);
    }

    /// 标记是否正在查看结果页
    pub fn set_viewing_result(&self, viewing: bool) {
        let mut inner = self.shared.inner.lock();
        inner.snapshot.viewing_result = viewing;
        self.shared.publish(&inner);
    }

    /// 等待回到 Idle，返回此时的快照
    pub async fn wait_idle(&self) -> SessionSnapshot {
        let mut rx = self.subscribe();
        let result = rx
            .wait_for(|snapshot| snapshot.phase == SessionPhase::Idle)
            .await
            .map(|snapshot| snapshot.clone());
        match result {
            Ok(snapshot) => snapshot,
            Err(_) => self.snapshot(),
        }
    }

    /// 在锁内替换活跃会话并启动任务
    fn start_locked(&self, inner: &mut SessionInner, request: TranslationRequest) -> u64 {
        if let Some(previous) = inner.active.take() {
            tracing::info!(session_id = previous.id, "[SESSION] 新请求取代旧会话");
            previous.cancel.cancel();
        }

        let id = inner.next_id;
        inner.next_id += 1;
        let cancel = CancellationToken::new();
        let mode = inner.snapshot.mode;

        inner.active = Some(ActiveSession {
            id,
            cancel: cancel.clone(),
        });
        inner.snapshot.tokens.clear();
        inner.snapshot.has_error = false;
        inner.snapshot.last_translation = Some(request.clone());
        inner.snapshot.phase = SessionPhase::Sending;
        inner.snapshot.session_id = Some(id);
        self.shared.publish(inner);

        tracing::info!(
            session_id = id,
            source = %request.source_language,
            target = %request.target_language,
            mode = ?mode,
            "[SESSION] 开始会话"
        );

        tokio::spawn(run_session(
            self.shared.clone(),
            self.transport.clone(),
            id,
            request,
            mode,
            cancel,
        ));

        id
    }
}

impl Drop for StreamSessionManager {
    fn drop(&mut self) {
        if let Some(active) = self.shared.inner.lock().active.take() {
            active.cancel.cancel();
        }
    }
}

/// 会话任务
async fn run_session(
    shared: Arc<Shared>,
    transport: Arc<dyn TranslationTransport>,
    session_id: u64,
    request: TranslationRequest,
    mode: TransformationMode,
    cancel: CancellationToken,
) {
    let opened = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        result = transport.open(&request, mode) => result,
    };

    let mut stream = match opened {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(session_id, "[SESSION] 打开翻译流失败: {}", e);
            shared.apply(session_id, SessionUpdate::Failed);
            return;
        }
    };

    loop {
        let item = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            item = stream.next() => item,
        };

        if cancel.is_cancelled() {
            return;
        }

        let update = match item {
            // 没有结束标记的正常结束按成功处理
            None => SessionUpdate::Completed,
            Some(Err(e)) => {
                tracing::warn!(session_id, "[SESSION] 流读取失败: {}", e);
                SessionUpdate::Failed
            }
            Some(Ok(FramedItem::Done)) => SessionUpdate::Completed,
            Some(Ok(FramedItem::Error)) => SessionUpdate::Failed,
            Some(Ok(FramedItem::Payload(payload))) => match interpret_payload(&payload, mode) {
                PayloadOutcome::End => SessionUpdate::Completed,
                PayloadOutcome::Error => SessionUpdate::Failed,
                PayloadOutcome::Token(token) => SessionUpdate::Append(token),
            },
        };

        if !shared.apply(session_id, update) {
            return;
        }
    }
}

// ============================================================================
// 测试模块
// ============================================================================
