//! 流帧器
//!
//! 把后端片段流转换为有序事件 `meta → delta* → final → done`，
//! 在流结束时调用后处理器生成 `final`。
//!
//! # 状态机
//!
//! ```text
//! Started ──meta──> Streaming ──EOF──> Finalizing ──final──> Done
//!                       │
//!                       ├── 接收端关闭 ──> 停止拉取，不再推送
//!                       └── 后端出错   ──> 停止，不补发 final/done
//! ```

use crate::backends::{BackendError, FragmentStream};
use crate::processor::Postprocessor;
use crate::stream::events::StreamEvent;
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// 接收端已关闭（消费者断开）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkClosed;

impl std::fmt::Display for SinkClosed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "event sink closed")
    }
}

impl std::error::Error for SinkClosed {}

/// 事件推送接口
///
/// `send` 可以等待（背压由接收端决定），返回 `SinkClosed` 表示消费者已离开。
#[async_trait]
pub trait EventSink: Send {
    async fn send(&mut self, event: StreamEvent) -> Result<(), SinkClosed>;
}

#[async_trait]
impl EventSink for mpsc::Sender<StreamEvent> {
    async fn send(&mut self, event: StreamEvent) -> Result<(), SinkClosed> {
        mpsc::Sender::send(self, event).await.map_err(|_| SinkClosed)
    }
}

/// 帧器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramerState {
    Started,
    Streaming,
    Finalizing,
    Done,
}

/// 帧器运行结果
#[derive(Debug)]
pub enum FramerOutcome {
    /// 正常结束，已推送 final 和 done
    Completed { completion: String },
    /// 消费者断开
    Cancelled,
    /// 后端在流中途出错
    BackendFailed(BackendError),
}

/// 单个请求的流帧器
#[derive(Debug)]
pub struct StreamFramer {
    request_id: String,
    prefix: String,
    suffix: String,
    stops: Vec<String>,
    postprocessor: Arc<Postprocessor>,
    state: FramerState,
    buffer: String,
}

impl StreamFramer {
    pub fn new(
        request_id: impl Into<String>,
        prefix: impl Into<String>,
        suffix: impl Into<String>,
        stops: Vec<String>,
        postprocessor: Arc<Postprocessor>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            prefix: prefix.into(),
            suffix: suffix.into(),
            stops,
            postprocessor,
            state: FramerState::Started,
            buffer: String::new(),
        }
    }

    /// 当前状态
    pub fn state(&self) -> FramerState {
        self.state
    }

    /// 已累计的原始文本
    pub fn raw(&self) -> &str {
        &self.buffer
    }

    /// 驱动整个流
    ///
    /// `meta` 在拉取第一个片段之前推送。
    pub async fn run<S>(&mut self, mut fragments: FragmentStream, sink: &mut S) -> FramerOutcome
    where
        S: EventSink + ?Sized,
    {
        let meta = StreamEvent::Meta {
            request_id: self.request_id.clone(),
        };
        if sink.send(meta).await.is_err() {
            return self.cancel();
        }
        self.state = FramerState::Streaming;

        while let Some(item) = fragments.next().await {
            match item {
                Ok(fragment) => {
                    self.buffer.push_str(&fragment);
                    if sink.send(StreamEvent::Delta { delta: fragment }).await.is_err() {
                        return self.cancel();
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        "[FRAMER] request_id={} 后端流中断: {}",
                        self.request_id,
                        e
                    );
                    self.state = FramerState::Done;
                    return FramerOutcome::BackendFailed(e);
                }
            }
        }

        self.state = FramerState::Finalizing;
        let completion =
            self.postprocessor
                .process(&self.prefix, &self.suffix, &self.buffer, &self.stops);
        tracing::debug!(
            "[FRAMER] request_id={} raw_len={} completion_len={}",
            self.request_id,
            self.buffer.len(),
            completion.len()
        );

        let final_event = StreamEvent::Final {
            completion: completion.clone(),
        };
        if sink.send(final_event).await.is_err() {
            return self.cancel();
        }
        if sink.send(StreamEvent::Done).await.is_err() {
            return self.cancel();
        }
        self.state = FramerState::Done;
        FramerOutcome::Completed { completion }
    }

    fn cancel(&mut self) -> FramerOutcome {
        tracing::info!("[FRAMER] request_id={} 客户端已断开", self.request_id);
        self.state = FramerState::Done;
        FramerOutcome::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::BackendErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[async_trait]
    impl EventSink for Vec<StreamEvent> {
        async fn send(&mut self, event: StreamEvent) -> Result<(), SinkClosed> {
            self.push(event);
            Ok(())
        }
    }

    /// 接收若干事件后关闭
    struct ClosingSink {
        accept: usize,
        received: Vec<StreamEvent>,
    }

    #[async_trait]
    impl EventSink for ClosingSink {
        async fn send(&mut self, event: StreamEvent) -> Result<(), SinkClosed> {
            if self.received.len() >= self.accept {
                return Err(SinkClosed);
            }
            self.received.push(event);
            Ok(())
        }
    }

    fn fragments(items: Vec<Result<&str, BackendError>>) -> FragmentStream {
        let owned: Vec<Result<String, BackendError>> = items
            .into_iter()
            .map(|r| r.map(|s| s.to_string()))
            .collect();
        Box::pin(futures::stream::iter(owned))
    }

    fn framer(prefix: &str, suffix: &str) -> StreamFramer {
        StreamFramer::new(
            "abcd1234",
            prefix,
            suffix,
            vec!["\n\n```".to_string()],
            Arc::new(Postprocessor::default()),
        )
    }

    #[tokio::test]
    async fn test_event_order() {
        let mut sink: Vec<StreamEvent> = Vec::new();
        let mut framer = framer("def f():\n", "");
        let outcome = framer
            .run(fragments(vec![Ok("return"), Ok(" 1")]), &mut sink)
            .await;

        assert!(matches!(outcome, FramerOutcome::Completed { .. }));
        assert_eq!(framer.state(), FramerState::Done);
        assert_eq!(
            sink,
            vec![
                StreamEvent::Meta {
                    request_id: "abcd1234".to_string()
                },
                StreamEvent::Delta {
                    delta: "return".to_string()
                },
                StreamEvent::Delta {
                    delta: " 1".to_string()
                },
                StreamEvent::Final {
                    completion: "return 1".to_string()
                },
                StreamEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_deltas_concatenate_to_raw() {
        let mut sink: Vec<StreamEvent> = Vec::new();
        let mut framer = framer("x = ", "");
        framer
            .run(
                fragments(vec![Ok("```py\n"), Ok("1"), Ok("\n```"), Ok("")]),
                &mut sink,
            )
            .await;

        let joined: String = sink
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Delta { delta } => Some(delta.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(joined, framer.raw());
        assert!(sink.contains(&StreamEvent::Final {
            completion: "1".to_string()
        }));
    }

    #[tokio::test]
    async fn test_empty_stream_still_finalizes() {
        let mut sink: Vec<StreamEvent> = Vec::new();
        let outcome = framer("", "").run(fragments(vec![]), &mut sink).await;
        match outcome {
            FramerOutcome::Completed { completion } => assert_eq!(completion, ""),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(sink.len(), 3);
        assert_eq!(sink[1].name(), "final");
    }

    #[tokio::test]
    async fn test_backend_error_stops_without_final() {
        let mut sink: Vec<StreamEvent> = Vec::new();
        let err = BackendError::new(BackendErrorKind::NetworkError, "connection reset");
        let outcome = framer("", "")
            .run(fragments(vec![Ok("a"), Err(err), Ok("b")]), &mut sink)
            .await;

        assert!(matches!(outcome, FramerOutcome::BackendFailed(_)));
        assert_eq!(sink.len(), 2);
        assert!(sink.iter().all(|e| e.name() != "final" && e.name() != "done"));
    }

    #[tokio::test]
    async fn test_cancellation_stops_pulling() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = pulled.clone();
        let source = futures::stream::iter(0..100).map(move |i| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<String, BackendError>(format!("{i}"))
        });

        let mut sink = ClosingSink {
            accept: 3,
            received: Vec::new(),
        };
        let outcome = framer("", "").run(Box::pin(source), &mut sink).await;

        assert!(matches!(outcome, FramerOutcome::Cancelled));
        // meta + 2 个 delta 被接收，第 3 个片段推送失败后停止
        assert_eq!(sink.received.len(), 3);
        assert_eq!(pulled.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_mpsc_sink_reports_closed_receiver() {
        let (mut tx, rx) = mpsc::channel::<StreamEvent>(4);
        drop(rx);
        let outcome = framer("", "").run(fragments(vec![Ok("a")]), &mut tx).await;
        assert!(matches!(outcome, FramerOutcome::Cancelled));
    }

    #[tokio::test]
    async fn test_mpsc_sink_delivers_in_order() {
        let (mut tx, mut rx) = mpsc::channel::<StreamEvent>(1);
        let handle = tokio::spawn(async move {
            let mut framer = StreamFramer::new(
                "r1",
                "",
                "",
                Vec::new(),
                Arc::new(Postprocessor::default()),
            );
            framer.run(fragments(vec![Ok("a"), Ok("b")]), &mut tx).await
        });

        let mut names = Vec::new();
        while let Some(event) = rx.recv().await {
            names.push(event.name());
        }
        assert_eq!(names, vec!["meta", "delta", "delta", "final", "done"]);
        assert!(matches!(
            handle.await.unwrap(),
            FramerOutcome::Completed { .. }
        ));
    }
}
