//! Per-session message handling.
//!
//! A [`SessionWorker`] belongs to exactly one connection's message loop. It
//! answers each inbound message in turn and is the single writer of the
//! session's published [`SessionSnapshot`].

use std::sync::Arc;

use axum::extract::ws::Message;
use serde_json::Value;
use tokio::sync::{mpsc, watch};

use atelier_core::garment::GarmentConfig;
use atelier_pipeline::{FramePayload, FrameProcessingPipeline, FrameResult, PipelineStage};

use super::manager::{SessionSender, SessionSnapshot, SessionState, SessionTicket};
use super::protocol::{parse_client_message, ClientMessage, FrameMessage, ProtocolError, ServerMessage};

pub struct SessionWorker {
    session_id: String,
    pipeline: Arc<FrameProcessingPipeline>,
    sender: SessionSender,
    snapshot: watch::Sender<SessionSnapshot>,
}

impl SessionWorker {
    /// Take ownership of an opened session. Returns the worker and the
    /// receiver the connection's sink should drain.
    pub fn from_ticket(
        ticket: SessionTicket,
        pipeline: Arc<FrameProcessingPipeline>,
    ) -> (Self, mpsc::UnboundedReceiver<Message>) {
        let SessionTicket {
            session_id,
            receiver,
            sender,
            snapshot,
        } = ticket;
        let worker = Self {
            session_id,
            pipeline,
            sender,
            snapshot,
        };
        (worker, receiver)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Queue a message for the client. Returns `false` once the connection's
    /// sink has gone away.
    pub fn send(&self, message: ServerMessage) -> bool {
        self.sender.send(message.into_message()).is_ok()
    }

    pub fn started_message(&self) -> ServerMessage {
        ServerMessage::SessionStarted {
            session_id: self.session_id.clone(),
            user_id: self.snapshot.borrow().user_id.clone(),
            enhancement_available: self.pipeline.estimator().capabilities().enhancement,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Ping a client that has been silent for the idle timeout.
    pub fn idle_ping(&self) -> bool {
        tracing::debug!(session_id = %self.session_id, "Session idle, pinging client");
        self.send(ServerMessage::Ping {
            timestamp: chrono::Utc::now(),
        })
    }

    /// Answer one inbound text message.
    pub async fn handle_text(&mut self, text: &str) -> ServerMessage {
        match parse_client_message(text) {
            Ok(message) => self.handle(message).await,
            Err(ProtocolError::InvalidFrame(reason)) => self.reject_frame(reason),
            Err(e) => {
                tracing::debug!(session_id = %self.session_id, error = %e, "Rejected message");
                ServerMessage::Error {
                    message: e.to_string(),
                }
            }
        }
    }

    pub async fn handle(&mut self, message: ClientMessage) -> ServerMessage {
        match message {
            ClientMessage::Frame(frame) => self.handle_frame(frame).await,
            ClientMessage::ChangeDress { dress_config } => self.change_dress(&dress_config),
            ClientMessage::GetSessionInfo => ServerMessage::SessionInfo {
                session_id: self.session_id.clone(),
                data: self.snapshot.borrow().stats(chrono::Utc::now()),
            },
            ClientMessage::Ping => ServerMessage::Pong {
                timestamp: chrono::Utc::now(),
            },
        }
    }

    /// Mark the session closed. Called once the message loop has ended.
    pub fn close(self) -> SessionSnapshot {
        self.snapshot.send_modify(|s| s.state = SessionState::Closed);
        self.snapshot.borrow().clone()
    }

    async fn handle_frame(&mut self, frame: FrameMessage) -> ServerMessage {
        if self.snapshot.borrow().state != SessionState::Active {
            return self.reject_frame("Session is not active".to_string());
        }
        let Some(frame_data) = frame.frame_data.filter(|d| !d.is_empty()) else {
            return self.reject_frame("Missing frame_data".to_string());
        };
        let payload = FramePayload::DataUrl(frame_data);

        let result = match frame.dress_config.filter(|v| !v.is_null()) {
            Some(raw) => match GarmentConfig::from_json(&raw) {
                Ok(config) => {
                    self.snapshot
                        .send_modify(|s| s.current_garment = Some(config.clone()));
                    self.pipeline
                        .process_with_config(payload, config, frame.enhance)
                        .await
                }
                // Reported by the pipeline as a configure-stage failure.
                Err(_) => self.pipeline.process(payload, &raw, frame.enhance).await,
            },
            None => {
                let config = self
                    .snapshot
                    .borrow()
                    .current_garment
                    .clone()
                    .unwrap_or_default();
                self.pipeline
                    .process_with_config(payload, config, frame.enhance)
                    .await
            }
        };

        if !result.success {
            tracing::debug!(
                session_id = %self.session_id,
                stage = ?result.failed_stage,
                error = ?result.error,
                "Frame failed"
            );
        }
        self.frame_result(result)
    }

    fn reject_frame(&mut self, reason: String) -> ServerMessage {
        self.frame_result(FrameResult::failed(PipelineStage::Decode, reason, Value::Null))
    }

    fn frame_result(&mut self, result: FrameResult) -> ServerMessage {
        let elapsed = result.processing_time_ms;
        self.snapshot.send_modify(|s| {
            s.frame_count += 1;
            s.last_processing_time_ms = Some(elapsed);
        });
        ServerMessage::FrameResult {
            session_id: self.session_id.clone(),
            data: result,
            timestamp: chrono::Utc::now(),
        }
    }

    fn change_dress(&mut self, raw: &Value) -> ServerMessage {
        match GarmentConfig::from_json(raw) {
            Ok(config) => {
                self.snapshot
                    .send_modify(|s| s.current_garment = Some(config.clone()));
                ServerMessage::DressChanged {
                    session_id: self.session_id.clone(),
                    dress_config: config,
                }
            }
            Err(e) => ServerMessage::Error {
                message: e.to_string(),
            },
        }
    }
}
