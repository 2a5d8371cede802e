//! WebSocket upgrade + message loop. Each connection drives at most one
//! progress session at a time and owns its own execution history. Every client
//! message gets exactly one JSON reply.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{info, error, instrument, debug};

use crate::error::LabError;
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::runner::{ExecutionHistory, MockRunner};
use crate::session::{complete_solution, ProgressSession, StepSelection};
use crate::state::AppState;

/// Per-connection state.
pub struct Connection {
  session: Option<ProgressSession>,
  history: ExecutionHistory,
  runner: MockRunner,
}

impl Connection {
  pub fn new(history_limit: usize) -> Self {
    Self { session: None, history: ExecutionHistory::new(history_limit), runner: MockRunner }
  }

  /// Close the active session, flushing a pending save.
  pub async fn close(&mut self) {
    if let Some(session) = self.session.take() {
      let status = session.close().await;
      debug!(target: "session", ?status, "Session closed");
    }
  }
}

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "codelab_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "codelab_backend", "WebSocket connected");
  let mut conn = Connection::new(state.history_limit);
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        // Parse, dispatch, serialize response.
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "codelab_backend", "WS received: {:?}", &incoming);
            handle_client_ws(incoming, &state, &mut conn).await
          }
          Err(e) => ServerWsMessage::Error { kind: "invalid_argument".into(), message: format!("Invalid JSON: {}", e) },
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "kind": "internal", "message": format!("Serialization error: {}", e) }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "codelab_backend", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  conn.close().await;
  info!(target: "codelab_backend", "WebSocket disconnected");
}

#[instrument(level = "info", skip(state, conn))]
pub async fn handle_client_ws(msg: ClientWsMessage, state: &AppState, conn: &mut Connection) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::EnterExperiment { learner_id, experiment_id } => {
      // Leaving the previous experiment flushes whatever it still had pending.
      conn.close().await;
      match ProgressSession::enter_experiment(
        state.experiments.as_ref(),
        state.progress.clone(),
        &learner_id,
        &experiment_id,
        state.settings,
      )
      .await
      {
        Ok(session) => {
          let reply = ServerWsMessage::Entered {
            experiment: session.experiment().as_ref().clone(),
            session: session.view(),
          };
          conn.session = Some(session);
          reply
        }
        Err(e) => error_reply(&e),
      }
    }

    ClientWsMessage::SelectStep { step } => with_session(conn, |session| {
      match session.select_step(step)? {
        StepSelection::Selected => Ok(ServerWsMessage::Session { session: session.view() }),
        StepSelection::Locked => Ok(ServerWsMessage::StepRejected { step, session: session.view() }),
      }
    }),

    ClientWsMessage::MarkStepComplete { step } => with_session(conn, |session| {
      let view = session.mark_step_complete(step)?;
      Ok(ServerWsMessage::Session { session: view })
    }),

    ClientWsMessage::CompleteSolution => with_session(conn, |session| {
      if !session.is_completed() {
        return Err(LabError::invalid("the complete solution unlocks once every step is completed"));
      }
      Ok(ServerWsMessage::CompleteSolution { text: complete_solution(session.experiment()) })
    }),

    ClientWsMessage::RunCode { code, step } => {
      let Connection { session, history, runner } = conn;
      let Some(session) = session.as_ref() else {
        return error_reply(&no_session());
      };
      let number = step.unwrap_or_else(|| session.last_accessed_step());
      let Some(step) = session.experiment().step(number) else {
        return error_reply(&LabError::invalid(format!("step {number} does not exist")));
      };
      let outcome = runner.run(history, &session.experiment().language, number, &code, &step.test_cases);
      ServerWsMessage::RunResult { outcome }
    }
  }
}

fn with_session(
  conn: &mut Connection,
  f: impl FnOnce(&mut ProgressSession) -> crate::error::Result<ServerWsMessage>,
) -> ServerWsMessage {
  match conn.session.as_mut() {
    Some(session) => f(session).unwrap_or_else(|e| error_reply(&e)),
    None => error_reply(&no_session()),
  }
}

fn no_session() -> LabError {
  LabError::invalid("enter an experiment first")
}

fn error_reply(e: &LabError) -> ServerWsMessage {
  ServerWsMessage::Error { kind: e.kind().into(), message: e.to_string() }
}
