//! Session lifecycle orchestration: host checks, registry calls and event fan-out.
//!
//! Every state change is applied first; the matching webhook events are then
//! emitted on a background task so delivery never delays or fails gameplay.

use std::sync::{Arc, Weak};

use tokio::time::sleep;
use tracing::{debug, info};

use crate::{
    dto::{
        events::{PlayerFeedbackEvent, PlayerPresenceEvent, StateChangedEvent},
        session::{
            AnswerResponse, CorrectAnswerResponse, CreateSessionRequest, JoinSessionRequest,
            LeaderboardResponse, PlayerSummary, SessionDetail, TransitionResponse,
        },
    },
    error::ServiceError,
    services::webhook_events,
    state::{
        AppState, SharedState,
        quiz::QuestionView,
        registry::SessionSummary,
        session::QuestionResults,
        state_machine::SessionPhase,
        timer::TimeoutHook,
    },
};

/// Open a lobby for a stored quiz; the caller becomes the host.
pub async fn create_session(
    state: &SharedState,
    caller: &str,
    request: CreateSessionRequest,
) -> Result<SessionDetail, ServiceError> {
    let quiz = state.quizzes().get_playable_quiz(request.quiz_id).await?;
    let summary = state
        .registry()
        .create_session(quiz, caller, &request.host_socket_id)?;
    session_detail(state, &summary.pin).await
}

/// Detailed view of a session.
pub async fn session_detail(state: &SharedState, pin: &str) -> Result<SessionDetail, ServiceError> {
    Ok(state
        .registry()
        .inspect(pin, |session| SessionDetail::from(session))
        .await?)
}

/// Remove a session and its webhook subscriptions. Host only.
pub async fn delete_session(state: &SharedState, caller: &str, pin: &str) -> Result<(), ServiceError> {
    ensure_host(state, pin, caller).await?;
    state.registry().delete_session(pin).await;
    state.webhooks().unregister_all(pin);
    Ok(())
}

/// Add the caller to the lobby.
pub async fn join(
    state: &SharedState,
    caller: &str,
    pin: &str,
    request: JoinSessionRequest,
) -> Result<PlayerSummary, ServiceError> {
    let player = state
        .registry()
        .add_player(pin, caller, request.nickname.trim(), &request.socket_id)
        .await?;
    let player_count = state.registry().inspect(pin, |s| s.player_count()).await?;

    let event = PlayerPresenceEvent::new(&player, player_count);
    let webhooks = state.webhooks().clone();
    let pin = pin.to_string();
    tokio::spawn(async move {
        webhook_events::player_joined(&webhooks, &pin, event).await;
    });

    Ok(PlayerSummary::from(&player))
}

/// Remove the caller from the session.
pub async fn leave(state: &SharedState, caller: &str, pin: &str) -> Result<(), ServiceError> {
    let player = state.registry().remove_player(pin, caller).await?;
    let player_count = state.registry().inspect(pin, |s| s.player_count()).await?;

    let event = PlayerPresenceEvent::new(&player, player_count);
    let webhooks = state.webhooks().clone();
    let pin = pin.to_string();
    tokio::spawn(async move {
        webhook_events::player_left(&webhooks, &pin, event).await;
    });
    Ok(())
}

/// Rebind the caller, host or player, to a new realtime connection.
pub async fn reconnect(
    state: &SharedState,
    caller: &str,
    pin: &str,
    socket_id: &str,
) -> Result<(), ServiceError> {
    let is_host = state
        .registry()
        .inspect(pin, |s| s.host_user_id() == caller)
        .await?;

    if is_host {
        state
            .registry()
            .with_session(pin, |session| {
                session.update_host_socket(socket_id.to_string());
                Ok(())
            })
            .await?;
    } else {
        state
            .registry()
            .update_player_socket(pin, caller, socket_id)
            .await?;
    }
    debug!(%pin, user_id = %caller, host = is_host, "socket rebound");
    Ok(())
}

/// Open the first question. Host only.
pub async fn start(
    state: &SharedState,
    caller: &str,
    pin: &str,
) -> Result<TransitionResponse, ServiceError> {
    ensure_host(state, pin, caller).await?;
    let view = state
        .registry()
        .start_session(pin, timeout_hook(state))
        .await?;
    info!(%pin, "session started");
    announce_question(state, pin, view.clone()).await?;

    Ok(TransitionResponse {
        state: SessionPhase::QuestionActive,
        question: Some(view.as_ref().clone()),
    })
}

/// Record the caller's answer for the open question.
pub async fn submit_answer(
    state: &SharedState,
    caller: &str,
    pin: &str,
    answer_index: usize,
) -> Result<AnswerResponse, ServiceError> {
    let result = state
        .registry()
        .submit_answer(pin, caller, answer_index)
        .await?;
    let (total_score, rank) = state
        .registry()
        .inspect(pin, |session| {
            (
                session.player(caller).map_or(0, |player| player.total_score),
                session.rank_of(caller),
            )
        })
        .await?;

    let feedback = PlayerFeedbackEvent {
        player_id: caller.to_string(),
        is_correct: result.is_correct,
        points: result.points,
        total_score,
        combo: result.new_combo,
        rank,
    };
    let webhooks = state.webhooks().clone();
    let event_pin = pin.to_string();
    tokio::spawn(async move {
        webhook_events::player_feedback(&webhooks, &event_pin, feedback).await;
    });

    Ok(AnswerResponse {
        result,
        total_score,
    })
}

/// Close the open question before its timer. Host only.
pub async fn end_question(
    state: &SharedState,
    caller: &str,
    pin: &str,
) -> Result<QuestionResults, ServiceError> {
    ensure_host(state, pin, caller).await?;
    let results = state.registry().end_current_question(pin).await?;
    info!(%pin, question_index = results.question_index, "question ended by host");
    announce_question_closed(state, pin, results.clone()).await?;
    Ok(results)
}

/// Timer path: close the question if the session is still on it.
pub async fn expire_question(state: &SharedState, pin: &str, question_index: usize) {
    match state.registry().expire_question(pin, question_index).await {
        Ok(Some(results)) => {
            info!(%pin, question_index, "question timed out");
            if let Err(err) = announce_question_closed(state, pin, results).await {
                debug!(%pin, error = %err, "session vanished after timeout");
            }
        }
        Ok(None) => debug!(%pin, question_index, "stale question timer ignored"),
        Err(err) => debug!(%pin, question_index, error = %err, "question timer outlived its session"),
    }
}

/// Show the standings after a closed question. Host only.
pub async fn show_leaderboard(
    state: &SharedState,
    caller: &str,
    pin: &str,
) -> Result<LeaderboardResponse, ServiceError> {
    ensure_host(state, pin, caller).await?;
    state.registry().show_leaderboard(pin).await?;

    let limit = state.config().sessions.leaderboard_limit;
    let entries = state.registry().leaderboard(pin, limit).await?;
    let changed = state_event(&state.registry().summary(pin).await?);

    let webhooks = state.webhooks().clone();
    let event_pin = pin.to_string();
    let event_entries = entries.clone();
    tokio::spawn(async move {
        webhook_events::state_changed(&webhooks, &event_pin, changed).await;
        webhook_events::leaderboard(&webhooks, &event_pin, &event_entries).await;
    });

    Ok(LeaderboardResponse { entries })
}

/// Ranked players, capped at `limit` or the configured default.
pub async fn leaderboard(
    state: &SharedState,
    pin: &str,
    limit: Option<usize>,
) -> Result<LeaderboardResponse, ServiceError> {
    let limit = limit.unwrap_or(state.config().sessions.leaderboard_limit);
    let entries = state.registry().leaderboard(pin, limit).await?;
    Ok(LeaderboardResponse { entries })
}

/// Open the next question, or finish the session after the last one. Host only.
pub async fn next_question(
    state: &SharedState,
    caller: &str,
    pin: &str,
) -> Result<TransitionResponse, ServiceError> {
    ensure_host(state, pin, caller).await?;
    match state
        .registry()
        .next_question(pin, timeout_hook(state))
        .await?
    {
        Some(view) => {
            announce_question(state, pin, view.clone()).await?;
            Ok(TransitionResponse {
                state: SessionPhase::QuestionActive,
                question: Some(view.as_ref().clone()),
            })
        }
        None => {
            announce_finished(state, pin).await?;
            Ok(TransitionResponse {
                state: SessionPhase::Ended,
                question: None,
            })
        }
    }
}

/// End the session from any phase. Host only; ending twice is a no-op.
pub async fn end_session(
    state: &SharedState,
    caller: &str,
    pin: &str,
) -> Result<TransitionResponse, ServiceError> {
    ensure_host(state, pin, caller).await?;
    let already_ended = state
        .registry()
        .inspect(pin, |s| s.phase() == SessionPhase::Ended)
        .await?;
    state.registry().end_session(pin).await?;

    if !already_ended {
        announce_finished(state, pin).await?;
    }
    Ok(TransitionResponse {
        state: SessionPhase::Ended,
        question: None,
    })
}

/// Redacted view of the open question.
pub async fn current_question(state: &SharedState, pin: &str) -> Result<QuestionView, ServiceError> {
    state
        .registry()
        .inspect(pin, |s| s.current_question())
        .await?
        .map(|view| view.as_ref().clone())
        .ok_or_else(|| ServiceError::InvalidState("no question is open".into()))
}

/// Correct option of the closed question. Host only.
pub async fn correct_answer(
    state: &SharedState,
    caller: &str,
    pin: &str,
) -> Result<CorrectAnswerResponse, ServiceError> {
    ensure_host(state, pin, caller).await?;
    let (question_index, correct) = state
        .registry()
        .inspect(pin, |s| {
            (
                s.current_question_index().unwrap_or_default(),
                s.correct_answer(),
            )
        })
        .await?;
    Ok(CorrectAnswerResponse {
        question_index,
        correct_option_index: correct?,
    })
}

/// Reject callers that are not the session host.
pub async fn ensure_host(state: &AppState, pin: &str, caller: &str) -> Result<(), ServiceError> {
    let is_host = state
        .registry()
        .inspect(pin, |s| s.host_user_id() == caller)
        .await?;
    if is_host {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(format!(
            "only the host of session `{pin}` can do this"
        )))
    }
}

/// Question timer callback: closes the question through [`expire_question`].
fn timeout_hook(state: &SharedState) -> TimeoutHook {
    let state: Weak<AppState> = Arc::downgrade(state);
    Arc::new(move |pin: String, question_index: usize| {
        let Some(state) = state.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            expire_question(&state, &pin, question_index).await;
        });
    })
}

fn state_event(summary: &SessionSummary) -> StateChangedEvent {
    StateChangedEvent {
        state: summary.state,
        current_question_index: summary.current_question_index,
        total_questions: summary.total_questions,
    }
}

async fn announce_question(
    state: &SharedState,
    pin: &str,
    view: Arc<QuestionView>,
) -> Result<(), ServiceError> {
    let changed = state_event(&state.registry().summary(pin).await?);
    let webhooks = state.webhooks().clone();
    let pin = pin.to_string();
    tokio::spawn(async move {
        webhook_events::state_changed(&webhooks, &pin, changed).await;
        webhook_events::question_started(&webhooks, &pin, view.as_ref().clone()).await;
    });
    Ok(())
}

async fn announce_question_closed(
    state: &SharedState,
    pin: &str,
    results: QuestionResults,
) -> Result<(), ServiceError> {
    let changed = state_event(&state.registry().summary(pin).await?);
    let webhooks = state.webhooks().clone();
    let pin = pin.to_string();
    tokio::spawn(async move {
        webhook_events::question_ended(&webhooks, &pin, &results).await;
        webhook_events::state_changed(&webhooks, &pin, changed).await;
    });
    Ok(())
}

async fn announce_finished(state: &SharedState, pin: &str) -> Result<(), ServiceError> {
    let summary = state.registry().summary(pin).await?;
    let entries = state
        .registry()
        .leaderboard(pin, state.config().sessions.leaderboard_limit)
        .await?;
    info!(%pin, players = summary.player_count, "session finished");

    let changed = state_event(&summary);
    let webhooks = state.webhooks().clone();
    let event_pin = pin.to_string();
    tokio::spawn(async move {
        webhook_events::state_changed(&webhooks, &event_pin, changed).await;
        webhook_events::game_ended(&webhooks, &event_pin, summary.total_questions, &entries).await;
    });

    schedule_cleanup(state, pin);
    Ok(())
}

/// Delete an ended session once its grace period elapses.
fn schedule_cleanup(state: &SharedState, pin: &str) {
    let ttl = state.config().sessions.ended_session_ttl();
    let state = Arc::downgrade(state);
    let pin = pin.to_string();
    tokio::spawn(async move {
        sleep(ttl).await;
        let Some(state) = state.upgrade() else {
            return;
        };
        // The PIN may have been reused by a newer session in the meantime.
        let still_ended = state
            .registry()
            .inspect(&pin, |s| s.phase() == SessionPhase::Ended)
            .await
            .unwrap_or(false);
        if still_ended && state.registry().delete_session(&pin).await {
            let removed = state.webhooks().unregister_all(&pin);
            debug!(%pin, subscriptions = removed, "ended session cleaned up");
        }
    });
}

#[cfg(test)]
pub(crate) mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::quiz_store::{InMemoryQuizStore, QuizStore},
        state::{
            quiz::{Question, QuestionKind, QuizSnapshot},
            webhooks::ClientType,
        },
    };

    pub(crate) fn quiz() -> QuizSnapshot {
        let question = |id: &str, correct: usize| Question {
            id: id.into(),
            text: format!("Question {id}"),
            kind: QuestionKind::MultipleChoice,
            time_limit_seconds: 10,
            points_multiplier: 1.0,
            options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct_option_index: correct,
        };
        QuizSnapshot {
            id: "quiz-1".into(),
            title: "Orchestration".into(),
            host_id: "host".into(),
            questions: vec![question("q1", 0), question("q2", 1)],
        }
    }

    pub(crate) async fn app() -> SharedState {
        let quizzes = InMemoryQuizStore::new();
        quizzes.save_quiz(quiz()).await.unwrap();
        AppState::new(AppConfig::default(), Arc::new(quizzes))
    }

    pub(crate) async fn lobby(state: &SharedState) -> String {
        let detail = create_session(
            state,
            "host",
            CreateSessionRequest {
                quiz_id: "quiz-1".into(),
                host_socket_id: "host-socket".into(),
            },
        )
        .await
        .unwrap();
        for (id, nickname) in [("p1", "Alice"), ("p2", "Bob")] {
            join(
                state,
                id,
                &detail.summary.pin,
                JoinSessionRequest {
                    nickname: nickname.into(),
                    socket_id: format!("{id}-socket"),
                },
            )
            .await
            .unwrap();
        }
        detail.summary.pin
    }

    async fn phase(state: &SharedState, pin: &str) -> SessionPhase {
        state.registry().summary(pin).await.unwrap().state
    }

    #[tokio::test(start_paused = true)]
    async fn full_game_flow() {
        let state = app().await;
        let pin = lobby(&state).await;

        let started = start(&state, "host", &pin).await.unwrap();
        assert_eq!(started.question.unwrap().index, 0);

        let answer = submit_answer(&state, "p1", &pin, 0).await.unwrap();
        assert_eq!(answer.result.points, 1_000);
        assert_eq!(answer.total_score, 1_000);
        submit_answer(&state, "p2", &pin, 3).await.unwrap();

        let results = end_question(&state, "host", &pin).await.unwrap();
        assert_eq!(results.distribution, vec![1, 0, 0, 1]);
        assert_eq!(correct_answer(&state, "host", &pin).await.unwrap().correct_option_index, 0);

        let board = show_leaderboard(&state, "host", &pin).await.unwrap();
        assert_eq!(board.entries[0].player_id, "p1");

        let next = next_question(&state, "host", &pin).await.unwrap();
        assert_eq!(next.question.unwrap().index, 1);
        end_question(&state, "host", &pin).await.unwrap();
        show_leaderboard(&state, "host", &pin).await.unwrap();

        let finished = next_question(&state, "host", &pin).await.unwrap();
        assert_eq!(finished.state, SessionPhase::Ended);
        assert!(finished.question.is_none());
        assert_eq!(phase(&state, &pin).await, SessionPhase::Ended);

        sleep(state.config().sessions.ended_session_ttl() + Duration::from_secs(1)).await;
        assert!(matches!(
            session_detail(&state, &pin).await.unwrap_err(),
            ServiceError::NotFound(_)
        ));
        assert_eq!(state.registry().session_for_player("p1"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn cleanup_of_ended_session_drops_late_subscriptions() {
        let state = app().await;
        let pin = lobby(&state).await;
        end_session(&state, "host", &pin).await.unwrap();

        // Added after the game retired its subscriptions.
        sleep(state.webhooks().config().cleanup_delay() + Duration::from_secs(1)).await;
        state.webhooks().register(
            &pin,
            ClientType::Whiteboard,
            "http://127.0.0.1:9/hook",
            "0123456789abcdef",
        );
        assert_eq!(state.webhooks().list(&pin).len(), 1);

        sleep(state.config().sessions.ended_session_ttl()).await;
        assert!(matches!(
            session_detail(&state, &pin).await.unwrap_err(),
            ServiceError::NotFound(_)
        ));
        assert!(state.webhooks().list(&pin).is_empty());
        assert_eq!(state.webhooks().subscription_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn host_only_operations_reject_players() {
        let state = app().await;
        let pin = lobby(&state).await;

        assert!(matches!(
            start(&state, "p1", &pin).await.unwrap_err(),
            ServiceError::Forbidden(_)
        ));
        assert!(matches!(
            delete_session(&state, "p1", &pin).await.unwrap_err(),
            ServiceError::Forbidden(_)
        ));
        assert!(matches!(
            end_session(&state, "stranger", &pin).await.unwrap_err(),
            ServiceError::Forbidden(_)
        ));
        assert_eq!(phase(&state, &pin).await, SessionPhase::Lobby);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_closes_the_question() {
        let state = app().await;
        let pin = lobby(&state).await;
        start(&state, "host", &pin).await.unwrap();

        sleep(Duration::from_millis(10_499)).await;
        assert_eq!(phase(&state, &pin).await, SessionPhase::QuestionActive);

        sleep(Duration::from_millis(50)).await;
        assert_eq!(phase(&state, &pin).await, SessionPhase::Processing);
        assert!(matches!(
            end_question(&state, "host", &pin).await.unwrap_err(),
            ServiceError::InvalidState(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn answers_are_refused_after_the_window() {
        let state = app().await;
        let pin = lobby(&state).await;
        start(&state, "host", &pin).await.unwrap();

        assert!(matches!(
            correct_answer(&state, "host", &pin).await.unwrap_err(),
            ServiceError::AnswerHidden
        ));
        submit_answer(&state, "p1", &pin, 1).await.unwrap();
        assert!(matches!(
            submit_answer(&state, "p1", &pin, 1).await.unwrap_err(),
            ServiceError::AlreadyAnswered(_)
        ));
        assert!(matches!(
            submit_answer(&state, "p2", &pin, 9).await.unwrap_err(),
            ServiceError::InvalidIndex(_)
        ));
        assert!(matches!(
            submit_answer(&state, "ghost", &pin, 0).await.unwrap_err(),
            ServiceError::NotFound(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn end_session_is_idempotent_and_cleans_up() {
        let state = app().await;
        let pin = lobby(&state).await;

        end_session(&state, "host", &pin).await.unwrap();
        end_session(&state, "host", &pin).await.unwrap();
        assert_eq!(phase(&state, &pin).await, SessionPhase::Ended);

        sleep(state.config().sessions.ended_session_ttl() + Duration::from_secs(1)).await;
        assert!(state.registry().get_session(&pin).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_rebinds_host_and_players() {
        let state = app().await;
        let pin = lobby(&state).await;

        reconnect(&state, "host", &pin, "host-2").await.unwrap();
        reconnect(&state, "p1", &pin, "p1-2").await.unwrap();
        let sockets = state
            .registry()
            .inspect(&pin, |s| {
                (
                    s.host_socket_id().to_string(),
                    s.player("p1").map(|p| p.socket_id.clone()),
                )
            })
            .await
            .unwrap();
        assert_eq!(sockets, ("host-2".to_string(), Some("p1-2".to_string())));

        assert!(matches!(
            reconnect(&state, "ghost", &pin, "x").await.unwrap_err(),
            ServiceError::NotFound(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn leave_and_current_question() {
        let state = app().await;
        let pin = lobby(&state).await;

        assert!(matches!(
            current_question(&state, &pin).await.unwrap_err(),
            ServiceError::InvalidState(_)
        ));
        leave(&state, "p2", &pin).await.unwrap();
        assert_eq!(session_detail(&state, &pin).await.unwrap().players.len(), 1);

        start(&state, "host", &pin).await.unwrap();
        let question = current_question(&state, &pin).await.unwrap();
        assert_eq!(question.id, "q1");
        assert_eq!(leaderboard(&state, &pin, Some(1)).await.unwrap().entries.len(), 1);
    }

    #[tokio::test]
    async fn unknown_quiz_and_bad_pin_surface_their_kind() {
        let state = app().await;
        let err = create_session(
            &state,
            "host",
            CreateSessionRequest {
                quiz_id: "missing".into(),
                host_socket_id: "hs".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        assert!(matches!(
            session_detail(&state, "12").await.unwrap_err(),
            ServiceError::InvalidPin(_)
        ));
    }
}
