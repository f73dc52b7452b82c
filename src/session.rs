use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::board::{Board, Color, Square};
use crate::clock::{Clock, SystemClock};
use crate::config::{Difficulty, EngineConfig};
use crate::error::{MoveError, SessionError};
use crate::movegen::{MoveGenerator, Position};
use crate::rules::{MoveOutcome, RulesValidator};
use crate::search::{Search, SearchRequest};
use crate::transposition::TranspositionTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identity supplied by the authentication collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ParticipantId(pub String);

impl From<&str> for ParticipantId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Participant {
    Human { id: ParticipantId },
    Bot { difficulty: Difficulty },
}

impl Participant {
    fn is(&self, participant: &ParticipantId) -> bool {
        matches!(self, Participant::Human { id } if id == participant)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionMode {
    PlayerVsPlayer,
    PlayerVsBot(Difficulty),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    WaitingForOpponent,
    Active,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EndReason {
    Wipeout,
    NoLegalMoves,
    Timeout,
    Abandoned,
}

/// One applied step or jump, kept for the audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveRecord {
    pub color: Color,
    pub from: Square,
    pub to: Square,
    pub captured: Vec<Square>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum SessionEvent {
    #[serde(rename_all = "camelCase")]
    SessionStarted {
        session_id: SessionId,
        board: Board,
        side_to_move: Color,
        white: Participant,
        black: Participant,
    },
    #[serde(rename_all = "camelCase")]
    MoveApplied {
        session_id: SessionId,
        board: Board,
        side_to_move: Color,
        must_continue: bool,
        continuing_square: Option<Square>,
        was_capture: bool,
        ply: u32,
        record: MoveRecord,
    },
    #[serde(rename_all = "camelCase")]
    InvalidMove { session_id: SessionId, reason: String },
    #[serde(rename_all = "camelCase")]
    SessionEnded {
        session_id: SessionId,
        winner: Color,
        stake_total: u64,
        reason: EndReason,
        /// Full move log; the session leaves the registry right after this event.
        history: Vec<MoveRecord>,
    },
}

/// Outbound side of the transport collaborator.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: SessionEvent);
}

/// Keeps every event in memory until drained.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SessionEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<SessionEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().clone()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: SessionEvent) {
        self.events.lock().push(event);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveSubmission {
    pub from: Square,
    pub to: Square,
    /// Ply the submitter last saw; a mismatch rejects the move as stale.
    pub expected_ply: Option<u32>,
}

impl MoveSubmission {
    pub fn new(from: Square, to: Square) -> Self {
        Self {
            from,
            to,
            expected_ply: None,
        }
    }

    pub fn at_ply(mut self, ply: u32) -> Self {
        self.expected_ply = Some(ply);
        self
    }
}

#[derive(Debug, Clone)]
pub struct GameSession {
    pub id: SessionId,
    pub mode: SessionMode,
    pub stake: u64,
    pub status: SessionStatus,
    pub white: Participant,
    pub black: Option<Participant>,
    pub position: Position,
    /// Number of steps and jumps applied so far.
    pub ply: u32,
    pub turn_deadline: Option<Instant>,
    pub history: Vec<MoveRecord>,
    pub winner: Option<Color>,
}

impl GameSession {
    fn new(id: SessionId, mode: SessionMode, stake: u64, white: Participant) -> Self {
        Self {
            id,
            mode,
            stake,
            status: SessionStatus::WaitingForOpponent,
            white,
            black: None,
            position: Position::new(Board::new(), Color::White),
            ply: 0,
            turn_deadline: None,
            history: Vec::new(),
            winner: None,
        }
    }

    pub fn participant(&self, color: Color) -> Option<&Participant> {
        match color {
            Color::White => Some(&self.white),
            Color::Black => self.black.as_ref(),
        }
    }

    pub fn seat_of(&self, participant: &ParticipantId) -> Option<Color> {
        [Color::White, Color::Black]
            .into_iter()
            .find(|&color| self.participant(color).is_some_and(|p| p.is(participant)))
    }

    pub fn stake_total(&self) -> u64 {
        self.stake * 2
    }

    fn bot_to_move(&self) -> Option<Difficulty> {
        match self.participant(self.position.side_to_move) {
            Some(Participant::Bot { difficulty }) if self.status == SessionStatus::Active => {
                Some(*difficulty)
            }
            _ => None,
        }
    }
}

type SessionHandle = Arc<Mutex<GameSession>>;

/// Owns every live session. Moves on one session are serialized by that
/// session's lock; different sessions proceed independently.
pub struct SessionManager {
    config: EngineConfig,
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
    next_id: AtomicU64,
    validator: RulesValidator,
    move_generator: MoveGenerator,
    transposition_table: Arc<TranspositionTable>,
    clock: Arc<dyn Clock>,
    rng: Mutex<StdRng>,
    sink: Arc<dyn EventSink>,
}

impl SessionManager {
    pub fn new(config: EngineConfig, sink: Arc<dyn EventSink>) -> Self {
        Self::with_clock_and_rng(config, sink, Arc::new(SystemClock), StdRng::from_entropy())
    }

    pub fn with_clock_and_rng(
        config: EngineConfig,
        sink: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
        rng: StdRng,
    ) -> Self {
        Self {
            transposition_table: Arc::new(TranspositionTable::new(config.tt_capacity)),
            config,
            sessions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            validator: RulesValidator::new(),
            move_generator: MoveGenerator::new(),
            clock,
            rng: Mutex::new(rng),
            sink,
        }
    }

    /// One participant opens a waiting room; two start a match immediately.
    pub fn create_session(
        &self,
        participants: Vec<ParticipantId>,
        stake: u64,
    ) -> Result<SessionId, SessionError> {
        let mut participants = participants.into_iter();
        let (Some(host), guest, None) = (participants.next(), participants.next(), participants.next())
        else {
            return Err(SessionError::InvalidParticipants);
        };
        if guest.as_ref() == Some(&host) {
            return Err(SessionError::InvalidParticipants);
        }

        let id = self.allocate_id();
        let mut session = GameSession::new(
            id,
            SessionMode::PlayerVsPlayer,
            stake,
            Participant::Human { id: host.clone() },
        );
        info!(session = %id, host = %host, stake, "session created");
        if let Some(guest) = guest {
            session.black = Some(Participant::Human { id: guest });
            self.start(&mut session);
        }
        self.sessions.write().insert(id, Arc::new(Mutex::new(session)));
        Ok(id)
    }

    pub fn join_session(&self, id: SessionId, guest: ParticipantId) -> Result<(), SessionError> {
        let handle = self.handle(id)?;
        let mut session = handle.lock();
        if session.status != SessionStatus::WaitingForOpponent {
            return Err(SessionError::NotActive(id));
        }
        if session.white.is(&guest) {
            return Err(SessionError::InvalidParticipants);
        }
        session.black = Some(Participant::Human { id: guest });
        self.start(&mut session);
        Ok(())
    }

    /// The human takes White, the bot Black; who moves first is still random.
    pub fn create_bot_session(
        &self,
        participant: ParticipantId,
        stake: u64,
        difficulty: Difficulty,
    ) -> Result<SessionId, SessionError> {
        let id = self.allocate_id();
        let mut session = GameSession::new(
            id,
            SessionMode::PlayerVsBot(difficulty),
            stake,
            Participant::Human { id: participant },
        );
        session.black = Some(Participant::Bot { difficulty });
        self.start(&mut session);

        let handle = Arc::new(Mutex::new(session));
        self.sessions.write().insert(id, handle.clone());
        self.play_bot_turns(&handle);
        self.retire_if_finished(id, &handle);
        Ok(id)
    }

    /// Validates and applies one step or jump, then lets a bot opponent reply.
    pub fn submit_move(
        &self,
        id: SessionId,
        participant: &ParticipantId,
        submission: MoveSubmission,
    ) -> Result<MoveOutcome, SessionError> {
        let handle = match self.handle(id) {
            Ok(handle) => handle,
            Err(err) => {
                self.reject(id, &err);
                return Err(err);
            }
        };

        let result = {
            let mut session = handle.lock();
            self.submit_locked(&mut session, participant, submission)
        };
        if let Err(err) = &result {
            self.reject(id, err);
            return result;
        }

        self.play_bot_turns(&handle);
        self.retire_if_finished(id, &handle);
        result
    }

    fn submit_locked(
        &self,
        session: &mut GameSession,
        participant: &ParticipantId,
        submission: MoveSubmission,
    ) -> Result<MoveOutcome, SessionError> {
        if session.status != SessionStatus::Active {
            return Err(SessionError::NotActive(session.id));
        }
        let actor = session
            .seat_of(participant)
            .ok_or_else(|| SessionError::NotParticipant(participant.clone()))?;
        if let Some(expected) = submission.expected_ply {
            if expected != session.ply {
                return Err(SessionError::StaleSubmission {
                    expected,
                    actual: session.ply,
                });
            }
        }
        Ok(self.apply(session, actor, submission.from, submission.to)?)
    }

    /// Ends every match the participant sits in; the opponent wins.
    pub fn disconnect(&self, participant: &ParticipantId) {
        for (id, handle) in self.all_handles() {
            {
                let mut session = handle.lock();
                match session.status {
                    SessionStatus::WaitingForOpponent if session.white.is(participant) => {
                        info!(session = %id, "waiting room closed by host");
                        session.status = SessionStatus::Finished;
                    }
                    SessionStatus::Active => {
                        if let Some(color) = session.seat_of(participant) {
                            self.finish(&mut session, color.opposite(), EndReason::Abandoned);
                        }
                    }
                    _ => {}
                }
            }
            self.retire_if_finished(id, &handle);
        }
    }

    /// Forfeits every active session whose side to move ran out of time.
    pub fn expire_turns(&self) -> Vec<SessionId> {
        let now = self.clock.now();
        let mut expired = Vec::new();
        for (id, handle) in self.all_handles() {
            {
                let mut session = handle.lock();
                let overdue = session.status == SessionStatus::Active
                    && session.turn_deadline.is_some_and(|deadline| deadline <= now);
                if overdue {
                    let loser = session.position.side_to_move;
                    self.finish(&mut session, loser.opposite(), EndReason::Timeout);
                    expired.push(id);
                }
            }
            self.retire_if_finished(id, &handle);
        }
        expired
    }

    pub fn snapshot(&self, id: SessionId) -> Result<GameSession, SessionError> {
        Ok(self.handle(id)?.lock().clone())
    }

    pub fn open_sessions(&self) -> Vec<SessionId> {
        let mut open: Vec<SessionId> = self
            .all_handles()
            .into_iter()
            .filter(|(_, handle)| handle.lock().status == SessionStatus::WaitingForOpponent)
            .map(|(id, _)| id)
            .collect();
        open.sort();
        open
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    #[cfg(test)]
    pub(crate) fn set_position(&self, id: SessionId, position: Position) {
        if let Ok(handle) = self.handle(id) {
            handle.lock().position = position;
        }
    }

    fn allocate_id(&self) -> SessionId {
        SessionId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn handle(&self, id: SessionId) -> Result<SessionHandle, SessionError> {
        self.sessions
            .read()
            .get(&id)
            .cloned()
            .ok_or(SessionError::NotFound(id))
    }

    fn all_handles(&self) -> Vec<(SessionId, SessionHandle)> {
        self.sessions
            .read()
            .iter()
            .map(|(id, handle)| (*id, handle.clone()))
            .collect()
    }

    fn start(&self, session: &mut GameSession) {
        let Some(black) = session.black.clone() else {
            return;
        };
        let side_to_move = if self.rng.lock().gen_bool(0.5) {
            Color::White
        } else {
            Color::Black
        };
        session.position = Position::new(Board::new(), side_to_move);
        session.status = SessionStatus::Active;
        session.turn_deadline = Some(self.clock.now() + self.config.turn_time);

        info!(session = %session.id, side_to_move = %side_to_move, "session started");
        self.sink.emit(SessionEvent::SessionStarted {
            session_id: session.id,
            board: session.position.board.clone(),
            side_to_move,
            white: session.white.clone(),
            black,
        });
    }

    fn apply(
        &self,
        session: &mut GameSession,
        actor: Color,
        from: Square,
        to: Square,
    ) -> Result<MoveOutcome, MoveError> {
        let outcome = self.validator.play(&session.position, actor, from, to)?;

        session.position = outcome.position.clone();
        session.ply += 1;
        session.turn_deadline = Some(self.clock.now() + self.config.turn_time);
        let record = MoveRecord {
            color: actor,
            from,
            to,
            captured: outcome.applied.captured.clone(),
            timestamp: Utc::now(),
        };
        session.history.push(record.clone());

        self.sink.emit(SessionEvent::MoveApplied {
            session_id: session.id,
            board: session.position.board.clone(),
            side_to_move: session.position.side_to_move,
            must_continue: outcome.must_continue,
            continuing_square: session.position.continuing_from,
            was_capture: outcome.was_capture,
            ply: session.ply,
            record,
        });

        if !outcome.must_continue {
            let next = session.position.side_to_move;
            if session.position.board.count(next) == 0 {
                self.finish(session, actor, EndReason::Wipeout);
            } else if !self.move_generator.has_legal_moves(&session.position.board, next) {
                self.finish(session, actor, EndReason::NoLegalMoves);
            }
        }
        Ok(outcome)
    }

    fn finish(&self, session: &mut GameSession, winner: Color, reason: EndReason) {
        session.status = SessionStatus::Finished;
        session.winner = Some(winner);
        session.turn_deadline = None;

        info!(session = %session.id, winner = %winner, ?reason, stake_total = session.stake_total(), "session ended");
        self.sink.emit(SessionEvent::SessionEnded {
            session_id: session.id,
            winner,
            stake_total: session.stake_total(),
            reason,
            history: session.history.clone(),
        });
    }

    /// Runs the search on a snapshot with the session unlocked, then applies the
    /// result only if nothing moved in the meantime. Loops through capture chains.
    fn play_bot_turns(&self, handle: &SessionHandle) {
        loop {
            let (request, ply, id) = {
                let session = handle.lock();
                let Some(difficulty) = session.bot_to_move() else {
                    return;
                };
                (
                    SearchRequest::new(session.position.clone(), difficulty),
                    session.ply,
                    session.id,
                )
            };

            let seed = self.rng.lock().gen();
            let mut search = Search::with_shared_table(
                &self.config,
                self.transposition_table.clone(),
                self.clock.clone(),
                StdRng::seed_from_u64(seed),
            );
            let Some(outcome) = search.find_best_move(&request) else {
                return;
            };
            debug!(
                session = %id,
                mv = %outcome.best_move,
                score = outcome.score,
                depth = outcome.depth,
                nodes = outcome.nodes,
                source = ?outcome.source,
                "bot move chosen"
            );

            let mut session = handle.lock();
            if session.status != SessionStatus::Active || session.ply != ply {
                warn!(session = %id, "discarding bot move computed for a superseded position");
                return;
            }
            let bot = request.position.side_to_move;
            let mv = outcome.best_move;
            if let Err(err) = self.apply(&mut session, bot, mv.from, mv.to) {
                warn!(session = %id, error = %err, "bot produced a move the validator refused");
                return;
            }
        }
    }

    fn retire_if_finished(&self, id: SessionId, handle: &SessionHandle) {
        if handle.lock().status == SessionStatus::Finished {
            self.sessions.write().remove(&id);
        }
    }

    /// Reports a refused submission, including ones the transport could not parse.
    pub fn reject(&self, id: SessionId, err: &SessionError) {
        warn!(session = %id, error = %err, "move rejected");
        self.sink.emit(SessionEvent::InvalidMove {
            session_id: id,
            reason: err.to_string(),
        });
    }
}
