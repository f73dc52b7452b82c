use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::json;

use crate::board::Square;
use crate::config::{Difficulty, EngineConfig};
use crate::error::SessionError;
use crate::session::{MoveSubmission, ParticipantId, RecordingSink, SessionId, SessionManager};

/// Line-oriented driver for a `SessionManager`. Every command answers with
/// zero or more JSON lines: its own reply, then the events it caused.
pub struct CommandHandler {
    manager: SessionManager,
    sink: Arc<RecordingSink>,
}

impl CommandHandler {
    pub fn new(config: EngineConfig) -> Self {
        let sink = Arc::new(RecordingSink::new());
        let manager = SessionManager::new(config, sink.clone());
        Self { manager, sink }
    }

    pub fn with_manager(manager: SessionManager, sink: Arc<RecordingSink>) -> Self {
        Self { manager, sink }
    }

    pub fn run(&mut self) -> Result<()> {
        let stdin = io::stdin();
        let mut stdout = io::stdout();
        let mut reader = stdin.lock();
        let mut line = String::new();

        while reader.read_line(&mut line)? > 0 {
            let command = line.trim();
            if command == "quit" {
                break;
            }
            match self.handle_command(command) {
                Ok(response) => print!("{response}"),
                Err(err) => println!("{}", json!({ "error": format!("{err:#}") })),
            }

            stdout.flush()?;
            line.clear();
        }
        Ok(())
    }

    pub fn handle_command(&mut self, command: &str) -> Result<String> {
        let parts: Vec<&str> = command.split_whitespace().collect();
        if parts.is_empty() {
            return Ok(String::new());
        }

        let reply = match parts[0] {
            "create" => self.handle_create(&parts[1..])?,
            "join" => self.handle_join(&parts[1..])?,
            "bot" => self.handle_bot(&parts[1..])?,
            "move" => self.handle_move(&parts[1..])?,
            "show" => self.handle_show(&parts[1..])?,
            "rooms" => Some(json!({ "rooms": self.manager.open_sessions() })),
            "leave" => {
                let player = parts.get(1).ok_or_else(|| anyhow!("usage: leave <player>"))?;
                self.manager.disconnect(&ParticipantId::from(*player));
                None
            }
            "tick" => Some(json!({ "expired": self.manager.expire_turns() })),
            other => bail!("unknown command {other:?}"),
        };

        let mut output = String::new();
        if let Some(reply) = reply {
            output.push_str(&reply.to_string());
            output.push('\n');
        }
        for event in self.sink.drain() {
            output.push_str(&serde_json::to_string(&event)?);
            output.push('\n');
        }
        Ok(output)
    }

    /// `create <player> <stake> [opponent]`
    fn handle_create(&mut self, parts: &[&str]) -> Result<Option<serde_json::Value>> {
        let (player, stake) = match parts {
            [player, stake, ..] => (*player, parse_stake(stake)?),
            _ => bail!("usage: create <player> <stake> [opponent]"),
        };
        let mut participants = vec![ParticipantId::from(player)];
        if let Some(opponent) = parts.get(2) {
            participants.push(ParticipantId::from(*opponent));
        }
        let id = self.manager.create_session(participants, stake)?;
        Ok(Some(json!({ "created": id })))
    }

    /// `join <session> <player>`
    fn handle_join(&mut self, parts: &[&str]) -> Result<Option<serde_json::Value>> {
        let [session, player, ..] = parts else {
            bail!("usage: join <session> <player>");
        };
        self.manager
            .join_session(parse_session(session)?, ParticipantId::from(*player))?;
        Ok(None)
    }

    /// `bot <player> <stake> [difficulty]`
    fn handle_bot(&mut self, parts: &[&str]) -> Result<Option<serde_json::Value>> {
        let (player, stake) = match parts {
            [player, stake, ..] => (*player, parse_stake(stake)?),
            _ => bail!("usage: bot <player> <stake> [difficulty]"),
        };
        let difficulty = match parts.get(2) {
            Some(name) => name.parse::<Difficulty>()?,
            None => Difficulty::Medium,
        };
        let id = self
            .manager
            .create_bot_session(ParticipantId::from(player), stake, difficulty)?;
        Ok(Some(json!({
            "created": id,
            "difficulty": difficulty,
            "thinkingDelayMs": difficulty.thinking_delay().as_millis() as u64,
        })))
    }

    /// `move <session> <player> <row,col> <row,col> [ply]`
    ///
    /// Rejections, unreadable coordinates included, are reported through the
    /// `invalidMove` event only.
    fn handle_move(&mut self, parts: &[&str]) -> Result<Option<serde_json::Value>> {
        let [session, player, from, to, rest @ ..] = parts else {
            bail!("usage: move <session> <player> <row,col> <row,col> [ply]");
        };
        let id = parse_session(session)?;
        let squares = from
            .parse::<Square>()
            .and_then(|from| Ok((from, to.parse::<Square>()?)));
        let (from, to) = match squares {
            Ok(squares) => squares,
            Err(err) => {
                self.manager.reject(id, &SessionError::from(err));
                return Ok(None);
            }
        };

        let mut submission = MoveSubmission::new(from, to);
        if let Some(ply) = rest.first() {
            submission = submission.at_ply(ply.parse().context("ply must be a number")?);
        }

        let _ = self
            .manager
            .submit_move(id, &ParticipantId::from(*player), submission);
        Ok(None)
    }

    /// `show <session>`
    fn handle_show(&mut self, parts: &[&str]) -> Result<Option<serde_json::Value>> {
        let session = parts.first().ok_or_else(|| anyhow!("usage: show <session>"))?;
        let snapshot = self.manager.snapshot(parse_session(session)?)?;
        Ok(Some(json!({
            "session": snapshot.id,
            "status": snapshot.status,
            "sideToMove": snapshot.position.side_to_move,
            "continuingSquare": snapshot.position.continuing_from,
            "ply": snapshot.ply,
            "board": snapshot.position.board.to_string(),
            "history": snapshot.history,
        })))
    }
}

fn parse_session(s: &str) -> Result<SessionId> {
    Ok(SessionId(s.parse().with_context(|| format!("invalid session id {s:?}"))?))
}

fn parse_stake(s: &str) -> Result<u64> {
    s.parse().with_context(|| format!("invalid stake {s:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn handler() -> CommandHandler {
        let sink = Arc::new(RecordingSink::new());
        let manager = SessionManager::with_clock_and_rng(
            EngineConfig::default(),
            sink.clone(),
            Arc::new(ManualClock::new()),
            StdRng::seed_from_u64(11),
        );
        CommandHandler::with_manager(manager, sink)
    }

    #[test]
    fn create_and_join_start_a_session() {
        let mut handler = handler();

        let created = handler.handle_command("create alice 25").unwrap();
        assert!(created.contains("\"created\":1"));

        let rooms = handler.handle_command("rooms").unwrap();
        assert!(rooms.contains("\"rooms\":[1]"));

        let joined = handler.handle_command("join 1 bob").unwrap();
        assert!(joined.contains("\"event\":\"sessionStarted\""));
        assert!(joined.contains("\"isKing\":false"));
    }

    #[test]
    fn bad_coordinates_surface_as_invalid_move_events() {
        let mut handler = handler();
        handler.handle_command("create alice 5 bob").unwrap();

        let off_board = handler.handle_command("move 1 alice 9,9 4,3").unwrap();
        assert!(off_board.contains("\"event\":\"invalidMove\""));
        assert!(off_board.contains("(9, 9) is off the board"));

        let malformed = handler.handle_command("move 1 alice 5,2 four").unwrap();
        assert!(malformed.contains("\"event\":\"invalidMove\""));
        assert!(malformed.contains("four"));

        let show = handler.handle_command("show 1").unwrap();
        assert!(show.contains("\"ply\":0"));
    }

    #[test]
    fn unknown_commands_and_sessions_are_errors() {
        let mut handler = handler();
        assert!(handler.handle_command("dance").is_err());
        assert!(handler.handle_command("move x alice 5,2 4,3").is_err());
        assert!(handler.handle_command("show 7").is_err());
    }

    #[test]
    fn rejected_moves_surface_as_invalid_move_events() {
        let mut handler = handler();
        handler.handle_command("create alice 5 bob").unwrap();

        let output = handler.handle_command("move 1 mallory 5,0 4,1").unwrap();
        assert!(output.contains("\"event\":\"invalidMove\""));
        assert!(output.contains("mallory"));
    }

    #[test]
    fn leaving_forfeits_the_match() {
        let mut handler = handler();
        handler.handle_command("create alice 10 bob").unwrap();

        let output = handler.handle_command("leave alice").unwrap();
        assert!(output.contains("\"event\":\"sessionEnded\""));
        assert!(output.contains("\"winner\":\"black\""));
        assert!(output.contains("\"stakeTotal\":20"));
        assert!(handler.handle_command("show 1").is_err());
    }
}
