pub mod board;
pub mod book;
pub mod clock;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod movegen;
pub mod protocol;
pub mod rules;
pub mod search;
pub mod session;
pub mod transposition;
pub mod zobrist;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use board::{Board, Color, Piece, Square};
    use book::OpeningBook;
    use clock::ManualClock;
    use config::{Difficulty, EngineConfig, SearchLimits};
    use error::{MoveError, SessionError};
    use evaluation::{is_decisive, Evaluator};
    use movegen::{GameState, Move, MoveGenerator, Position};
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;
    use rules::RulesValidator;
    use search::{MoveSource, Search, SearchRequest};
    use session::{
        EndReason, MoveSubmission, ParticipantId, RecordingSink, SessionEvent, SessionManager,
        SessionStatus,
    };
    use transposition::TranspositionTable;

    fn sq(row: u8, col: u8) -> Square {
        Square::at(row, col)
    }

    fn board(diagram: &str) -> Board {
        Board::from_diagram(diagram).unwrap()
    }

    fn engine(clock: Arc<ManualClock>) -> Search {
        engine_with(clock, 4, 3)
    }

    fn engine_with(clock: Arc<ManualClock>, quiescence_depth: u32, seed: u64) -> Search {
        let config = EngineConfig {
            quiescence_depth,
            ..EngineConfig::default()
        };
        let mut search = Search::with_shared_table(
            &config,
            Arc::new(TranspositionTable::new(10_000)),
            clock,
            StdRng::seed_from_u64(seed),
        );
        search.set_book(None);
        search
    }

    fn limits(max_depth: u32) -> SearchLimits {
        SearchLimits {
            max_depth,
            time_budget: Duration::from_secs(60),
            random_move_chance: 0.0,
        }
    }

    fn manager(seed: u64) -> (SessionManager, Arc<RecordingSink>, Arc<ManualClock>) {
        let sink = Arc::new(RecordingSink::new());
        let clock = Arc::new(ManualClock::stepping(Duration::from_millis(1)));
        let manager = SessionManager::with_clock_and_rng(
            EngineConfig::default(),
            sink.clone(),
            clock.clone(),
            StdRng::seed_from_u64(seed),
        );
        (manager, sink, clock)
    }

    fn perft(position: &Position, generator: &MoveGenerator, depth: u32) -> u64 {
        if depth == 0 {
            return 1;
        }
        let moves = generator.legal_moves(position);
        if depth == 1 {
            return moves.len() as u64;
        }
        moves
            .iter()
            .map(|mv| {
                let mut next = position.clone();
                next.make_move(mv);
                perft(&next, generator, depth - 1)
            })
            .sum()
    }

    #[test]
    fn test_initial_position() {
        let board = Board::new();
        let generator = MoveGenerator::new();

        assert_eq!(board.count(Color::White), 12);
        assert_eq!(board.count(Color::Black), 12);
        assert!(board.pieces().all(|(square, _)| square.is_dark()));

        for color in [Color::White, Color::Black] {
            let moves = generator.generate_moves(&board, color);
            assert_eq!(moves.len(), 7);
            assert!(moves.iter().all(|mv| !mv.is_capture()));
        }
    }

    #[test]
    fn test_perft_initial_position() {
        let generator = MoveGenerator::new();
        let start = Position::new(Board::new(), Color::White);

        assert_eq!(perft(&start, &generator, 1), 7);
        assert_eq!(perft(&start, &generator, 2), 49);
        assert_eq!(perft(&start, &generator, 3), 302);
    }

    #[test]
    fn test_diagram_round_trip() {
        let board = Board::new();
        assert_eq!(Board::from_diagram(&board.to_string()).unwrap(), board);
        assert!(Board::from_diagram("w.......").is_err());
    }

    #[test]
    fn test_backward_capture_is_forced() {
        let board = board(
            "........
             ........
             ........
             ....w...
             .....b..
             ........
             ........
             ........",
        );
        let generator = MoveGenerator::new();

        let moves = generator.generate_moves(&board, Color::White);
        assert_eq!(moves, vec![Move::new_capture(sq(3, 4), sq(5, 6), sq(4, 5))]);

        let mut position = Position::new(board, Color::White);
        position.make_move(&moves[0]);
        assert_eq!(position.board.count(Color::Black), 0);
        assert_eq!(position.board.get(sq(5, 6)), Some(Piece::man(Color::White)));
        assert_eq!(position.side_to_move, Color::Black);
    }

    #[test]
    fn test_mandatory_capture_rejects_simple_moves() {
        let board = board(
            "........
             ........
             ........
             ....w...
             .....b..
             ........
             ........
             w.......",
        );
        let validator = RulesValidator::new();
        let position = Position::new(board, Color::White);

        assert_eq!(
            validator.validate(&position, Color::White, sq(3, 4), sq(2, 3)),
            Err(MoveError::CaptureRequired)
        );
        assert_eq!(
            validator.validate(&position, Color::White, sq(7, 0), sq(6, 1)),
            Err(MoveError::CaptureRequired)
        );
        assert!(validator
            .validate(&position, Color::White, sq(3, 4), sq(5, 6))
            .is_ok());
    }

    #[test]
    fn test_validator_rejections() {
        let validator = RulesValidator::new();
        let position = Position::new(Board::new(), Color::White);

        assert_eq!(
            validator.validate(&position, Color::Black, sq(2, 1), sq(3, 0)),
            Err(MoveError::NotYourTurn(Color::Black))
        );
        assert_eq!(
            validator.validate(&position, Color::White, sq(4, 1), sq(3, 2)),
            Err(MoveError::NoPiece { color: Color::White, square: sq(4, 1) })
        );
        assert_eq!(
            validator.validate(&position, Color::White, sq(6, 1), sq(5, 2)),
            Err(MoveError::Occupied(sq(5, 2)))
        );
        assert_eq!(
            validator.validate(&position, Color::White, sq(5, 2), sq(4, 2)),
            Err(MoveError::NotDiagonal { from: sq(5, 2), to: sq(4, 2) })
        );
        assert_eq!(
            validator.validate(&position, Color::White, sq(5, 2), sq(3, 4)),
            Err(MoveError::NothingToCapture)
        );
        assert_eq!(
            validator.validate(&position, Color::White, sq(5, 2), sq(2, 5)),
            Err(MoveError::TooFar)
        );
        assert_eq!("8,1".parse::<Square>(), Err(MoveError::OffBoard { row: 8, col: 1 }));
        assert!("x".parse::<Square>().is_err());

        let back = Position::new(
            board(
                "........
                 ........
                 ........
                 ....w...
                 ........
                 ........
                 ........
                 b.......",
            ),
            Color::White,
        );
        assert_eq!(
            validator.validate(&back, Color::White, sq(3, 4), sq(4, 5)),
            Err(MoveError::WrongDirection)
        );
    }

    #[test]
    fn test_king_rays() {
        let generator = MoveGenerator::new();
        let open = board(
            "........
             ........
             ........
             ........
             ...b....
             ........
             .W......
             ........",
        );
        let mut landings: Vec<Square> = generator
            .captures_for_piece(&open, sq(6, 1))
            .into_iter()
            .map(|mv| {
                assert_eq!(mv.captured, vec![sq(4, 3)]);
                mv.to
            })
            .collect();
        landings.sort();
        assert_eq!(landings, vec![sq(0, 7), sq(1, 6), sq(2, 5), sq(3, 4)]);

        let doubled = board(
            "........
             ........
             ........
             ....b...
             ...b....
             ........
             .W......
             ........",
        );
        assert!(generator.captures_for_piece(&doubled, sq(6, 1)).is_empty());

        let screened = board(
            "........
             ........
             ........
             ........
             ...b....
             ..w.....
             .W......
             ........",
        );
        assert!(generator.captures_for_piece(&screened, sq(6, 1)).is_empty());

        let validator = RulesValidator::new();
        let position = Position::new(doubled, Color::White);
        assert_eq!(
            validator.validate(&position, Color::White, sq(6, 1), sq(2, 5)),
            Err(MoveError::PathBlocked { from: sq(6, 1), to: sq(2, 5) })
        );
    }

    #[test]
    fn test_promotion() {
        let board = board(
            "........
             ..w.....
             ........
             ........
             ........
             ........
             .b......
             ........",
        );
        let validator = RulesValidator::new();
        let position = Position::new(board, Color::White);

        let outcome = validator.play(&position, Color::White, sq(1, 2), sq(0, 1)).unwrap();
        assert!(outcome.promoted);
        assert_eq!(outcome.position.board.get(sq(0, 1)), Some(Piece::king(Color::White)));

        // Hand the move back to White and check the new king slides.
        let crowned = Position::new(outcome.position.board, Color::White);
        let moves = MoveGenerator::new().legal_moves(&crowned);
        assert!(moves.iter().any(|mv| mv.to == sq(5, 6) && !mv.is_capture()));

        let slide = validator.play(&crowned, Color::White, sq(0, 1), sq(4, 5)).unwrap();
        assert!(!slide.promoted);
        assert_eq!(slide.position.board.get(sq(4, 5)), Some(Piece::king(Color::White)));
    }

    #[test]
    fn test_chain_must_continue_with_same_piece() {
        let board = board(
            ".b......
             ........
             ........
             ....b...
             ........
             ..b.....
             .w......
             ......w.",
        );
        let validator = RulesValidator::new();
        let position = Position::new(board, Color::White);

        let first = validator.play(&position, Color::White, sq(6, 1), sq(4, 3)).unwrap();
        assert!(first.was_capture);
        assert!(first.must_continue);
        assert_eq!(first.position.side_to_move, Color::White);
        assert_eq!(first.position.continuing_from, Some(sq(4, 3)));

        assert_eq!(
            validator.validate(&first.position, Color::White, sq(7, 6), sq(6, 7)),
            Err(MoveError::MustContinueFrom(sq(4, 3)))
        );

        let second = validator.play(&first.position, Color::White, sq(4, 3), sq(2, 5)).unwrap();
        assert!(!second.must_continue);
        assert_eq!(second.position.side_to_move, Color::Black);
        assert_eq!(second.position.board.count(Color::Black), 1);
    }

    #[test]
    fn test_king_chain_crosses_squares_vacated_this_turn() {
        // The first jump lifts (4, 3) at once, so the second ray back through it sees one enemy.
        let board = board(
            ".b......
             ........
             ........
             ........
             ...b....
             ..W.....
             .b......
             ........",
        );
        let validator = RulesValidator::new();
        let position = Position::new(board, Color::White);

        let first = validator.play(&position, Color::White, sq(5, 2), sq(3, 4)).unwrap();
        assert!(first.must_continue);
        assert!(first.position.board.is_empty_at(sq(4, 3)));

        let second = validator.play(&first.position, Color::White, sq(3, 4), sq(7, 0)).unwrap();
        assert_eq!(second.applied.captured, vec![sq(6, 1)]);
        assert_eq!(second.position.board.count(Color::Black), 1);
        assert_eq!(second.position.side_to_move, Color::Black);
    }

    #[test]
    fn test_random_playouts_respect_invariants() {
        let generator = MoveGenerator::new();
        let validator = RulesValidator::new();
        let evaluator = Evaluator::new();
        let mut rng = StdRng::seed_from_u64(2024);

        for _ in 0..20 {
            let mut position = Position::new(Board::new(), Color::White);
            for _ in 0..120 {
                let moves = generator.legal_moves(&position);
                if moves.is_empty() {
                    assert_eq!(generator.game_state(&position), GameState::Won(position.side_to_move.opposite()));
                    break;
                }

                let mover = position.side_to_move;
                let board = &position.board;
                if evaluator.terminal_score(board, Color::White).is_none() {
                    assert_eq!(
                        evaluator.evaluate(board, Color::White),
                        -evaluator.evaluate(board, Color::Black)
                    );
                }

                if moves[0].is_capture() {
                    for (square, _) in board.pieces_of(mover) {
                        for simple in generator.simple_moves_for_piece(board, square) {
                            assert!(validator.validate(&position, mover, simple.from, simple.to).is_err());
                        }
                    }
                }

                for mv in &moves {
                    assert!(mv.is_capture() == moves[0].is_capture());
                    assert!(board.is_empty_at(mv.to));
                    assert!(mv.to.is_dark());
                    for captured in &mv.captured {
                        assert_eq!(board.get(*captured).map(|p| p.color), Some(mover.opposite()));
                    }
                    assert_eq!(validator.validate(&position, mover, mv.from, mv.to).as_ref(), Ok(mv));

                    let moving = board.get(mv.from).unwrap();
                    let outcome = validator.apply(&position, mv.clone());
                    let after = &outcome.position.board;
                    assert_eq!(after.count(mover), board.count(mover));
                    assert_eq!(after.count(mover.opposite()), board.count(mover.opposite()) - mv.captured.len());
                    let landed = after.get(mv.to).unwrap();
                    assert_eq!(landed.color, mover);
                    assert!(landed.is_king || !moving.is_king);
                    if mv.to.row == mover.promotion_row() {
                        assert!(landed.is_king);
                    }
                }

                let mv = moves.choose(&mut rng).unwrap();
                position.make_move(mv);
            }
        }
    }

    #[test]
    fn test_evaluation_terminal_overrides() {
        let evaluator = Evaluator::new();
        let lone = board(
            "........
             ........
             ........
             ....w...
             ........
             ........
             ........
             ........",
        );
        assert_eq!(evaluator.evaluate(&lone, Color::White), evaluation::WIN_SCORE);
        assert_eq!(evaluator.evaluate(&lone, Color::Black), -evaluation::WIN_SCORE);

        let start = Board::new();
        assert_eq!(evaluator.evaluate(&start, Color::White), 0);
    }

    #[test]
    fn test_search_finds_blockade_win() {
        let position = Position::new(
            board(
                ".......b
                 ........
                 .....w.w
                 ........
                 ........
                 ........
                 ........
                 ........",
            ),
            Color::White,
        );
        let mut search = engine(Arc::new(ManualClock::new()));
        let request = SearchRequest::new(position, Difficulty::Hard).with_limits(limits(3));

        let outcome = search.find_best_move(&request).unwrap();
        assert_eq!(outcome.best_move, Move::new(sq(2, 7), sq(1, 6)));
        assert_eq!(outcome.source, MoveSource::Search);
        assert!(is_decisive(outcome.score));
    }

    #[test]
    fn test_search_is_deterministic_without_cache() {
        let position = Position::new(
            board(
                ".b.b.b.b
                 b.b.....
                 .....b..
                 ..b.w...
                 .w......
                 w...w.w.
                 .w.w....
                 w.....w.",
            ),
            Color::White,
        );
        let request = SearchRequest::new(position.clone(), Difficulty::Hard).with_limits(limits(4));

        let mut first = engine(Arc::new(ManualClock::new()));
        first.disable_cache();
        let mut second = engine(Arc::new(ManualClock::new()));
        second.disable_cache();

        let a = first.find_best_move(&request).unwrap();
        let b = second.find_best_move(&request).unwrap();
        assert_eq!(a.best_move, b.best_move);
        assert_eq!(a.score, b.score);
        assert_eq!(a.depth, 4);
        assert!(MoveGenerator::new().legal_moves(&position).contains(&a.best_move));
    }

    #[test]
    fn test_search_falls_back_when_no_depth_completes() {
        let clock = Arc::new(ManualClock::stepping(Duration::from_secs(10)));
        let mut search = engine(clock);
        let request = SearchRequest::new(Position::new(Board::new(), Color::White), Difficulty::Expert);

        let outcome = search.find_best_move(&request).unwrap();
        assert_eq!(outcome.source, MoveSource::Fallback);
        assert_eq!(outcome.depth, 0);
        assert!(MoveGenerator::new()
            .generate_moves(&Board::new(), Color::White)
            .contains(&outcome.best_move));
    }

    #[test]
    fn test_search_plays_book_moves_in_the_opening() {
        let mut search = engine(Arc::new(ManualClock::new()));
        search.set_book(Some(OpeningBook::standard()));
        let request = SearchRequest::new(Position::new(Board::new(), Color::Black), Difficulty::Expert);

        let outcome = search.find_best_move(&request).unwrap();
        assert_eq!(outcome.source, MoveSource::Book);
        assert!(OpeningBook::standard().contains(Color::Black, outcome.best_move.from, outcome.best_move.to));
    }

    /// Blind to threats and greedy for the row before promotion.
    fn promotion_hungry_evaluator() -> Evaluator {
        let mut evaluator = Evaluator::new();
        evaluator.near_promotion_bonus = 500;
        evaluator.threatened_piece_penalty = 0;
        evaluator.threatening_bonus = 0;
        evaluator
    }

    #[test]
    fn test_quiescence_sees_the_recapture() {
        // (2, 7) -> (1, 6) reaches the row before promotion but walks into the jump from (0, 5).
        let position = Position::new(
            board(
                ".....b..
                 ........
                 .......w
                 ........
                 ........
                 ........
                 .w......
                 ........",
            ),
            Color::White,
        );
        let request = SearchRequest::new(position, Difficulty::Hard).with_limits(limits(1));
        let hanging = Move::new(sq(2, 7), sq(1, 6));

        let mut flat = engine_with(Arc::new(ManualClock::new()), 0, 3);
        flat.disable_cache();
        flat.set_evaluator(promotion_hungry_evaluator());
        let flat = flat.find_best_move(&request).unwrap();

        let mut extended = engine_with(Arc::new(ManualClock::new()), 4, 3);
        extended.disable_cache();
        extended.set_evaluator(promotion_hungry_evaluator());
        let extended = extended.find_best_move(&request).unwrap();

        assert_eq!(flat.best_move, hanging);
        assert_ne!(extended.best_move, hanging);
        assert_ne!(flat.best_move, extended.best_move);
        assert_eq!(extended.source, MoveSource::Search);
    }

    #[test]
    fn test_random_move_chance() {
        let position = Position::new(Board::new(), Color::White);
        let legal = MoveGenerator::new().legal_moves(&position);
        let always = SearchLimits {
            random_move_chance: 1.0,
            ..limits(2)
        };

        for seed in 0..5 {
            let mut search = engine_with(Arc::new(ManualClock::new()), 4, seed);
            let request = SearchRequest::new(position.clone(), Difficulty::Easy).with_limits(always);
            let outcome = search.find_best_move(&request).unwrap();
            assert_eq!(outcome.source, MoveSource::Random);
            assert_eq!(outcome.depth, 0);
            assert!(legal.contains(&outcome.best_move));
        }

        for seed in 0..5 {
            let mut search = engine_with(Arc::new(ManualClock::new()), 4, seed);
            let request = SearchRequest::new(position.clone(), Difficulty::Easy).with_limits(limits(2));
            let outcome = search.find_best_move(&request).unwrap();
            assert_eq!(outcome.source, MoveSource::Search);
            assert_eq!(outcome.depth, 2);
        }
    }

    #[test]
    fn test_bot_finishes_its_own_capture_chain() {
        let (manager, sink, _) = manager(6);
        let human = ParticipantId::from("alice");
        let id = manager
            .create_bot_session(human.clone(), 20, Difficulty::Medium)
            .unwrap();
        manager.set_position(
            id,
            Position::new(
                board(
                    "........
                     b.......
                     .b......
                     ..w.....
                     ........
                     ....w...
                     ........
                     w.......",
                ),
                Color::White,
            ),
        );
        let ply = manager.snapshot(id).unwrap().ply;
        sink.drain();

        manager
            .submit_move(id, &human, MoveSubmission::new(sq(7, 0), sq(6, 1)))
            .unwrap();

        let bot_steps: Vec<(Square, Square, bool)> = sink
            .events()
            .into_iter()
            .filter_map(|event| match event {
                SessionEvent::MoveApplied { must_continue, record, .. } if record.color == Color::Black => {
                    Some((record.from, record.to, must_continue))
                }
                _ => None,
            })
            .collect();
        assert_eq!(
            bot_steps,
            vec![(sq(2, 1), sq(4, 3), true), (sq(4, 3), sq(6, 5), false)]
        );

        let snapshot = manager.snapshot(id).unwrap();
        assert_eq!(snapshot.ply, ply + 3);
        assert_eq!(snapshot.position.side_to_move, Color::White);
        assert_eq!(snapshot.position.board.count(Color::White), 1);
    }

    #[test]
    fn test_duplicate_submissions_race_to_one_winner() {
        let (manager, _, _) = manager(7);
        let id = manager
            .create_session(vec!["alice".into(), "bob".into()], 10)
            .unwrap();
        let snapshot = manager.snapshot(id).unwrap();
        let mover = match snapshot.position.side_to_move {
            Color::White => ParticipantId::from("alice"),
            Color::Black => ParticipantId::from("bob"),
        };
        let mv = MoveGenerator::new().legal_moves(&snapshot.position).remove(0);
        let submission = MoveSubmission::new(mv.from, mv.to).at_ply(snapshot.ply);

        let results = std::thread::scope(|scope| {
            let first = scope.spawn(|| manager.submit_move(id, &mover, submission));
            let second = scope.spawn(|| manager.submit_move(id, &mover, submission));
            [first.join().unwrap(), second.join().unwrap()]
        });

        assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
        assert!(results.iter().any(|result| matches!(
            result,
            Err(SessionError::StaleSubmission { .. }) | Err(SessionError::InvalidMove(_))
        )));
        assert_eq!(manager.snapshot(id).unwrap().ply, snapshot.ply + 1);
    }

    #[test]
    fn test_session_ends_when_side_is_wiped_out() {
        let (manager, sink, _) = manager(1);
        let id = manager
            .create_session(vec!["alice".into(), "bob".into()], 50)
            .unwrap();
        manager.set_position(
            id,
            Position::new(
                board(
                    "........
                     ........
                     ........
                     ....w...
                     .....b..
                     ........
                     ........
                     ........",
                ),
                Color::White,
            ),
        );

        let alice = ParticipantId::from("alice");
        let outcome = manager
            .submit_move(id, &alice, MoveSubmission::new(sq(3, 4), sq(5, 6)))
            .unwrap();
        assert!(outcome.was_capture);

        let ended = sink.events().into_iter().find_map(|event| match event {
            SessionEvent::SessionEnded { winner, stake_total, reason, history, .. } => {
                Some((winner, stake_total, reason, history))
            }
            _ => None,
        });
        let (winner, stake_total, reason, history) = ended.unwrap();
        assert_eq!((winner, stake_total, reason), (Color::White, 100, EndReason::Wipeout));
        assert_eq!(history.len(), 1);
        assert_eq!((history[0].from, history[0].to), (sq(3, 4), sq(5, 6)));
        assert_eq!(history[0].captured, vec![sq(4, 5)]);
        assert_eq!(manager.snapshot(id).unwrap_err(), SessionError::NotFound(id));
    }

    #[test]
    fn test_session_enforces_continuation_and_staleness() {
        let (manager, sink, _) = manager(2);
        let id = manager
            .create_session(vec!["alice".into(), "bob".into()], 10)
            .unwrap();
        manager.set_position(
            id,
            Position::new(
                board(
                    ".b......
                     ........
                     ........
                     ....b...
                     ........
                     ..b.....
                     .w......
                     ......w.",
                ),
                Color::White,
            ),
        );
        let alice = ParticipantId::from("alice");
        let bob = ParticipantId::from("bob");

        assert!(matches!(
            manager.submit_move(id, &bob, MoveSubmission::new(sq(0, 1), sq(1, 2))),
            Err(SessionError::InvalidMove(MoveError::NotYourTurn(Color::Black)))
        ));

        let first = manager
            .submit_move(id, &alice, MoveSubmission::new(sq(6, 1), sq(4, 3)).at_ply(0))
            .unwrap();
        assert!(first.must_continue);

        assert_eq!(
            manager.submit_move(id, &alice, MoveSubmission::new(sq(7, 6), sq(6, 7))),
            Err(SessionError::InvalidMove(MoveError::MustContinueFrom(sq(4, 3))))
        );
        assert_eq!(
            manager.submit_move(id, &alice, MoveSubmission::new(sq(4, 3), sq(2, 5)).at_ply(0)),
            Err(SessionError::StaleSubmission { expected: 0, actual: 1 })
        );

        let snapshot = manager.snapshot(id).unwrap();
        assert_eq!(snapshot.ply, 1);
        assert_eq!(snapshot.position.continuing_from, Some(sq(4, 3)));

        manager
            .submit_move(id, &alice, MoveSubmission::new(sq(4, 3), sq(2, 5)).at_ply(1))
            .unwrap();
        let snapshot = manager.snapshot(id).unwrap();
        assert_eq!(snapshot.position.side_to_move, Color::Black);
        assert_eq!(snapshot.history.len(), 2);

        let rejected = sink
            .events()
            .iter()
            .filter(|event| matches!(event, SessionEvent::InvalidMove { .. }))
            .count();
        assert_eq!(rejected, 3);
    }

    #[test]
    fn test_waiting_room_lifecycle() {
        let (manager, sink, _) = manager(3);
        let id = manager.create_session(vec!["alice".into()], 5).unwrap();
        assert_eq!(manager.open_sessions(), vec![id]);
        assert_eq!(manager.snapshot(id).unwrap().status, SessionStatus::WaitingForOpponent);

        assert_eq!(
            manager.join_session(id, "alice".into()),
            Err(SessionError::InvalidParticipants)
        );
        manager.join_session(id, "bob".into()).unwrap();
        assert!(manager.open_sessions().is_empty());
        assert!(matches!(sink.events()[0], SessionEvent::SessionStarted { .. }));

        let lonely = manager.create_session(vec!["carol".into()], 5).unwrap();
        manager.disconnect(&"carol".into());
        assert_eq!(manager.snapshot(lonely).unwrap_err(), SessionError::NotFound(lonely));
        assert_eq!(manager.create_session(vec![], 5), Err(SessionError::InvalidParticipants));
    }

    #[test]
    fn test_turn_timeout_forfeits() {
        let (manager, sink, clock) = manager(4);
        let id = manager
            .create_session(vec!["alice".into(), "bob".into()], 10)
            .unwrap();
        let side = manager.snapshot(id).unwrap().position.side_to_move;

        assert!(manager.expire_turns().is_empty());
        clock.advance(Duration::from_secs(31));
        assert_eq!(manager.expire_turns(), vec![id]);

        let ended = sink.events().into_iter().find_map(|event| match event {
            SessionEvent::SessionEnded { winner, reason, .. } => Some((winner, reason)),
            _ => None,
        });
        assert_eq!(ended, Some((side.opposite(), EndReason::Timeout)));
        assert_eq!(manager.session_count(), 0);
    }

    #[test]
    fn test_bot_replies_to_every_human_move() {
        let (manager, _, _) = manager(5);
        let human = ParticipantId::from("alice");
        let id = manager
            .create_bot_session(human.clone(), 20, Difficulty::Easy)
            .unwrap();
        let generator = MoveGenerator::new();

        for _ in 0..3 {
            let snapshot = match manager.snapshot(id) {
                Ok(snapshot) => snapshot,
                Err(_) => break,
            };
            assert_eq!(snapshot.position.side_to_move, Color::White);
            let mv = generator.legal_moves(&snapshot.position).remove(0);
            let before = snapshot.ply;

            let outcome = manager
                .submit_move(id, &human, MoveSubmission::new(mv.from, mv.to).at_ply(before))
                .unwrap();
            if outcome.must_continue {
                continue;
            }
            if let Ok(after) = manager.snapshot(id) {
                assert!(after.ply > before + 1);
            }
        }
    }
}
