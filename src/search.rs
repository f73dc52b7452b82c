use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::book::OpeningBook;
use crate::clock::{Clock, Deadline};
use crate::config::{Difficulty, EngineConfig, SearchLimits};
use crate::evaluation::{is_decisive, Evaluator, WIN_SCORE};
use crate::movegen::{Move, MoveGenerator, Position};
use crate::transposition::{NodeType, TranspositionEntry, TranspositionTable};
use crate::zobrist::position_key;

/// Added at the root for every piece a move captures.
pub const CAPTURE_BONUS: i32 = 50;

const INFINITY: i32 = 2 * WIN_SCORE;

/// A read-only snapshot handed to the engine.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub position: Position,
    pub difficulty: Difficulty,
    pub limits: SearchLimits,
}

impl SearchRequest {
    pub fn new(position: Position, difficulty: Difficulty) -> Self {
        Self {
            position,
            difficulty,
            limits: difficulty.limits(),
        }
    }

    pub fn with_limits(mut self, limits: SearchLimits) -> Self {
        self.limits = limits;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveSource {
    OnlyMove,
    Book,
    Random,
    Search,
    /// No depth finished before the deadline; a random legal move was played.
    Fallback,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub best_move: Move,
    pub score: i32,
    /// Deepest fully completed iteration.
    pub depth: u32,
    pub nodes: u64,
    pub source: MoveSource,
}

pub struct Search {
    evaluator: Evaluator,
    move_generator: MoveGenerator,
    transposition_table: Option<Arc<TranspositionTable>>,
    book: Option<OpeningBook>,
    clock: Arc<dyn Clock>,
    rng: StdRng,
    quiescence_depth: u32,
    nodes_searched: u64,
    aborted: bool,
}

impl Search {
    pub fn with_shared_table(
        config: &EngineConfig,
        transposition_table: Arc<TranspositionTable>,
        clock: Arc<dyn Clock>,
        rng: StdRng,
    ) -> Self {
        Self {
            evaluator: Evaluator::new(),
            move_generator: MoveGenerator::new(),
            transposition_table: Some(transposition_table),
            book: config.opening_book.then(OpeningBook::standard),
            clock,
            rng,
            quiescence_depth: config.quiescence_depth,
            nodes_searched: 0,
            aborted: false,
        }
    }

    pub fn disable_cache(&mut self) {
        self.transposition_table = None;
    }

    pub fn set_book(&mut self, book: Option<OpeningBook>) {
        self.book = book;
    }

    /// Replaces the static evaluator, e.g. with retuned weights.
    pub fn set_evaluator(&mut self, evaluator: Evaluator) {
        self.evaluator = evaluator;
    }

    /// Picks a move for the side to move, or `None` if it has no legal move.
    pub fn find_best_move(&mut self, request: &SearchRequest) -> Option<SearchOutcome> {
        self.nodes_searched = 0;
        self.aborted = false;

        let position = &request.position;
        let mut moves = self.move_generator.legal_moves(position);
        if moves.is_empty() {
            return None;
        }
        if moves.len() == 1 {
            return Some(self.outcome(moves.remove(0), 0, 0, MoveSource::OnlyMove));
        }

        if let Some(book) = &self.book {
            if let Some(mv) = book.candidates(position, &moves).choose(&mut self.rng) {
                let mv = (*mv).clone();
                return Some(self.outcome(mv, 0, 0, MoveSource::Book));
            }
        }

        let chance = request.limits.random_move_chance.clamp(0.0, 1.0);
        if chance > 0.0 && self.rng.gen_bool(chance) {
            return Some(self.random_outcome(moves, MoveSource::Random));
        }

        let deadline = Deadline::after(self.clock.as_ref(), request.limits.time_budget);
        self.order_moves(position, &mut moves);

        let mut best: Option<(Move, i32, u32)> = None;
        for depth in 1..=request.limits.max_depth.max(1) {
            let Some((index, score)) = self.search_root(position, &moves, depth, &deadline) else {
                debug!(depth, nodes = self.nodes_searched, "iteration abandoned at deadline");
                break;
            };
            debug!(depth, score, best = %moves[index], nodes = self.nodes_searched, "iteration complete");

            // Search the previous best first on the next iteration.
            let mv = moves.remove(index);
            moves.insert(0, mv.clone());
            best = Some((mv, score, depth));

            if is_decisive(score) {
                break;
            }
        }

        match best {
            Some((mv, score, depth)) => Some(self.outcome(mv, score, depth, MoveSource::Search)),
            None => Some(self.random_outcome(moves, MoveSource::Fallback)),
        }
    }

    /// One full-width iteration. `None` when the deadline hit before every root move was searched.
    fn search_root(
        &mut self,
        position: &Position,
        moves: &[Move],
        depth: u32,
        deadline: &Deadline,
    ) -> Option<(usize, i32)> {
        let mut alpha = -INFINITY;
        let beta = INFINITY;
        let mut best: Option<(usize, i32)> = None;

        for (index, mv) in moves.iter().enumerate() {
            if deadline.is_expired(self.clock.as_ref()) {
                return None;
            }
            let mut child = position.clone();
            child.make_move(mv);

            let score = self.child_score(position, &child, depth - 1, alpha, beta, 1, deadline);
            if self.aborted {
                return None;
            }
            alpha = alpha.max(score);

            let total = score + CAPTURE_BONUS * mv.captured.len() as i32;
            if best.map_or(true, |(_, best_total)| total > best_total) {
                best = Some((index, total));
            }
        }
        best
    }

    /// Negamax value of `child` seen from the parent's side to move. A capture
    /// that continues keeps the same side on move, so the window is not flipped.
    #[allow(clippy::too_many_arguments)]
    fn child_score(
        &mut self,
        parent: &Position,
        child: &Position,
        depth: u32,
        alpha: i32,
        beta: i32,
        ply: i32,
        deadline: &Deadline,
    ) -> i32 {
        if child.side_to_move == parent.side_to_move {
            self.negamax(child, depth, alpha, beta, ply, deadline)
        } else {
            -self.negamax(child, depth, -beta, -alpha, ply, deadline)
        }
    }

    fn negamax(
        &mut self,
        position: &Position,
        depth: u32,
        mut alpha: i32,
        beta: i32,
        ply: i32,
        deadline: &Deadline,
    ) -> i32 {
        self.nodes_searched += 1;
        if deadline.is_expired(self.clock.as_ref()) {
            self.aborted = true;
            return 0;
        }

        let mut moves = self.move_generator.legal_moves(position);
        if moves.is_empty() {
            return -(WIN_SCORE - ply);
        }
        if depth == 0 {
            return self.quiescence_search(position, moves, alpha, beta, self.quiescence_depth, ply, deadline);
        }

        let hash = position_key(position);
        if let Some(table) = &self.transposition_table {
            if let Some(score) = table.probe(hash, depth, alpha, beta) {
                return score;
            }
        }

        self.order_moves(position, &mut moves);

        let original_alpha = alpha;
        let mut best_score = -INFINITY;
        for mv in &moves {
            let mut child = position.clone();
            child.make_move(mv);

            let score = self.child_score(position, &child, depth - 1, alpha, beta, ply + 1, deadline);
            if self.aborted {
                return 0;
            }

            best_score = best_score.max(score);
            alpha = alpha.max(score);
            if beta <= alpha {
                break;
            }
        }

        if let Some(table) = &self.transposition_table {
            let node_type = if best_score <= original_alpha {
                NodeType::UpperBound
            } else if best_score >= beta {
                NodeType::LowerBound
            } else {
                NodeType::Exact
            };
            table.store(
                hash,
                TranspositionEntry {
                    depth,
                    score: best_score,
                    node_type,
                },
            );
        }

        best_score
    }

    /// Past the depth limit, keep playing out forced captures so a position is
    /// never scored halfway through an exchange.
    #[allow(clippy::too_many_arguments)]
    fn quiescence_search(
        &mut self,
        position: &Position,
        moves: Vec<Move>,
        mut alpha: i32,
        beta: i32,
        remaining: u32,
        ply: i32,
        deadline: &Deadline,
    ) -> i32 {
        let quiet = !moves.first().is_some_and(Move::is_capture);
        if quiet || remaining == 0 {
            return self.evaluator.evaluate(&position.board, position.side_to_move);
        }

        let mut best_score = -INFINITY;
        for mv in &moves {
            let mut child = position.clone();
            child.make_move(mv);

            self.nodes_searched += 1;
            if deadline.is_expired(self.clock.as_ref()) {
                self.aborted = true;
                return 0;
            }
            let child_moves = self.move_generator.legal_moves(&child);
            let same_side = child.side_to_move == position.side_to_move;
            let score = if child_moves.is_empty() {
                if same_side {
                    -(WIN_SCORE - ply - 1)
                } else {
                    WIN_SCORE - ply - 1
                }
            } else if same_side {
                self.quiescence_search(&child, child_moves, alpha, beta, remaining - 1, ply + 1, deadline)
            } else {
                -self.quiescence_search(&child, child_moves, -beta, -alpha, remaining - 1, ply + 1, deadline)
            };
            if self.aborted {
                return 0;
            }

            best_score = best_score.max(score);
            alpha = alpha.max(score);
            if beta <= alpha {
                break;
            }
        }
        best_score
    }

    /// Captures first (most pieces taken first), then by the static value of the
    /// resulting position for the mover.
    fn order_moves(&self, position: &Position, moves: &mut Vec<Move>) {
        let mover = position.side_to_move;
        let mut scored: Vec<(i32, Move)> = moves
            .drain(..)
            .map(|mv| {
                let mut child = position.clone();
                child.make_move(&mv);
                (self.evaluator.evaluate(&child.board, mover), mv)
            })
            .collect();

        scored.sort_by(|(score_a, a), (score_b, b)| {
            b.captured
                .len()
                .cmp(&a.captured.len())
                .then(score_b.cmp(score_a))
        });
        moves.extend(scored.into_iter().map(|(_, mv)| mv));
    }

    fn random_outcome(&mut self, mut moves: Vec<Move>, source: MoveSource) -> SearchOutcome {
        let index = self.rng.gen_range(0..moves.len());
        self.outcome(moves.swap_remove(index), 0, 0, source)
    }

    fn outcome(&self, best_move: Move, score: i32, depth: u32, source: MoveSource) -> SearchOutcome {
        SearchOutcome {
            best_move,
            score,
            depth,
            nodes: self.nodes_searched,
            source,
        }
    }
}
