/// Iterative-deepening negamax with alpha-beta pruning and a capture
/// quiescence at the leaves. The principal variation lives in a
/// triangular table refreshed whenever alpha improves; the previous
/// iteration's PV is searched first, then captures ordered MVV-LVA,
/// then promotions, then quiet moves in generation order.
///
/// Three stop conditions are polled on entry to every node: the shared
/// stop flag, the node cap, and (every 2048 nodes) the wall clock. On
/// abort the best move of the last fully completed depth stands.

use crate::bitboard::*;
use crate::eval;
use crate::movegen;
use crate::moves::*;
use crate::position::Position;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub const MAX_PLY: usize = 64;

/// User-imposed search limits; unset fields mean unlimited.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub depth: i32,
    pub movetime: Option<u64>,
    pub nodes: Option<u64>,
}

impl Default for Limits {
    fn default() -> Self {
        Limits { depth: (MAX_PLY - 1) as i32, movetime: None, nodes: None }
    }
}

pub struct SearchResult {
    pub best_move: Move,
    pub score: i32,
    pub depth: i32,
    pub nodes: u64,
    pub time_ms: u64,
}

struct PvTable {
    table: [[Move; MAX_PLY]; MAX_PLY],
    len: [usize; MAX_PLY],
}

impl PvTable {
    fn new() -> Self {
        PvTable { table: [[Move::NONE; MAX_PLY]; MAX_PLY], len: [0; MAX_PLY] }
    }

    /// Record `m` as best at `ply` and pull up the child line behind it.
    fn update(&mut self, ply: usize, m: Move) {
        self.table[ply][0] = m;
        let child_len = self.len[ply + 1].min(MAX_PLY - 1 - ply);
        for i in 0..child_len {
            self.table[ply][i + 1] = self.table[ply + 1][i];
        }
        self.len[ply] = child_len + 1;
    }
}

struct Search {
    limits: Limits,
    stop: Arc<AtomicBool>,
    start: Instant,
    nodes: u64,
    stopped: bool,
    pv: PvTable,
    prev_pv: [Move; MAX_PLY],
    prev_pv_len: usize,
    follow_pv: bool,
}

impl Search {
    fn new(limits: Limits, stop: Arc<AtomicBool>) -> Self {
        Search {
            limits,
            stop,
            start: Instant::now(),
            nodes: 0,
            stopped: false,
            pv: PvTable::new(),
            prev_pv: [Move::NONE; MAX_PLY],
            prev_pv_len: 0,
            follow_pv: false,
        }
    }

    /// Poll the abort conditions. The stop flag and node cap are read at
    /// every node, the clock every 2048 nodes.
    fn should_stop(&mut self) -> bool {
        if self.stopped {
            return true;
        }
        if self.stop.load(Ordering::Relaxed) {
            self.stopped = true;
            return true;
        }
        if let Some(cap) = self.limits.nodes {
            if self.nodes >= cap {
                self.stopped = true;
                return true;
            }
        }
        if self.nodes & 2047 == 0 {
            if let Some(ms) = self.limits.movetime {
                if self.start.elapsed().as_millis() as u64 >= ms {
                    self.stopped = true;
                    return true;
                }
            }
        }
        false
    }

    fn score_move(&self, pos: &Position, m: Move, ply: usize) -> i32 {
        if self.follow_pv && ply < self.prev_pv_len && m == self.prev_pv[ply] {
            return 1_000_000;
        }
        if m.is_capture() {
            let attacker = pos.piece_at(m.from_sq()).map(|(_, p)| p).unwrap_or(Piece::Pawn);
            let victim = if m.is_en_passant() {
                Piece::Pawn
            } else {
                pos.piece_at(m.to_sq()).map(|(_, p)| p).unwrap_or(Piece::Pawn)
            };
            return 100_000 + eval::mvv_lva(attacker, victim);
        }
        if m.is_promotion() {
            let promo = m.promotion_piece().unwrap_or(Piece::Queen);
            return 90_000 + eval::PIECE_VALUES[promo.index()];
        }
        0
    }

    fn negamax(&mut self, pos: &mut Position, depth: i32, mut alpha: i32, beta: i32, ply: usize) -> i32 {
        self.pv.len[ply] = 0;

        if self.should_stop() {
            return alpha;
        }
        if depth <= 0 {
            return self.quiescence(pos, alpha, beta, ply);
        }
        self.nodes += 1;

        if ply > 0 && (pos.halfmove >= 100 || pos.is_insufficient_material()) {
            return 0;
        }
        if ply >= MAX_PLY - 1 {
            return eval::evaluate(pos);
        }

        let mut list = MoveList::new();
        movegen::generate_moves(pos, &mut list);
        if list.is_empty() {
            // shorter mates score higher through the ply offset
            return if pos.in_check() { -(eval::MATE_SCORE - ply as i32) } else { 0 };
        }

        if self.follow_pv {
            let on_path = ply < self.prev_pv_len && list.contains(self.prev_pv[ply]);
            if !on_path {
                self.follow_pv = false;
            }
        }

        let mut scores = [0i32; MAX_MOVES];
        for i in 0..list.len() {
            scores[i] = self.score_move(pos, list.moves[i], ply);
        }

        for i in 0..list.len() {
            pick_move(&mut list, &mut scores, i);
            let m = list.moves[i];

            pos.make(m);
            let score = -self.negamax(pos, depth - 1, -beta, -alpha, ply + 1);
            pos.unmake(m);

            if self.stopped {
                return alpha;
            }
            if score >= beta {
                return beta;
            }
            if score > alpha {
                alpha = score;
                self.pv.update(ply, m);
            }
        }

        alpha
    }

    fn quiescence(&mut self, pos: &mut Position, mut alpha: i32, beta: i32, ply: usize) -> i32 {
        self.pv.len[ply] = 0;

        if self.should_stop() {
            return alpha;
        }
        self.nodes += 1;

        let stand_pat = eval::evaluate(pos);
        if stand_pat >= beta {
            return beta;
        }
        if stand_pat > alpha {
            alpha = stand_pat;
        }
        if ply >= MAX_PLY - 1 {
            return alpha;
        }

        let mut list = MoveList::new();
        movegen::generate_captures(pos, &mut list);

        let mut scores = [0i32; MAX_MOVES];
        for i in 0..list.len() {
            scores[i] = self.score_move(pos, list.moves[i], ply);
        }

        for i in 0..list.len() {
            pick_move(&mut list, &mut scores, i);
            let m = list.moves[i];

            pos.make(m);
            let score = -self.quiescence(pos, -beta, -alpha, ply + 1);
            pos.unmake(m);

            if self.stopped {
                return alpha;
            }
            if score >= beta {
                return beta;
            }
            if score > alpha {
                alpha = score;
                self.pv.update(ply, m);
            }
        }

        alpha
    }
}

/// Pick the best remaining move and swap it to position `start`.
fn pick_move(list: &mut MoveList, scores: &mut [i32; MAX_MOVES], start: usize) {
    let mut best = start;
    for i in (start + 1)..list.len() {
        if scores[i] > scores[best] {
            best = i;
        }
    }
    if best != start {
        list.moves.swap(start, best);
        scores.swap(start, best);
    }
}

/// Iterative deepening driver. Publishes an `info` line after every
/// completed depth; the caller announces the final best move.
pub fn run(pos: &mut Position, limits: Limits, stop: Arc<AtomicBool>) -> SearchResult {
    let mut s = Search::new(limits, stop);

    let mut root_moves = MoveList::new();
    movegen::generate_moves(pos, &mut root_moves);
    if root_moves.is_empty() {
        let score = if pos.in_check() { -eval::MATE_SCORE } else { 0 };
        return SearchResult { best_move: Move::NONE, score, depth: 0, nodes: 0, time_ms: 0 };
    }

    // even an instant stop leaves a legal answer
    let mut best_move = root_moves.moves[0];
    let mut best_score = 0;
    let mut completed = 0;

    let max_depth = limits.depth.clamp(1, (MAX_PLY - 1) as i32);
    for depth in 1..=max_depth {
        s.follow_pv = s.prev_pv_len > 0;
        let score = s.negamax(pos, depth, -eval::INFINITY, eval::INFINITY, 0);

        if s.stopped {
            // aborted iteration: stand on the last completed depth, but a
            // partially searched first depth still beats the blind fallback
            if depth == 1 && s.pv.len[0] > 0 {
                best_move = s.pv.table[0][0];
            }
            break;
        }

        if s.pv.len[0] > 0 {
            best_move = s.pv.table[0][0];
            s.prev_pv_len = s.pv.len[0];
            for i in 0..s.prev_pv_len {
                s.prev_pv[i] = s.pv.table[0][i];
            }
        }
        best_score = score;
        completed = depth;

        let elapsed = s.start.elapsed().as_millis() as u64;
        let nps = if elapsed > 0 { s.nodes * 1000 / elapsed } else { 0 };
        let score_text = if eval::is_mate_score(score) {
            format!("score mate {}", eval::mate_in(score))
        } else {
            format!("score cp {}", score)
        };
        let pv_text = s.pv.table[0][..s.pv.len[0]]
            .iter()
            .map(|m| m.to_uci())
            .collect::<Vec<_>>()
            .join(" ");
        let line = format!(
            "info depth {} {} nodes {} time {} nps {} pv {}",
            depth, score_text, s.nodes, elapsed, nps, pv_text
        );
        println!("{}", line);
        let _ = std::io::stdout().flush();
        log::debug!("> {}", line);

        if eval::is_mate_score(score) {
            break;
        }
        // past half the budget another full iteration will not fit
        if let Some(ms) = s.limits.movetime {
            if elapsed * 2 >= ms {
                break;
            }
        }
    }

    SearchResult {
        best_move,
        score: best_score,
        depth: completed,
        nodes: s.nodes,
        time_ms: s.start.elapsed().as_millis() as u64,
    }
}

/// Convenience wrapper for searches nobody will interrupt (tests, bench).
pub fn run_uninterrupted(pos: &mut Position, limits: Limits) -> SearchResult {
    run(pos, limits, Arc::new(AtomicBool::new(false)))
}
