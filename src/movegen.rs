/// Legal move generation.
///
/// One pass produces exactly the legal moves: king steps avoid a danger
/// map probed with the king lifted off the board, non-king moves are
/// restricted to a check-resolution mask (capture the checker or block
/// on the segment between it and the king), pinned men are confined to
/// their pinning line, and en-passant is validated by occupancy surgery.
/// `Position::make` can therefore apply any generated move unchecked.

use crate::bitboard::*;
use crate::geometry;
use crate::magics;
use crate::moves::*;
use crate::position::*;

/// All legal moves for the side to move.
pub fn generate_moves(pos: &Position, list: &mut MoveList) {
    generate(pos, list, false);
}

/// Legal captures and promotions only, for the quiescence search.
pub fn generate_captures(pos: &Position, list: &mut MoveList) {
    generate(pos, list, true);
}

/// Every square the `by` side attacks under the given occupancy.
fn attacked_squares(pos: &Position, by: Color, occ: Bitboard) -> Bitboard {
    let their = &pos.pieces[by.index()];

    let mut att = match by {
        Color::White => white_pawn_attacks(their[Piece::Pawn.index()]),
        Color::Black => black_pawn_attacks(their[Piece::Pawn.index()]),
    };
    att |= geometry::king_attacks(pos.king_sq(by));

    let mut knights = their[Piece::Knight.index()];
    while knights != 0 {
        att |= geometry::knight_attacks(pop_lsb(&mut knights));
    }
    let mut diag = their[Piece::Bishop.index()] | their[Piece::Queen.index()];
    while diag != 0 {
        att |= magics::bishop_attacks(pop_lsb(&mut diag), occ);
    }
    let mut straight = their[Piece::Rook.index()] | their[Piece::Queen.index()];
    while straight != 0 {
        att |= magics::rook_attacks(pop_lsb(&mut straight), occ);
    }
    att
}

/// After playing en passant both pawns leave their rank at once, which
/// ordinary pin handling never sees. Redo the occupancy by hand and ask
/// whether any enemy slider then reaches the king.
fn ep_exposes_king(pos: &Position, from: u8, to: u8, cap_sq: u8, us: Color) -> bool {
    let king = pos.king_sq(us);
    let them = us.flip();
    let their = &pos.pieces[them.index()];
    let occ = pos.all_occupancy ^ square_bb(from) ^ square_bb(cap_sq) | square_bb(to);

    magics::bishop_attacks(king, occ)
        & (their[Piece::Bishop.index()] | their[Piece::Queen.index()])
        != 0
        || magics::rook_attacks(king, occ)
            & (their[Piece::Rook.index()] | their[Piece::Queen.index()])
            != 0
}

fn generate(pos: &Position, list: &mut MoveList, caps_only: bool) {
    let us = pos.side;
    let them = us.flip();
    let our = pos.occupancy[us.index()];
    let their = pos.occupancy[them.index()];
    let occ = pos.all_occupancy;
    let king = pos.king_sq(us);

    // King moves first: the danger map is probed with the king off the
    // board, so stepping away along a checking ray stays forbidden.
    let danger = attacked_squares(pos, them, occ ^ square_bb(king));
    let king_dests = geometry::king_attacks(king) & !our & !danger;
    let mut kcaps = king_dests & their;
    while kcaps != 0 {
        list.push(Move::new(king, pop_lsb(&mut kcaps), FLAG_CAPTURE));
    }
    if !caps_only {
        let mut kquiets = king_dests & !their;
        while kquiets != 0 {
            list.push(Move::new(king, pop_lsb(&mut kquiets), FLAG_QUIET));
        }
    }

    let checkers = pos.attackers_to(king, them, occ);
    if popcount(checkers) >= 2 {
        // double check: nothing but the king can help
        return;
    }

    // With one checker, non-king moves must capture it or block on the
    // segment to the king. Unchecked, they may go anywhere sensible.
    let (capture_mask, push_mask) = if checkers != 0 {
        (checkers, geometry::between(king, lsb(checkers)))
    } else {
        (their, !occ)
    };
    let targets = if caps_only { capture_mask } else { capture_mask | push_mask };

    // Pins: enemy sliders aligned with our king through exactly one of
    // our men. That man only moves on the pinning line.
    let their_pieces = &pos.pieces[them.index()];
    let snipers = magics::bishop_attacks(king, 0)
        & (their_pieces[Piece::Bishop.index()] | their_pieces[Piece::Queen.index()])
        | magics::rook_attacks(king, 0)
            & (their_pieces[Piece::Rook.index()] | their_pieces[Piece::Queen.index()]);
    let mut pinned: Bitboard = 0;
    let mut pin_ray = [Bitboard::MAX; 64];
    let mut sniper_bb = snipers;
    while sniper_bb != 0 {
        let sniper = pop_lsb(&mut sniper_bb);
        let blockers = geometry::between(king, sniper) & occ;
        if popcount(blockers) == 1 && blockers & our != 0 {
            pinned |= blockers;
            pin_ray[lsb(blockers) as usize] = geometry::line(king, sniper);
        }
    }

    // Knights: a pinned knight never has a legal move.
    let mut knights = pos.pieces[us.index()][Piece::Knight.index()] & !pinned;
    while knights != 0 {
        let from = pop_lsb(&mut knights);
        let atts = geometry::knight_attacks(from) & targets;
        push_piece_moves(list, from, atts, their, caps_only);
    }

    // Sliders keep to their pinning line when pinned.
    for (piece, attacks) in [
        (Piece::Bishop, magics::bishop_attacks as fn(u8, Bitboard) -> Bitboard),
        (Piece::Rook, magics::rook_attacks),
        (Piece::Queen, magics::queen_attacks),
    ] {
        let mut bb = pos.pieces[us.index()][piece.index()];
        while bb != 0 {
            let from = pop_lsb(&mut bb);
            let mut atts = attacks(from, occ) & targets;
            if pinned & square_bb(from) != 0 {
                atts &= pin_ray[from as usize];
            }
            push_piece_moves(list, from, atts, their, caps_only);
        }
    }

    // Pawns, square by square so pin lines and promotions stay simple.
    let promo_rank = match us {
        Color::White => RANK_8,
        Color::Black => RANK_1,
    };
    let mut pawns = pos.pieces[us.index()][Piece::Pawn.index()];
    while pawns != 0 {
        let from = pop_lsb(&mut pawns);
        let allow = pin_ray[from as usize];

        let mut caps = geometry::pawn_attacks(us, from) & capture_mask & allow;
        while caps != 0 {
            let to = pop_lsb(&mut caps);
            if square_bb(to) & promo_rank != 0 {
                for flag in [FLAG_PROMO_CAP_Q, FLAG_PROMO_CAP_R, FLAG_PROMO_CAP_B, FLAG_PROMO_CAP_N] {
                    list.push(Move::new(from, to, flag));
                }
            } else {
                list.push(Move::new(from, to, FLAG_CAPTURE));
            }
        }

        let one = geometry::pawn_push(us, from) & !occ;
        if one != 0 {
            let to = lsb(one);
            if one & push_mask & allow != 0 {
                if square_bb(to) & promo_rank != 0 {
                    // promotions count as tactical even in captures-only mode
                    for flag in [FLAG_PROMO_Q, FLAG_PROMO_R, FLAG_PROMO_B, FLAG_PROMO_N] {
                        list.push(Move::new(from, to, flag));
                    }
                } else if !caps_only {
                    list.push(Move::new(from, to, FLAG_QUIET));
                }
            }
            if !caps_only {
                let two = geometry::pawn_double_push(us, from) & !occ & push_mask & allow;
                if two != 0 {
                    list.push(Move::new(from, lsb(two), FLAG_DOUBLE_PAWN));
                }
            }
        }
    }

    // En passant: worth trying only if it takes the checker or drops a
    // blocker on the checking ray; legality needs the surgery test.
    if let Some(ep) = pos.ep_square {
        let cap_sq = match us {
            Color::White => ep - 8,
            Color::Black => ep + 8,
        };
        if square_bb(cap_sq) & capture_mask != 0 || square_bb(ep) & push_mask != 0 {
            let mut candidates = geometry::pawn_attacks(them, ep) & pos.pieces[us.index()][Piece::Pawn.index()];
            while candidates != 0 {
                let from = pop_lsb(&mut candidates);
                if !ep_exposes_king(pos, from, ep, cap_sq, us) {
                    list.push(Move::new(from, ep, FLAG_EP_CAPTURE));
                }
            }
        }
    }

    // Castling, never while in check. The transit squares come from the
    // danger map, which is exact here (any rank attack reaching them
    // through the king square would already be check).
    if !caps_only && checkers == 0 {
        let (ks_right, qs_right, e, g, c, rook_k, rook_q) = match us {
            Color::White => (WK_CASTLE, WQ_CASTLE, sq::E1, sq::G1, sq::C1, sq::H1, sq::A1),
            Color::Black => (BK_CASTLE, BQ_CASTLE, sq::E8, sq::G8, sq::C8, sq::H8, sq::A8),
        };
        if pos.castling & ks_right != 0
            && geometry::between(e, rook_k) & occ == 0
            && geometry::line(e, g) & danger == 0
        {
            list.push(Move::new(e, g, FLAG_KING_CASTLE));
        }
        if pos.castling & qs_right != 0
            && geometry::between(e, rook_q) & occ == 0
            && geometry::line(e, c) & danger == 0
        {
            list.push(Move::new(e, c, FLAG_QUEEN_CASTLE));
        }
    }
}

#[inline]
fn push_piece_moves(list: &mut MoveList, from: u8, atts: Bitboard, their: Bitboard, caps_only: bool) {
    let mut caps = atts & their;
    while caps != 0 {
        list.push(Move::new(from, pop_lsb(&mut caps), FLAG_CAPTURE));
    }
    if !caps_only {
        let mut quiets = atts & !their;
        while quiets != 0 {
            list.push(Move::new(from, pop_lsb(&mut quiets), FLAG_QUIET));
        }
    }
}

// ============================================================
// Perft
// ============================================================

/// Leaf count of the legal move tree to `depth`; the standard oracle
/// for generator correctness.
pub fn perft(pos: &mut Position, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }
    let mut list = MoveList::new();
    generate_moves(pos, &mut list);
    if depth == 1 {
        return list.len() as u64;
    }
    let mut nodes = 0;
    for i in 0..list.len() {
        let m = list.moves[i];
        pos.make(m);
        nodes += perft(pos, depth - 1);
        pos.unmake(m);
    }
    nodes
}

/// Perft with a per-root-move breakdown, for hunting generator bugs.
pub fn perft_divide(pos: &mut Position, depth: u32) -> u64 {
    let mut list = MoveList::new();
    generate_moves(pos, &mut list);

    let mut total = 0;
    for i in 0..list.len() {
        let m = list.moves[i];
        pos.make(m);
        let count = if depth > 1 { perft(pos, depth - 1) } else { 1 };
        pos.unmake(m);
        println!("{}: {}", m.to_uci(), count);
        total += count;
    }
    println!();
    println!("Total: {}", total);
    total
}
