/// Precomputed tables that depend only on board geometry, never on
/// occupancy: leaper attacks, pawn steps, diagonals, line segments
/// between square pairs, king rings and passed-pawn spans.
///
/// Built once at startup via `init()`; rebuilding yields identical tables.

use crate::bitboard::*;
use std::sync::OnceLock;

pub struct Geometry {
    knight: [Bitboard; 64],
    king: [Bitboard; 64],
    /// Squares exactly two king steps away (Chebyshev distance 2).
    outer_ring: [Bitboard; 64],
    pawn_attacks: [[Bitboard; 64]; COLOR_COUNT],
    pawn_push: [[Bitboard; 64]; COLOR_COUNT],
    pawn_double_push: [[Bitboard; 64]; COLOR_COUNT],
    diag_a1h8: [Bitboard; 64],
    diag_a8h1: [Bitboard; 64],
    /// line[a][b]: the half-open segment (a, b] of the shared rank, file
    /// or diagonal; zero when a and b share none (or a == b).
    line: [[Bitboard; 64]; 64],
    /// between[a][b]: squares strictly between a and b on their shared
    /// line; zero otherwise. Always line[a][b] without bit b.
    between: [[Bitboard; 64]; 64],
    passed: [[Bitboard; 64]; COLOR_COUNT],
}

static GEOMETRY: OnceLock<Geometry> = OnceLock::new();

/// Build the geometry tables. Must run before any position or attack
/// query; calling it again is a no-op.
pub fn init() {
    GEOMETRY.get_or_init(Geometry::build);
}

fn tables() -> &'static Geometry {
    GEOMETRY.get().expect("geometry tables not initialized, call geometry::init() first")
}

const KNIGHT_STEPS: [(i8, i8); 8] = [
    (1, 2), (2, 1), (2, -1), (1, -2), (-1, -2), (-2, -1), (-2, 1), (-1, 2),
];

const KING_STEPS: [(i8, i8); 8] = [
    (0, 1), (1, 1), (1, 0), (1, -1), (0, -1), (-1, -1), (-1, 0), (-1, 1),
];

const DIAG_NE_SW: [(i8, i8); 2] = [(1, 1), (-1, -1)];
const DIAG_NW_SE: [(i8, i8); 2] = [(-1, 1), (1, -1)];

/// Collect the squares reached from (file, rank) by each (df, dr) offset
/// that stays on the board.
fn offsets_bb(file: i8, rank: i8, steps: &[(i8, i8)]) -> Bitboard {
    let mut bb = 0;
    for &(df, dr) in steps {
        let (f, r) = (file + df, rank + dr);
        if (0..8).contains(&f) && (0..8).contains(&r) {
            bb |= square_bb(make_square(f as u8, r as u8));
        }
    }
    bb
}

/// Walk from (file, rank) in direction (df, dr), collecting every square
/// until the edge. The starting square itself is not included.
fn ray_bb(file: i8, rank: i8, df: i8, dr: i8) -> Bitboard {
    let mut bb = 0;
    let (mut f, mut r) = (file + df, rank + dr);
    while (0..8).contains(&f) && (0..8).contains(&r) {
        bb |= square_bb(make_square(f as u8, r as u8));
        f += df;
        r += dr;
    }
    bb
}

impl Geometry {
    fn build() -> Geometry {
        let mut g = Geometry {
            knight: [0; 64],
            king: [0; 64],
            outer_ring: [0; 64],
            pawn_attacks: [[0; 64]; COLOR_COUNT],
            pawn_push: [[0; 64]; COLOR_COUNT],
            pawn_double_push: [[0; 64]; COLOR_COUNT],
            diag_a1h8: [0; 64],
            diag_a8h1: [0; 64],
            line: [[0; 64]; 64],
            between: [[0; 64]; 64],
            passed: [[0; 64]; COLOR_COUNT],
        };

        for s in 0..64u8 {
            let (f, r) = (file_of(s) as i8, rank_of(s) as i8);

            g.knight[s as usize] = offsets_bb(f, r, &KNIGHT_STEPS);
            g.king[s as usize] = offsets_bb(f, r, &KING_STEPS);

            // ring at distance two: every offset with max(|df|, |dr|) == 2
            for df in -2i8..=2 {
                for dr in -2i8..=2 {
                    if df.abs().max(dr.abs()) == 2 {
                        g.outer_ring[s as usize] |= offsets_bb(f, r, &[(df, dr)]);
                    }
                }
            }

            g.diag_a1h8[s as usize] =
                ray_bb(f, r, DIAG_NE_SW[0].0, DIAG_NE_SW[0].1) | ray_bb(f, r, DIAG_NE_SW[1].0, DIAG_NE_SW[1].1);
            g.diag_a8h1[s as usize] =
                ray_bb(f, r, DIAG_NW_SE[0].0, DIAG_NW_SE[0].1) | ray_bb(f, r, DIAG_NW_SE[1].0, DIAG_NW_SE[1].1);

            // pawn tables are zero on the back ranks, where no pawn can stand
            if r > 0 && r < 7 {
                g.pawn_attacks[Color::White.index()][s as usize] = offsets_bb(f, r, &[(-1, 1), (1, 1)]);
                g.pawn_attacks[Color::Black.index()][s as usize] = offsets_bb(f, r, &[(-1, -1), (1, -1)]);
                g.pawn_push[Color::White.index()][s as usize] = square_bb(s + 8);
                g.pawn_push[Color::Black.index()][s as usize] = square_bb(s - 8);
                if r == 1 {
                    g.pawn_double_push[Color::White.index()][s as usize] = square_bb(s + 16);
                }
                if r == 6 {
                    g.pawn_double_push[Color::Black.index()][s as usize] = square_bb(s - 16);
                }
            }

            // front span over the own and both neighbor files
            let mut span = FILES[f as usize];
            if f > 0 {
                span |= FILES[(f - 1) as usize];
            }
            if f < 7 {
                span |= FILES[(f + 1) as usize];
            }
            let mut ahead_white = 0;
            let mut ahead_black = 0;
            for rr in (r + 1)..8 {
                ahead_white |= RANKS[rr as usize];
            }
            for rr in 0..r {
                ahead_black |= RANKS[rr as usize];
            }
            g.passed[Color::White.index()][s as usize] = span & ahead_white;
            g.passed[Color::Black.index()][s as usize] = span & ahead_black;
        }

        for a in 0..64u8 {
            for b in 0..64u8 {
                if a == b {
                    continue;
                }
                let df = file_of(b) as i8 - file_of(a) as i8;
                let dr = rank_of(b) as i8 - rank_of(a) as i8;
                // shared rank, file or diagonal, detected arithmetically
                if !(df == 0 || dr == 0 || df.abs() == dr.abs()) {
                    continue;
                }
                let step = (df.signum(), dr.signum());
                let mut seg = 0;
                let (mut f, mut r) = (file_of(a) as i8 + step.0, rank_of(a) as i8 + step.1);
                loop {
                    let s = make_square(f as u8, r as u8);
                    if s == b {
                        break;
                    }
                    seg |= square_bb(s);
                    f += step.0;
                    r += step.1;
                }
                g.between[a as usize][b as usize] = seg;
                g.line[a as usize][b as usize] = seg | square_bb(b);
            }
        }

        g
    }
}

// ============================================================
// Lookup functions
// ============================================================

#[inline]
pub fn knight_attacks(sq: u8) -> Bitboard {
    tables().knight[sq as usize]
}

#[inline]
pub fn king_attacks(sq: u8) -> Bitboard {
    tables().king[sq as usize]
}

#[inline]
pub fn outer_ring(sq: u8) -> Bitboard {
    tables().outer_ring[sq as usize]
}

#[inline]
pub fn pawn_attacks(color: Color, sq: u8) -> Bitboard {
    tables().pawn_attacks[color.index()][sq as usize]
}

#[inline]
pub fn pawn_push(color: Color, sq: u8) -> Bitboard {
    tables().pawn_push[color.index()][sq as usize]
}

#[inline]
pub fn pawn_double_push(color: Color, sq: u8) -> Bitboard {
    tables().pawn_double_push[color.index()][sq as usize]
}

#[inline]
pub fn diag_a1h8(sq: u8) -> Bitboard {
    tables().diag_a1h8[sq as usize]
}

#[inline]
pub fn diag_a8h1(sq: u8) -> Bitboard {
    tables().diag_a8h1[sq as usize]
}

/// The half-open segment (a, b] of the line shared by `a` and `b`,
/// zero if they share none. A piece pinned on the a-b line may move
/// exactly to these squares.
#[inline]
pub fn line(a: u8, b: u8) -> Bitboard {
    tables().line[a as usize][b as usize]
}

/// Squares strictly between `a` and `b` on their shared line, zero
/// if they share none.
#[inline]
pub fn between(a: u8, b: u8) -> Bitboard {
    tables().between[a as usize][b as usize]
}

/// Squares in front of `sq` (from `color`'s viewpoint) on its file and
/// the adjacent files. Empty of enemy pawns means the pawn is passed.
#[inline]
pub fn passed_mask(color: Color, sq: u8) -> Bitboard {
    tables().passed[color.index()][sq as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() {
        init();
    }

    #[test]
    fn knight_and_king_counts() {
        setup();
        assert_eq!(popcount(knight_attacks(sq::E4)), 8);
        assert_eq!(popcount(knight_attacks(sq::A1)), 2);
        assert_eq!(popcount(knight_attacks(sq::H8)), 2);
        assert_eq!(popcount(king_attacks(sq::E4)), 8);
        assert_eq!(popcount(king_attacks(sq::A1)), 3);
        assert!(king_attacks(sq::E4) & square_bb(sq::E4) == 0);
    }

    #[test]
    fn outer_ring_counts() {
        setup();
        assert_eq!(popcount(outer_ring(sq::E4)), 16);
        assert_eq!(popcount(outer_ring(sq::A1)), 5);
        // the ring never overlaps the direct neighborhood or the square
        assert_eq!(outer_ring(sq::E4) & (king_attacks(sq::E4) | square_bb(sq::E4)), 0);
    }

    #[test]
    fn pawn_tables() {
        setup();
        assert_eq!(
            pawn_attacks(Color::White, sq::E4),
            square_bb(sq::D5) | square_bb(sq::F5)
        );
        assert_eq!(pawn_attacks(Color::White, sq::A2), square_bb(sq::B3));
        assert_eq!(pawn_attacks(Color::Black, sq::H7), square_bb(sq::G6));
        // no pawn can stand on a back rank
        for f in 0..8 {
            assert_eq!(pawn_attacks(Color::White, make_square(f, 0)), 0);
            assert_eq!(pawn_attacks(Color::White, make_square(f, 7)), 0);
            assert_eq!(pawn_attacks(Color::Black, make_square(f, 0)), 0);
            assert_eq!(pawn_attacks(Color::Black, make_square(f, 7)), 0);
        }
        assert_eq!(pawn_push(Color::White, sq::E2), square_bb(sq::E3));
        assert_eq!(pawn_push(Color::Black, sq::E7), square_bb(sq::E6));
        assert_eq!(pawn_double_push(Color::White, sq::E2), square_bb(sq::E4));
        assert_eq!(pawn_double_push(Color::White, sq::E3), 0);
        assert_eq!(pawn_double_push(Color::Black, sq::D7), square_bb(sq::D5));
        assert_eq!(pawn_double_push(Color::Black, sq::D6), 0);
    }

    #[test]
    fn diagonals() {
        setup();
        // e4 sits on b1-h7 and h1-a8; the square itself is excluded
        assert_eq!(popcount(diag_a1h8(sq::E4)), 6);
        assert_eq!(popcount(diag_a8h1(sq::E4)), 7);
        assert!(diag_a1h8(sq::E4) & square_bb(sq::B1) != 0);
        assert!(diag_a1h8(sq::E4) & square_bb(sq::H7) != 0);
        assert!(diag_a8h1(sq::E4) & square_bb(sq::H1) != 0);
        assert!(diag_a8h1(sq::E4) & square_bb(sq::A8) != 0);
        assert_eq!(diag_a1h8(sq::E4) & square_bb(sq::E4), 0);
    }

    #[test]
    fn line_and_between_laws() {
        setup();
        for a in 0..64u8 {
            for b in 0..64u8 {
                let ln = line(a, b);
                let bt = between(a, b);
                // b is on the line but never strictly between
                assert_eq!(bt & square_bb(b), 0);
                if ln != 0 {
                    assert_eq!(bt | square_bb(b), ln);
                } else {
                    assert_eq!(bt, 0);
                }
                if a == b {
                    assert_eq!(ln, 0);
                }
            }
        }
    }

    #[test]
    fn between_examples() {
        setup();
        assert_eq!(
            between(sq::E1, sq::H1),
            square_bb(sq::F1) | square_bb(sq::G1)
        );
        assert_eq!(
            between(sq::E1, sq::A1),
            square_bb(sq::B1) | square_bb(sq::C1) | square_bb(sq::D1)
        );
        assert_eq!(between(sq::A1, sq::H8), between(sq::H8, sq::A1));
        assert_eq!(between(sq::A1, sq::B3), 0);
        assert_eq!(line(sq::A1, sq::B3), 0);
    }

    #[test]
    fn passed_pawn_spans() {
        setup();
        // e4 front span for white: d5..d8, e5..e8, f5..f8
        let m = passed_mask(Color::White, sq::E4);
        assert_eq!(popcount(m), 12);
        assert!(m & square_bb(sq::D5) != 0);
        assert!(m & square_bb(sq::F8) != 0);
        assert_eq!(m & RANK_4, 0);
        // edge file uses only its single neighbor
        assert_eq!(popcount(passed_mask(Color::White, sq::A2)), 12);
        assert!(passed_mask(Color::White, sq::A2) & square_bb(sq::B3) != 0);
        // black looks down the board
        let b = passed_mask(Color::Black, sq::E5);
        assert_eq!(popcount(b), 12);
        assert!(b & square_bb(sq::D4) != 0);
        assert_eq!(b & RANK_6, 0);
    }

    #[test]
    fn rebuild_is_identical() {
        setup();
        let fresh = Geometry::build();
        let global = tables();
        assert_eq!(fresh.knight, global.knight);
        assert_eq!(fresh.king, global.king);
        assert_eq!(fresh.outer_ring, global.outer_ring);
        for a in 0..64 {
            assert_eq!(fresh.line[a], global.line[a]);
            assert_eq!(fresh.between[a], global.between[a]);
        }
    }
}
