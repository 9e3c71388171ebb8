/// UCI protocol front end.
///
/// The line loop runs on the I/O thread; `go` hands a clone of the
/// position to a single worker thread that searches and announces
/// `bestmove` through the shared output. The two threads share exactly
/// one datum, the atomic stop flag: `stop`/`quit` set it and then wait
/// for the worker, so a new `go` can never overlap a running search.
/// Every inbound and outbound line goes to the log.

use crate::bitboard::*;
use crate::errors::Error;
use crate::eval;
use crate::movegen;
use crate::moves::*;
use crate::position::Position;
use crate::search::{self, Limits};
use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

const ENGINE_NAME: &str = "Garnet";
const ENGINE_AUTHOR: &str = "the Garnet developers";

/// Shared line-oriented output: writes, flushes and logs in one step.
/// Cloned into the search worker so responses stay serialized.
#[derive(Clone)]
pub struct Output(Arc<Mutex<Box<dyn Write + Send>>>);

impl Output {
    pub fn stdout() -> Output {
        Output::to_writer(Box::new(io::stdout()))
    }

    pub fn to_writer(writer: Box<dyn Write + Send>) -> Output {
        Output(Arc::new(Mutex::new(writer)))
    }

    pub fn send(&self, line: &str) {
        let mut w = self.0.lock().unwrap_or_else(|e| e.into_inner());
        let _ = writeln!(w, "{}", line);
        let _ = w.flush();
        log::info!("> {}", line);
    }
}

pub struct Engine {
    pos: Position,
    out: Output,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

/// Read commands from stdin until `quit` or end of input.
pub fn uci_loop() {
    let mut engine = Engine::new(Output::stdout());
    engine.run(io::stdin().lock());
}

impl Engine {
    pub fn new(out: Output) -> Engine {
        Engine {
            pos: Position::startpos(),
            out,
            stop: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    pub fn run<R: BufRead>(&mut self, input: R) {
        for line in input.lines() {
            let line = match line {
                Ok(l) => l,
                Err(_) => break,
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            log::info!("< {}", line);

            match self.handle_line(line) {
                Ok(true) => {}
                Ok(false) => break,
                Err(err @ Error::Internal(_)) => {
                    log::error!("{}", err);
                    std::process::exit(2);
                }
                Err(err) => {
                    // parse-level trouble: drop the command, stay ready
                    log::warn!("{}", err);
                }
            }
        }

        self.stop.store(true, Ordering::Relaxed);
        self.finish_search();
    }

    /// Dispatch one command line. `Ok(false)` means quit.
    fn handle_line(&mut self, line: &str) -> Result<bool, Error> {
        let tokens: Vec<&str> = line.split_whitespace().collect();

        match tokens[0] {
            "uci" => {
                self.out.send(&format!("id name {} {}", ENGINE_NAME, env!("CARGO_PKG_VERSION")));
                self.out.send(&format!("id author {}", ENGINE_AUTHOR));
                self.out.send("option name Hash type spin default 16 min 1 max 1024");
                self.out.send("uciok");
            }
            "isready" => self.out.send("readyok"),
            "setoption" => {
                // declared for GUI compatibility, nothing to configure
            }
            "ucinewgame" => {
                self.finish_search();
                self.pos = Position::startpos();
            }
            "position" => {
                self.finish_search();
                // build the new state aside so a bad command changes nothing
                self.pos = parse_position(&tokens)?;
            }
            "go" => {
                self.go(&tokens)?;
            }
            "stop" => {
                self.stop.store(true, Ordering::Relaxed);
                self.finish_search();
            }
            "quit" => {
                self.stop.store(true, Ordering::Relaxed);
                self.finish_search();
                return Ok(false);
            }
            "d" | "display" => self.out.send(&self.pos.to_string()),
            "eval" => {
                let score = eval::evaluate(&self.pos);
                self.out.send(&format!("eval {} cp (side to move)", score));
            }
            "perft" => {
                self.finish_search();
                let depth = tokens
                    .get(1)
                    .and_then(|t| t.parse::<u32>().ok())
                    .ok_or_else(|| Error::Protocol(format!("perft needs a depth: {}", line)))?;
                let start = std::time::Instant::now();
                let count = movegen::perft_divide(&mut self.pos, depth);
                let ms = start.elapsed().as_millis() as u64;
                let nps = if ms > 0 { count * 1000 / ms } else { 0 };
                self.out.send(&format!("perft {} nodes {} time {} nps {}", depth, count, ms, nps));
            }
            "bench" => {
                self.finish_search();
                self.bench();
            }
            _ => return Err(Error::Protocol(format!("unknown command: {}", line))),
        }
        Ok(true)
    }

    /// Launch the search worker. Any previous search is awaited first,
    /// so its best move is already published.
    fn go(&mut self, tokens: &[&str]) -> Result<(), Error> {
        self.finish_search();
        let limits = parse_go(tokens, &self.pos)?;

        self.stop.store(false, Ordering::Relaxed);
        let mut pos = self.pos.clone();
        let stop = Arc::clone(&self.stop);
        let out = self.out.clone();
        self.worker = Some(std::thread::spawn(move || {
            let result = search::run(&mut pos, limits, stop);
            out.send(&format!("bestmove {}", result.best_move.to_uci()));
        }));
        Ok(())
    }

    /// Wait for a running search to publish its best move and unwind.
    fn finish_search(&mut self) {
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                log::error!("internal error: search worker panicked");
                std::process::exit(2);
            }
        }
    }

    fn bench(&mut self) {
        const SUITE: [&str; 5] = [
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
            "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
            "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10",
        ];
        let limits = Limits { depth: 5, ..Limits::default() };
        let start = std::time::Instant::now();
        let mut total_nodes = 0;

        for fen in SUITE {
            let mut pos = Position::from_fen(fen).expect("bench FEN is valid");
            let result = search::run_uninterrupted(&mut pos, limits);
            total_nodes += result.nodes;
        }

        let ms = start.elapsed().as_millis() as u64;
        let nps = if ms > 0 { total_nodes * 1000 / ms } else { 0 };
        self.out.send(&format!("bench nodes {} time {} nps {}", total_nodes, ms, nps));
    }
}

/// Build a position from `position startpos|fen ... [moves ...]`.
fn parse_position(tokens: &[&str]) -> Result<Position, Error> {
    let mut idx = 1;
    let mut pos = match tokens.get(idx) {
        Some(&"startpos") => {
            idx += 1;
            Position::startpos()
        }
        Some(&"fen") => {
            idx += 1;
            let mut fen_parts = Vec::new();
            while idx < tokens.len() && tokens[idx] != "moves" {
                fen_parts.push(tokens[idx]);
                idx += 1;
            }
            Position::from_fen(&fen_parts.join(" "))?
        }
        _ => {
            return Err(Error::Protocol(format!(
                "position needs startpos or fen: {}",
                tokens.join(" ")
            )))
        }
    };

    if tokens.get(idx) == Some(&"moves") {
        for text in &tokens[idx + 1..] {
            let m = find_move(&pos, text)?;
            pos.make(m);
        }
    }
    Ok(pos)
}

/// Decode long-algebraic move text against the legal moves of `pos`.
pub fn find_move(pos: &Position, text: &str) -> Result<Move, Error> {
    let malformed = || Error::MalformedMove(text.to_string());

    if text.len() != 4 && text.len() != 5 {
        return Err(malformed());
    }
    let from = parse_square(&text[0..2]).ok_or_else(malformed)?;
    let to = parse_square(&text[2..4]).ok_or_else(malformed)?;
    let promo = match text.as_bytes().get(4) {
        None => None,
        Some(b'n') => Some(Piece::Knight),
        Some(b'b') => Some(Piece::Bishop),
        Some(b'r') => Some(Piece::Rook),
        Some(b'q') => Some(Piece::Queen),
        Some(_) => return Err(malformed()),
    };

    let mut list = MoveList::new();
    movegen::generate_moves(pos, &mut list);
    for m in list.as_slice() {
        if m.from_sq() == from && m.to_sq() == to && m.promotion_piece() == promo {
            return Ok(*m);
        }
    }
    Err(Error::MalformedMove(format!("{} is not legal here", text)))
}

/// Translate `go` parameters into search limits. `depth`, `movetime`
/// and `nodes` are exact; clock fields get a simple budget (full time
/// management is out of scope). A bare `go` thinks for 5 seconds.
fn parse_go(tokens: &[&str], pos: &Position) -> Result<Limits, Error> {
    let mut limits = Limits::default();
    let mut wtime: Option<u64> = None;
    let mut btime: Option<u64> = None;
    let mut winc: u64 = 0;
    let mut binc: u64 = 0;
    let mut movestogo: Option<u64> = None;
    let mut infinite = false;
    let mut constrained = false;

    let mut iter = tokens[1..].iter();
    while let Some(&keyword) = iter.next() {
        let mut number = |name: &str| -> Result<u64, Error> {
            iter.next()
                .and_then(|v| v.parse::<u64>().ok())
                .ok_or_else(|| Error::Protocol(format!("go {} needs a number", name)))
        };
        match keyword {
            "depth" => {
                limits.depth = number("depth")? as i32;
                constrained = true;
            }
            "movetime" => {
                limits.movetime = Some(number("movetime")?);
                constrained = true;
            }
            "nodes" => {
                limits.nodes = Some(number("nodes")?);
                constrained = true;
            }
            "wtime" => wtime = Some(number("wtime")?),
            "btime" => btime = Some(number("btime")?),
            "winc" => winc = number("winc")?,
            "binc" => binc = number("binc")?,
            "movestogo" => movestogo = Some(number("movestogo")?),
            "infinite" => {
                infinite = true;
                constrained = true;
            }
            _ => return Err(Error::Protocol(format!("unknown go parameter: {}", keyword))),
        }
    }

    if limits.movetime.is_none() && !infinite {
        let (our_time, our_inc) = match pos.side {
            Color::White => (wtime, winc),
            Color::Black => (btime, binc),
        };
        if let Some(remaining) = our_time {
            // spend a slice of the clock, never more than a quarter of it
            let slice = remaining / movestogo.unwrap_or(30).max(1) + our_inc * 3 / 4;
            limits.movetime = Some(slice.min(remaining / 4).max(20));
        } else if !constrained {
            limits.movetime = Some(5_000);
        }
    }

    Ok(limits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Test double for stdout: a clonable growable buffer.
    #[derive(Clone)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn new() -> SharedBuf {
            SharedBuf(Arc::new(Mutex::new(Vec::new())))
        }

        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn engine() -> (Engine, SharedBuf) {
        crate::init();
        let buf = SharedBuf::new();
        (Engine::new(Output::to_writer(Box::new(buf.clone()))), buf)
    }

    #[test]
    fn uci_handshake_ends_with_uciok() {
        let (mut engine, buf) = engine();
        engine.run(Cursor::new("uci\nquit\n"));
        let text = buf.text();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines.iter().any(|l| l.starts_with("id name")));
        assert!(lines.iter().any(|l| l.starts_with("id author")));
        assert!(lines.iter().any(|l| l.starts_with("option name")));
        assert_eq!(*lines.last().unwrap(), "uciok");
    }

    #[test]
    fn isready_answers_readyok() {
        let (mut engine, buf) = engine();
        engine.run(Cursor::new("isready\nquit\n"));
        assert_eq!(buf.text().trim(), "readyok");
    }

    #[test]
    fn go_depth_one_emits_one_legal_bestmove() {
        let (mut engine, buf) = engine();
        engine.run(Cursor::new(
            "position startpos moves e2e4 e7e5\ngo depth 1\nquit\n",
        ));
        let text = buf.text();
        let best: Vec<&str> = text.lines().filter(|l| l.starts_with("bestmove ")).collect();
        assert_eq!(best.len(), 1, "expected exactly one bestmove line in {:?}", text);

        let after = Position::from_fen(
            "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq e6 0 2",
        )
        .unwrap();
        let name = best[0].trim_start_matches("bestmove ").trim();
        assert!(find_move(&after, name).is_ok(), "bestmove {} is not legal", name);
    }

    #[test]
    fn movetime_with_stop_still_answers() {
        let (mut engine, buf) = engine();
        let started = std::time::Instant::now();
        engine.run(Cursor::new("go movetime 100\nstop\nquit\n"));
        assert!(started.elapsed().as_millis() < 2_000);
        let text = buf.text();
        let best: Vec<&str> = text.lines().filter(|l| l.starts_with("bestmove ")).collect();
        assert_eq!(best.len(), 1);
        let name = best[0].trim_start_matches("bestmove ").trim();
        assert!(find_move(&Position::startpos(), name).is_ok());
    }

    #[test]
    fn stalemate_answers_null_move() {
        let (mut engine, buf) = engine();
        engine.run(Cursor::new(
            "position fen 7k/5Q2/6K1/8/8/8/8/8 b - - 0 1\ngo depth 2\nquit\n",
        ));
        assert!(buf.text().lines().any(|l| l == "bestmove 0000"));
    }

    #[test]
    fn bad_commands_are_dropped_and_the_engine_stays_up() {
        let (mut engine, buf) = engine();
        engine.run(Cursor::new(
            "position fen not a fen at all\nnonsense command\nposition startpos moves e2e5\nisready\nquit\n",
        ));
        // the engine survived everything and still answers
        assert!(buf.text().lines().any(|l| l == "readyok"));
        // and the bad position commands left the state alone
        assert_eq!(engine.pos.to_fen(), crate::position::START_FEN);
    }

    #[test]
    fn position_with_moves_applies_them() {
        let (mut engine, _buf) = engine();
        engine
            .handle_line("position startpos moves e2e4 e7e5 g1f3")
            .unwrap();
        assert_eq!(
            engine.pos.to_fen(),
            "rnbqkbnr/pppp1ppp/8/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R b KQkq - 1 2"
        );
    }

    #[test]
    fn find_move_decodes_and_validates() {
        crate::init();
        let pos = Position::startpos();
        let m = find_move(&pos, "e2e4").unwrap();
        assert_eq!(m.from_sq(), sq::E2);
        assert_eq!(m.to_sq(), sq::E4);
        assert!(m.is_double_push());

        assert!(find_move(&pos, "e2e5").is_err());
        assert!(find_move(&pos, "e2").is_err());
        assert!(find_move(&pos, "e2e4x").is_err());

        let promo_pos = Position::from_fen("4k3/2P5/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let m = find_move(&promo_pos, "c7c8q").unwrap();
        assert_eq!(m.promotion_piece(), Some(Piece::Queen));
        assert!(find_move(&promo_pos, "c7c8").is_err());
    }

    #[test]
    fn go_limits_parsing() {
        crate::init();
        let pos = Position::startpos();

        let l = parse_go(&["go", "depth", "7"], &pos).unwrap();
        assert_eq!(l.depth, 7);
        assert_eq!(l.movetime, None);

        let l = parse_go(&["go", "movetime", "250"], &pos).unwrap();
        assert_eq!(l.movetime, Some(250));

        let l = parse_go(&["go", "nodes", "10000"], &pos).unwrap();
        assert_eq!(l.nodes, Some(10_000));

        let l = parse_go(&["go", "infinite"], &pos).unwrap();
        assert_eq!(l.movetime, None);
        assert_eq!(l.nodes, None);

        // a bare go gets the default thinking time
        let l = parse_go(&["go"], &pos).unwrap();
        assert_eq!(l.movetime, Some(5_000));

        // clock budgeting picks a slice of the remaining time
        let l = parse_go(&["go", "wtime", "60000", "btime", "60000"], &pos).unwrap();
        let slice = l.movetime.unwrap();
        assert!(slice >= 20 && slice <= 15_000);

        assert!(parse_go(&["go", "depth"], &pos).is_err());
        assert!(parse_go(&["go", "depth", "x"], &pos).is_err());
        assert!(parse_go(&["go", "sideways"], &pos).is_err());
    }
}
