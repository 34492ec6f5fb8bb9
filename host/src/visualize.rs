// Plain-text views of a session for the terminal client.
//
// Own board: `S` ship, `X` hit, `o` miss, `.` water.
// Target board: `X` hit, `o` miss, `.` unknown. Never shows opponent ships.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use duel_core::{
    bitmap, Address, Fleet, GameKind, LetterStatus, Move, Outcome, Position, SecretLayout, Session, BOARD_SIZE,
};

use crate::local_state::{ObservedMove, PerIdentityState};

fn header(out: &mut String) {
    out.push_str("   ");
    for x in 0..BOARD_SIZE {
        let _ = write!(out, "{:2} ", x);
    }
}

fn grid(cell: impl Fn(Position) -> char) -> Vec<String> {
    let mut lines = Vec::with_capacity(BOARD_SIZE + 1);
    let mut top = String::new();
    header(&mut top);
    lines.push(top);
    for y in 0..BOARD_SIZE as u32 {
        let mut line = format!("{:2} ", y);
        for x in 0..BOARD_SIZE as u32 {
            let _ = write!(line, " {} ", cell(Position::new(x, y)));
        }
        lines.push(line);
    }
    lines
}

/// `fired_at` is the bitmap of cells the opponent already targeted.
pub fn own_board_lines(fleet: &Fleet, fired_at: u128) -> Vec<String> {
    let (w, h) = GameKind::Battleship.bitmap_dims();
    grid(|p| {
        let fired = bitmap::is_set(fired_at, p, w, h);
        match (fleet.ship_at(p).is_some(), fired) {
            (true, true) => 'X',
            (true, false) => 'S',
            (false, true) => 'o',
            (false, false) => '.',
        }
    })
}

pub fn target_board_lines(marks: &BTreeMap<Position, bool>) -> Vec<String> {
    grid(|p| match marks.get(&p) {
        Some(true) => 'X',
        Some(false) => 'o',
        None => '.',
    })
}

pub fn render_board(lines: &[String]) -> String {
    lines.join("\n")
}

/// Own board on the left, target board on the right.
pub fn render_dual(left: &[String], right: &[String]) -> String {
    left.iter()
        .zip(right)
        .map(|(l, r)| format!("{}    {}", l, r))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `[A]` correct, `(A)` present, ` a ` absent.
pub fn render_guesses(observed: &[ObservedMove]) -> String {
    let mut out = String::new();
    for o in observed {
        if let (Move::Guess(word), Outcome::Guess { feedback, .. }) = (&o.action, &o.outcome) {
            for (c, status) in word.to_string().chars().zip(feedback) {
                let _ = match status {
                    LetterStatus::Correct => write!(out, "[{}]", c),
                    LetterStatus::Present => write!(out, "({})", c),
                    LetterStatus::Absent => write!(out, " {} ", c.to_ascii_lowercase()),
                };
            }
            out.push('\n');
        }
    }
    out
}

/// One-line summary of where the session stands.
pub fn status_line(session: &Session) -> String {
    let turn = session.turn.as_ref().map(|a| short(a.as_str())).unwrap_or_else(|| "-".into());
    let pending = session
        .pending
        .as_ref()
        .map(|p| format!(", pending {} by {}", p.action, short(p.mover.as_str())))
        .unwrap_or_default();
    let winner = session
        .winner
        .as_ref()
        .map(|w| format!(", winner {}", short(w.as_str())))
        .unwrap_or_default();
    format!(
        "session {} {:?} {:?}: turn {}{}{}, {} resolved",
        session.id,
        session.kind,
        session.phase,
        turn,
        pending,
        winner,
        session.history.len()
    )
}

/// Everything `me` may see of the session.
pub fn session_view(session: &Session, state: &PerIdentityState, me: &Address) -> String {
    let mut out = status_line(session);
    out.push('\n');
    match session.kind {
        GameKind::Battleship => {
            let target = target_board_lines(&state.shot_marks());
            match state.secret.as_ref().map(|s| &s.layout) {
                Some(SecretLayout::Fleet(fleet)) => {
                    out.push_str(&render_dual(&own_board_lines(fleet, session.fired_at(me)), &target));
                }
                _ => out.push_str(&render_board(&target)),
            }
        }
        GameKind::Wordle => {
            let guesses: Vec<ObservedMove> = session
                .history
                .iter()
                .map(|r| ObservedMove { action: r.action, outcome: r.outcome })
                .collect();
            if let Some(SecretLayout::Word(word)) = state.secret.as_ref().map(|s| &s.layout) {
                out.push_str(&format!("your word: {}\n", word));
            }
            out.push_str(&render_guesses(&guesses));
        }
    }
    out
}

fn short(s: &str) -> String {
    if s.chars().count() > 10 {
        format!("{}..", s.chars().take(8).collect::<String>())
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duel_core::{guess_outcome, Direction, ShipType, Word};

    #[test]
    fn own_board_marks_hits_and_misses() {
        let mut fleet = Fleet::new();
        assert!(fleet.place_ship(ShipType::Destroyer, Position::new(0, 0), Direction::Horizontal));
        let (w, h) = GameKind::Battleship.bitmap_dims();
        let fired = bitmap::encode([Position::new(0, 0), Position::new(5, 5)].iter(), w, h).unwrap();
        let lines = own_board_lines(&fleet, fired);
        assert_eq!(lines.len(), BOARD_SIZE + 1);
        assert!(lines[1].starts_with(" 0  X  S  . "));
        assert_eq!(lines[6].chars().filter(|c| *c == 'o').count(), 1);
    }

    #[test]
    fn target_board_never_shows_ships() {
        let marks: BTreeMap<Position, bool> = [(Position::new(1, 0), true), (Position::new(2, 0), false)].into();
        let text = render_board(&target_board_lines(&marks));
        assert!(!text.contains('S'));
        assert!(text.lines().nth(1).unwrap().starts_with(" 0  .  X  o "));
    }

    #[test]
    fn guess_rows() {
        let secret: Word = "ALLOY".parse().unwrap();
        let guess: Word = "LOLLY".parse().unwrap();
        let observed = vec![ObservedMove { action: Move::Guess(guess), outcome: guess_outcome(&guess, &secret) }];
        assert_eq!(render_guesses(&observed), "(L)(O)[L] l [Y]\n");
    }
}
